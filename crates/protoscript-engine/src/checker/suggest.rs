//! "Did you mean" suggestions for unresolved names

/// Maximum edit distance for a candidate to be suggested
pub const MAX_SUGGESTION_DISTANCE: usize = 2;

/// Levenshtein distance over Unicode scalar values
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Rank `candidates` against `name`
///
/// Keeps only the candidates at the minimum distance, and only when that
/// distance is at most [`MAX_SUGGESTION_DISTANCE`]. One or two tied
/// candidates are returned (sorted); three or more ties are ambiguous and
/// yield nothing. The name itself and duplicates are ignored.
pub fn suggest<'a, I>(name: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best = usize::MAX;
    let mut tied: Vec<&str> = Vec::new();

    for candidate in candidates {
        if candidate == name {
            continue;
        }
        let distance = levenshtein(name, candidate);
        if distance > MAX_SUGGESTION_DISTANCE {
            continue;
        }
        if distance < best {
            best = distance;
            tied.clear();
            tied.push(candidate);
        } else if distance == best && !tied.contains(&candidate) {
            tied.push(candidate);
        }
    }

    if tied.len() > 2 {
        return Vec::new();
    }
    let mut out: Vec<String> = tied.into_iter().map(str::to_string).collect();
    out.sort();
    out
}
