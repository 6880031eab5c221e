//! Lexical scopes for the analyzer
//!
//! A stack of frames mapping names to bindings. Besides the declared type,
//! each binding carries the flow facts the analyzer tracks: definite
//! initialization, the statically known length of a list, and whether the
//! local aliases the method receiver.

use crate::ast::Span;
use crate::types::Type;
use rustc_hash::FxHashMap;

/// Scope kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Function or method body (parameters live here)
    Function,
    /// Nested block
    Block,
    /// Loop body (`break`/`continue` allowed)
    Loop,
    /// Switch arm (`break` allowed)
    Switch,
}

/// A local binding
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: Type,
    pub initialized: bool,
    /// Best-effort length of a list value; `None` when unknown
    pub known_list_len: Option<usize>,
    /// The local holds the method receiver (`T me = self;`)
    pub alias_self: bool,
    pub is_const: bool,
    pub span: Span,
}

impl Binding {
    pub fn new(ty: Type, span: Span) -> Self {
        Self {
            ty,
            initialized: true,
            known_list_len: None,
            alias_self: false,
            is_const: false,
            span,
        }
    }
}

#[derive(Debug, Clone)]
struct Scope {
    kind: ScopeKind,
    bindings: FxHashMap<String, Binding>,
}

/// Flow facts of every visible binding at one program point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowSnapshot {
    /// `(scope depth, name) -> (known_list_len, initialized)`
    facts: FxHashMap<(usize, String), (Option<usize>, bool)>,
}

impl FlowSnapshot {
    /// Facts holding after either of two paths: lengths survive only where
    /// both paths agree, initialization only where both initialize
    pub fn join(&self, other: &FlowSnapshot) -> FlowSnapshot {
        let mut facts = FxHashMap::default();
        for (key, (len_a, init_a)) in &self.facts {
            if let Some((len_b, init_b)) = other.facts.get(key) {
                let len = if len_a == len_b { *len_a } else { None };
                facts.insert(key.clone(), (len, *init_a && *init_b));
            }
        }
        FlowSnapshot { facts }
    }
}

/// Stack of lexical scopes
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            bindings: FxHashMap::default(),
        });
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Define a binding in the innermost scope
    ///
    /// Returns the span of the previous declaration when the name is already
    /// bound in that same scope.
    pub fn define(&mut self, name: &str, binding: Binding) -> Result<(), Span> {
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };
        if let Some(existing) = scope.bindings.get(name) {
            return Err(existing.span);
        }
        scope.bindings.insert(name.to_string(), binding);
        Ok(())
    }

    /// Resolve a name, innermost scope first
    pub fn resolve(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.bindings.get(name))
    }

    pub fn resolve_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|s| s.bindings.get_mut(name))
    }

    /// Inside a loop (not crossing the function boundary)
    pub fn in_loop(&self) -> bool {
        self.enclosing(|k| k == ScopeKind::Loop)
    }

    /// Inside a loop or a switch arm
    pub fn can_break(&self) -> bool {
        self.enclosing(|k| matches!(k, ScopeKind::Loop | ScopeKind::Switch))
    }

    fn enclosing(&self, pred: impl Fn(ScopeKind) -> bool) -> bool {
        for scope in self.scopes.iter().rev() {
            if pred(scope.kind) {
                return true;
            }
            if scope.kind == ScopeKind::Function {
                return false;
            }
        }
        false
    }

    /// Every visible name, innermost first
    pub fn visible_names(&self) -> Vec<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.bindings.keys().map(String::as_str))
            .collect()
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        let mut facts = FxHashMap::default();
        for (depth, scope) in self.scopes.iter().enumerate() {
            for (name, b) in &scope.bindings {
                facts.insert((depth, name.clone()), (b.known_list_len, b.initialized));
            }
        }
        FlowSnapshot { facts }
    }

    /// Overwrite the flow facts of bindings still in scope
    pub fn restore(&mut self, snapshot: &FlowSnapshot) {
        for (depth, scope) in self.scopes.iter_mut().enumerate() {
            for (name, b) in scope.bindings.iter_mut() {
                if let Some((len, init)) = snapshot.facts.get(&(depth, name.clone())) {
                    b.known_list_len = *len;
                    b.initialized = *init;
                }
            }
        }
    }

    /// Drop every known list length (entering a loop body)
    pub fn forget_list_lengths(&mut self) {
        for scope in &mut self.scopes {
            for b in scope.bindings.values_mut() {
                b.known_list_len = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_binding(len: Option<usize>) -> Binding {
        let mut b = Binding::new(Type::list(Type::int()), Span::default());
        b.known_list_len = len;
        b
    }

    #[test]
    fn test_shadowing_and_resolution() {
        let mut table = SymbolTable::new();
        table.push_scope(ScopeKind::Function);
        table
            .define("x", Binding::new(Type::int(), Span::default()))
            .unwrap();
        table.push_scope(ScopeKind::Block);
        table
            .define("x", Binding::new(Type::string(), Span::default()))
            .unwrap();
        assert_eq!(table.resolve("x").unwrap().ty, Type::string());
        table.pop_scope();
        assert_eq!(table.resolve("x").unwrap().ty, Type::int());
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut table = SymbolTable::new();
        table.push_scope(ScopeKind::Function);
        let first = Span::at(1, 1);
        table.define("x", Binding::new(Type::int(), first)).unwrap();
        let err = table
            .define("x", Binding::new(Type::int(), Span::at(2, 1)))
            .unwrap_err();
        assert_eq!(err, first);
    }

    #[test]
    fn test_loop_context_stops_at_function() {
        let mut table = SymbolTable::new();
        table.push_scope(ScopeKind::Function);
        assert!(!table.in_loop());
        table.push_scope(ScopeKind::Loop);
        table.push_scope(ScopeKind::Block);
        assert!(table.in_loop());
        table.pop_scope();
        table.pop_scope();
        table.push_scope(ScopeKind::Switch);
        assert!(table.can_break());
        assert!(!table.in_loop());
    }

    #[test]
    fn test_join_keeps_agreeing_lengths() {
        let mut table = SymbolTable::new();
        table.push_scope(ScopeKind::Function);
        table.define("a", list_binding(Some(2))).unwrap();
        table.define("b", list_binding(Some(0))).unwrap();

        let before = table.snapshot();
        table.resolve_mut("b").unwrap().known_list_len = Some(1);
        let then_state = table.snapshot();
        table.restore(&before);
        let else_state = table.snapshot();
        table.restore(&then_state.join(&else_state));

        assert_eq!(table.resolve("a").unwrap().known_list_len, Some(2));
        assert_eq!(table.resolve("b").unwrap().known_list_len, None);
    }

    #[test]
    fn test_forget_list_lengths() {
        let mut table = SymbolTable::new();
        table.push_scope(ScopeKind::Function);
        table.define("a", list_binding(Some(3))).unwrap();
        table.forget_list_lengths();
        assert_eq!(table.resolve("a").unwrap().known_list_len, None);
    }
}
