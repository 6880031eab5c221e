//! IR Optimization Passes
//!
//! Leaf inlining, constant propagation and redundant-check elimination, run
//! in that order on a copy of the input module.

mod check_elim;
mod constant_fold;
mod inline;

pub use check_elim::CheckEliminator;
pub use constant_fold::{eval_binary, eval_cast, eval_unary, ConstantFolder, FoldStats};
pub use inline::Inliner;

use crate::compiler::ir::IrModule;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptLevel {
    /// No optimizations
    None,
    /// Constant propagation and check elimination
    Basic,
    /// Everything, including inlining
    #[default]
    Full,
}

/// Optimizer that runs multiple passes over the IR
#[derive(Debug, Clone)]
pub struct Optimizer {
    level: OptLevel,
}

impl Optimizer {
    pub fn new(level: OptLevel) -> Self {
        Self { level }
    }

    pub fn basic() -> Self {
        Self::new(OptLevel::Basic)
    }

    pub fn none() -> Self {
        Self::new(OptLevel::None)
    }

    pub fn level(&self) -> OptLevel {
        self.level
    }

    /// Optimize a copy of `module`; the input is left untouched
    pub fn optimize(&self, module: &IrModule) -> (IrModule, OptStats) {
        let mut output = module.clone();
        let mut stats = OptStats::default();

        if self.level == OptLevel::None {
            return (output, stats);
        }

        if self.level == OptLevel::Full {
            stats.calls_inlined = Inliner::new().inline(&mut output);
            debug!(module = %output.name, inlined = stats.calls_inlined, "inlining done");
        }

        let folder = ConstantFolder::new();
        for func in &mut output.functions {
            let folded = folder.fold_function(func);
            stats.constants_folded += folded.folded;
            stats.checks_proven += folded.checks_removed;
        }
        debug!(
            module = %output.name,
            folded = stats.constants_folded,
            checks_proven = stats.checks_proven,
            "constant propagation done"
        );

        let eliminator = CheckEliminator::new();
        for func in &mut output.functions {
            stats.redundant_checks_removed += eliminator.eliminate_function(func);
        }
        debug!(
            module = %output.name,
            removed = stats.redundant_checks_removed,
            "redundant check elimination done"
        );

        (output, stats)
    }
}

/// Statistics about optimizations performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptStats {
    /// Call sites replaced by the callee's body
    pub calls_inlined: usize,
    /// Instructions replaced by constants
    pub constants_folded: usize,
    /// Checks dropped because their constant operands pass
    pub checks_proven: usize,
    /// Checks dropped as duplicates of an earlier one
    pub redundant_checks_removed: usize,
}

impl OptStats {
    /// True when no pass changed anything
    pub fn is_unchanged(&self) -> bool {
        *self == OptStats::default()
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptLevel::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_levels() {
        assert_eq!(Optimizer::none().level(), OptLevel::None);
        assert_eq!(Optimizer::basic().level(), OptLevel::Basic);
        assert_eq!(Optimizer::default().level(), OptLevel::Full);
    }

    #[test]
    fn test_none_returns_identical_copy() {
        let module = IrModule::new("empty");
        let (output, stats) = Optimizer::none().optimize(&module);
        assert_eq!(output, module);
        assert!(stats.is_unchanged());
    }
}
