//! Tail call eligibility analysis.
//!
//! Two components compose in strict dependency order: the escape tracker
//! (`escape.rs`) computes which instructions touch or escape frame-local
//! storage, and the classifier (`classify.rs`) combines that with the
//! function's structural preconditions into a [`Verdict`]. [`TailCallPass`]
//! is the driver-facing wrapper: it honors the per-function disable flag and
//! accumulates statistics across functions.
//!
//! Everything here is single-threaded and synchronous per function. Distinct
//! functions can be analyzed from independent threads as long as each
//! invocation owns a read-only view of its target; no state is shared or
//! persisted between runs.

pub mod classify;
pub mod escape;
pub mod report;

pub use classify::{classify, eligible_calls, SkipReason, Verdict};
pub use escape::{EscapeSummary, EscapeTracker};
pub use report::FunctionReport;

use crate::ir::Function;

// =============================================================================
// Outcome
// =============================================================================

/// Per-function result of running the pass.
///
/// The disable flag is a configuration opt-out, not an analysis verdict, so
/// it gets its own variant rather than borrowing a skip reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Analysis was skipped because the function opts out.
    Disabled,
    /// Analysis ran and produced a verdict.
    Analyzed(Verdict),
}

// =============================================================================
// Statistics
// =============================================================================

/// Caller-held accumulator for whole-run totals.
///
/// Kept out of the core on purpose: the analysis itself holds no mutable
/// global state, so independent workers can each own an accumulator and
/// merge at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    /// Functions the pass was invoked on.
    pub functions: usize,
    /// Functions skipped via the disable flag.
    pub disabled: usize,
    /// Functions classified not applicable.
    pub not_applicable: usize,
    /// Functions with exactly one qualifying call.
    pub single_call: usize,
    /// Functions with several qualifying calls.
    pub multiple_calls: usize,
    /// Total qualifying calls across all functions.
    pub eligible_calls: usize,
}

impl AnalysisStats {
    /// Fresh, all-zero statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one function's outcome into the totals.
    pub fn record(&mut self, outcome: Outcome) {
        self.functions += 1;
        match outcome {
            Outcome::Disabled => self.disabled += 1,
            Outcome::Analyzed(verdict) => {
                match verdict {
                    Verdict::NotApplicable(_) => self.not_applicable += 1,
                    Verdict::SingleCall => self.single_call += 1,
                    Verdict::MultipleCalls { .. } => self.multiple_calls += 1,
                }
                self.eligible_calls += verdict.eligible_count();
            }
        }
    }

    /// Combine totals from another accumulator (e.g. a parallel worker).
    pub fn merge(&mut self, other: &AnalysisStats) {
        self.functions += other.functions;
        self.disabled += other.disabled;
        self.not_applicable += other.not_applicable;
        self.single_call += other.single_call;
        self.multiple_calls += other.multiple_calls;
        self.eligible_calls += other.eligible_calls;
    }
}

// =============================================================================
// Pass
// =============================================================================

/// Driver-facing analysis pass.
#[derive(Debug, Default)]
pub struct TailCallPass {
    stats: AnalysisStats,
}

impl TailCallPass {
    /// Create a new pass with zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass name for diagnostics.
    pub fn name(&self) -> &'static str {
        "tailcall-eligibility"
    }

    /// Run the analysis on one function.
    ///
    /// The disable flag short-circuits everything else, including the
    /// structural preconditions.
    pub fn run(&mut self, func: &Function) -> Outcome {
        let outcome = if func.tail_calls_disabled() {
            Outcome::Disabled
        } else {
            Outcome::Analyzed(classify(func))
        };
        self.stats.record(outcome);
        outcome
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> &AnalysisStats {
        &self.stats
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    fn single_call_func(name: &str) -> Function {
        let mut b = FunctionBuilder::new(name, 0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let r = b.call("g", &[]);
        b.ret(Some(r));
        b.finish().unwrap()
    }

    #[test]
    fn test_pass_name() {
        assert_eq!(TailCallPass::new().name(), "tailcall-eligibility");
    }

    #[test]
    fn test_disable_flag_short_circuits() {
        let mut b = FunctionBuilder::new("f", 0);
        b.disable_tail_calls();
        // Even an empty body is not classified when disabled.
        let func = b.finish().unwrap();

        let mut pass = TailCallPass::new();
        assert_eq!(pass.run(&func), Outcome::Disabled);
        assert_eq!(pass.stats().disabled, 1);
        assert_eq!(pass.stats().not_applicable, 0);
    }

    #[test]
    fn test_pass_produces_verdict() {
        let func = single_call_func("f");
        let mut pass = TailCallPass::new();

        assert_eq!(pass.run(&func), Outcome::Analyzed(Verdict::SingleCall));
        assert_eq!(pass.stats().single_call, 1);
        assert_eq!(pass.stats().eligible_calls, 1);
    }

    #[test]
    fn test_stats_accumulate_across_functions() {
        let mut pass = TailCallPass::new();
        pass.run(&single_call_func("a"));
        pass.run(&single_call_func("b"));
        pass.run(&FunctionBuilder::new("empty", 0).finish().unwrap());

        let stats = pass.stats();
        assert_eq!(stats.functions, 3);
        assert_eq!(stats.single_call, 2);
        assert_eq!(stats.not_applicable, 1);
        assert_eq!(stats.eligible_calls, 2);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = AnalysisStats::new();
        let mut b = AnalysisStats::new();
        a.record(Outcome::Analyzed(Verdict::SingleCall));
        b.record(Outcome::Analyzed(Verdict::MultipleCalls { count: 3 }));
        b.record(Outcome::Disabled);

        a.merge(&b);
        assert_eq!(a.functions, 3);
        assert_eq!(a.eligible_calls, 4);
        assert_eq!(a.disabled, 1);
    }
}
