//! Eligibility classification.
//!
//! The classifier runs the cheap structural preconditions first, then invokes
//! the escape tracker and folds everything into a single tagged [`Verdict`].
//! Every outcome is a valid verdict variant; there is no failure path for a
//! well-formed function. "Not applicable" reasons are diagnostic data, not
//! errors.

use crate::ir::{Function, InstId};

use super::escape::{EscapeSummary, EscapeTracker};

// =============================================================================
// Skip Reasons
// =============================================================================

/// Why tail calls are not applicable in a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// No qualifying call sites.
    NoCalls,
    /// The function calls a function that may return twice; the frame must
    /// stay intact for the non-local jump back.
    ReturnsTwice,
    /// The function body is empty.
    EmptyFunction,
    /// No block ends in a return instruction.
    NoReturnInsts,
}

impl SkipReason {
    /// Human-readable explanation for diagnostics.
    pub fn explain(self) -> &'static str {
        match self {
            SkipReason::NoCalls => "No tail calls found",
            SkipReason::ReturnsTwice => "Function calls a function that returns twice",
            SkipReason::EmptyFunction => "Function is empty",
            SkipReason::NoReturnInsts => "Function has no return instructions",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.explain())
    }
}

// =============================================================================
// Verdict
// =============================================================================

/// The classification result: the analysis's entire externally visible
/// output, consumed by the downstream marking/codegen step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Tail calls are not applicable, with the reason why.
    NotApplicable(SkipReason),
    /// Exactly one call qualifies for frame reuse.
    SingleCall,
    /// Several calls qualify.
    MultipleCalls {
        /// Number of qualifying calls.
        count: usize,
    },
}

impl Verdict {
    /// Check whether any call qualified.
    #[inline]
    pub fn is_applicable(self) -> bool {
        !matches!(self, Verdict::NotApplicable(_))
    }

    /// Number of qualifying calls.
    #[inline]
    pub fn eligible_count(self) -> usize {
        match self {
            Verdict::NotApplicable(_) => 0,
            Verdict::SingleCall => 1,
            Verdict::MultipleCalls { count } => count,
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Structural preconditions, in precedence order. `None` means the function
/// is worth running the escape tracker on.
fn structural_skip(func: &Function) -> Option<SkipReason> {
    if func.is_empty() {
        return Some(SkipReason::EmptyFunction);
    }
    if func.calls_returns_twice() {
        return Some(SkipReason::ReturnsTwice);
    }
    if !func.has_return() {
        return Some(SkipReason::NoReturnInsts);
    }
    None
}

/// A call qualifies when no frame-local address can still be observed by the
/// callee: it must not be an escape point (nor follow one), and it must
/// either touch frame memory in a tracked, bounded way (a recorded call
/// user) or not touch any stack root at all. A call whose only contact with
/// a root is a by-value copy still depends on the frame being intact while
/// the copy is made, so byval-only contact does not qualify.
fn qualifies(summary: &EscapeSummary, call: InstId) -> bool {
    if summary.is_escaped(call) {
        return false;
    }
    summary.is_call_user(call) || !summary.byval_copies().contains(&call)
}

/// Classify a function's tail call opportunity.
///
/// Pure and deterministic: the same function always yields the same verdict,
/// and the function is never mutated.
pub fn classify(func: &Function) -> Verdict {
    if let Some(reason) = structural_skip(func) {
        return Verdict::NotApplicable(reason);
    }

    let calls = func.call_sites();
    if calls.is_empty() {
        return Verdict::NotApplicable(SkipReason::NoCalls);
    }

    let summary = EscapeTracker::track_all(func);
    let eligible = calls
        .iter()
        .filter(|&&call| qualifies(&summary, call))
        .count();

    match eligible {
        0 => Verdict::NotApplicable(SkipReason::NoCalls),
        1 => Verdict::SingleCall,
        count => Verdict::MultipleCalls { count },
    }
}

/// The concrete qualifying call sites, in block layout order, for the
/// marking collaborator. Empty whenever [`classify`] would report
/// [`Verdict::NotApplicable`].
pub fn eligible_calls(func: &Function) -> Vec<InstId> {
    if structural_skip(func).is_some() {
        return Vec::new();
    }
    let calls = func.call_sites();
    if calls.is_empty() {
        return Vec::new();
    }
    let summary = EscapeTracker::track_all(func);
    calls
        .into_iter()
        .filter(|&call| qualifies(&summary, call))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
