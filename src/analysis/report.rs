//! Textual reporting surface.
//!
//! The core defines no file or wire format; it only knows how to render one
//! line per function for a reporting collaborator. Anything fancier is the
//! driver's business.

use super::{Outcome, Verdict};

// =============================================================================
// Function Report
// =============================================================================

/// One function's analysis outcome, rendered as a diagnostic line.
#[derive(Debug, Clone, Copy)]
pub struct FunctionReport<'a> {
    name: &'a str,
    outcome: Outcome,
}

impl<'a> FunctionReport<'a> {
    /// Create a report for `name`.
    pub fn new(name: &'a str, outcome: Outcome) -> Self {
        FunctionReport { name, outcome }
    }
}

impl std::fmt::Display for FunctionReport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.outcome {
            Outcome::Disabled => {
                write!(f, "Tail call analysis disabled for function {}", self.name)
            }
            Outcome::Analyzed(Verdict::NotApplicable(reason)) => write!(
                f,
                "Tail calls not applicable in function {} because of: {}",
                self.name,
                reason.explain()
            ),
            Outcome::Analyzed(Verdict::SingleCall) => {
                write!(f, "Found single tail call in function {}", self.name)
            }
            Outcome::Analyzed(Verdict::MultipleCalls { count }) => {
                write!(f, "Found {} tail calls in function {}", count, self.name)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
