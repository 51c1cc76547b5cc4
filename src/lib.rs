//! Function-local tail call eligibility analysis.
//!
//! Given a function in a block-structured SSA IR, this crate decides whether
//! calls inside it can be promoted to tail-call form, i.e. executed with the
//! caller's stack frame reused. The hard part is the escape analysis: a frame
//! may only be reused if no callee can still observe an address rooted in that
//! frame, so every value derived from a stack allocation or a by-value
//! parameter is traced through the function's use-def chains.
//!
//! # Components
//!
//! - **IR** (`ir`): the function representation the analysis reads - basic
//!   blocks, instructions, use-def chains, parameter and call-site attributes.
//!   Built through [`ir::FunctionBuilder`], never mutated by the analysis.
//! - **Escape Tracker** (`analysis::escape`): computes which instructions
//!   merely touch frame-local memory and which let an address escape the
//!   frame's lifetime. Conservative: unknown instructions escape.
//! - **Eligibility Classifier** (`analysis::classify`): structural
//!   preconditions plus the tracker's output, folded into a single
//!   [`analysis::Verdict`].
//!
//! The crate performs no transformation; the verdict is the entire output,
//! consumed by a downstream marking/codegen step.
//!
//! # Example
//!
//! ```
//! use tailmark::ir::FunctionBuilder;
//! use tailmark::analysis::{classify, Verdict};
//!
//! let mut b = FunctionBuilder::new("forward", 1);
//! let entry = b.create_block();
//! b.switch_to_block(entry);
//! let arg = b.param_value(0);
//! let result = b.call("target", &[arg]);
//! b.ret(Some(result));
//! let func = b.finish().unwrap();
//!
//! assert_eq!(classify(&func), Verdict::SingleCall);
//! ```

pub mod analysis;
pub mod ir;

pub use analysis::{classify, AnalysisStats, Outcome, SkipReason, TailCallPass, Verdict};
pub use ir::{Function, FunctionBuilder};
