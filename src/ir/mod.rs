//! Block-structured SSA intermediate representation.
//!
//! This is the input boundary of the analysis: a realized function object
//! with basic blocks, instructions, use-def chains, parameter attributes
//! (by-value marking) and call-site attributes (non-capturing, read-only,
//! returns-twice). The analysis requires read access only and never mutates
//! a function.
//!
//! # Core Components
//!
//! - **Instructions** (`inst.rs`): opcodes, call sites, ids, use-def edges
//! - **Function** (`function.rs`): blocks, value tables, structural queries
//! - **Builder** (`builder.rs`): the sole construction path; enforces the
//!   invariant that every block ends in exactly one terminator
//!
//! # Design Principles
//!
//! - **Index-based ids**: `u32` newtypes instead of pointers or `Rc`
//! - **Container-owned use chains**: fast reachability traversals
//! - **Fail-fast construction**: malformed bodies never reach the analysis

pub mod builder;
pub mod function;
pub mod inst;

pub use builder::FunctionBuilder;
pub use function::{BasicBlock, Function, Param, ValidationError};
pub use inst::{
    ArgAttrs, ArithOp, BlockId, CallSite, CmpOp, Inst, InstId, Opcode, Use, ValueDef, ValueId,
};
