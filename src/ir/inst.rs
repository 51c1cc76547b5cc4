//! Instruction and value definitions.
//!
//! The IR is block-structured SSA: every instruction lives in exactly one
//! basic block, produces at most one result value, and names its operands
//! through [`ValueId`]s. Use-def chains are maintained by the owning
//! [`Function`](super::Function), not by the instructions themselves.
//!
//! The opcode vocabulary is deliberately small. It covers exactly the shapes
//! the eligibility analysis distinguishes: stack allocation, memory access,
//! calls with their attribute surface, the address-preserving forwarding
//! group, a handful of plain value operations, and terminators.

use smallvec::SmallVec;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of an instruction within a function.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(pub(crate) u32);

/// Identifier of an SSA value within a function.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) u32);

/// Identifier of a basic block within a function.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u32);

impl InstId {
    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl ValueId {
    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Debug for InstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0)
    }
}

impl std::fmt::Debug for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl std::fmt::Debug for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

// =============================================================================
// Use-Def Edges
// =============================================================================

/// A single use-def edge: `inst` consumes some value in operand slot `index`.
///
/// The operand slot matters to the analysis: a store escapes a value only
/// when it appears in the *stored value* slot, and call argument attributes
/// are resolved per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    /// The consuming instruction.
    pub inst: InstId,
    /// Operand slot within the consuming instruction.
    pub index: u32,
}

// =============================================================================
// Value Definitions
// =============================================================================

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// Function parameter by index.
    Param(u32),
    /// Result of an instruction.
    Inst(InstId),
    /// Integer constant.
    Const(i64),
    /// Address of a global, by index into the function's global table.
    Global(u32),
}

// =============================================================================
// Call Sites
// =============================================================================

/// Per-argument attributes at a call site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArgAttrs {
    /// The argument is passed as a guaranteed bitwise copy; the callee can
    /// never observe the original address.
    pub byval: bool,
    /// The callee does not retain the pointer beyond the call.
    pub nocapture: bool,
}

impl ArgAttrs {
    /// By-value passing, nothing else.
    pub const BYVAL: ArgAttrs = ArgAttrs {
        byval: true,
        nocapture: false,
    };

    /// Non-capturing pointer argument.
    pub const NOCAPTURE: ArgAttrs = ArgAttrs {
        byval: false,
        nocapture: true,
    };
}

/// A call site: callee name plus the attributes the analysis consults.
///
/// Operands of the owning instruction are the call arguments, in order;
/// `arg_attrs` is parallel to them (missing entries default to no attributes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Name of the callee.
    pub callee: String,
    /// The callee may return control to this site more than once.
    pub returns_twice: bool,
    /// The callee provably does not write memory.
    pub readonly: bool,
    /// Per-argument attributes, parallel to the instruction's operands.
    pub arg_attrs: SmallVec<[ArgAttrs; 4]>,
}

impl CallSite {
    /// Create a call site with no attributes set.
    pub fn new(callee: &str) -> Self {
        CallSite {
            callee: callee.to_string(),
            returns_twice: false,
            readonly: false,
            arg_attrs: SmallVec::new(),
        }
    }

    /// Mark the callee as possibly returning twice.
    pub fn returns_twice(mut self) -> Self {
        self.returns_twice = true;
        self
    }

    /// Mark the callee as read-only on memory.
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Set attributes for argument `index`, growing the table as needed.
    pub fn arg_attr(mut self, index: usize, attrs: ArgAttrs) -> Self {
        if self.arg_attrs.len() <= index {
            self.arg_attrs.resize(index + 1, ArgAttrs::default());
        }
        self.arg_attrs[index] = attrs;
        self
    }

    /// Check whether argument `index` is passed by value.
    #[inline]
    pub fn is_byval_arg(&self, index: usize) -> bool {
        self.arg_attrs.get(index).is_some_and(|a| a.byval)
    }

    /// Check whether argument `index` is non-capturing.
    #[inline]
    pub fn is_nocapture_arg(&self, index: usize) -> bool {
        self.arg_attrs.get(index).is_some_and(|a| a.nocapture)
    }
}

// =============================================================================
// Opcodes
// =============================================================================

/// Integer arithmetic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

/// Integer comparison operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
}

/// Instruction opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// Allocate `size` bytes in the current frame; result is the address.
    StackAlloc {
        /// Allocation size in bytes.
        size: u32,
    },
    /// Load from an address. Operands: `[addr]`.
    Load,
    /// Store a value to an address. Operands: `[value, addr]`.
    Store,
    /// Call a function. Operands are the arguments, in order.
    Call(CallSite),
    /// Reinterpret a value's type without changing its bits.
    BitCast,
    /// Cast a pointer to a different address space.
    AddrSpaceCast,
    /// Compute an element address. Operands: `[base, index]`.
    GetElementPtr,
    /// SSA merge of values from predecessor blocks.
    Phi,
    /// Choose between two values. Operands: `[cond, on_true, on_false]`.
    Select,
    /// Integer arithmetic. Operands: `[lhs, rhs]`.
    IntOp(ArithOp),
    /// Integer comparison. Operands: `[lhs, rhs]`.
    IntCmp(CmpOp),
    /// Convert a pointer to an integer.
    PtrToInt,
    /// Return from the function. Operands: `[]` or `[value]`.
    Ret,
    /// Unconditional branch.
    Br {
        /// Branch target.
        target: BlockId,
    },
    /// Conditional branch. Operands: `[cond]`.
    CondBr {
        /// Target when the condition is true.
        then_target: BlockId,
        /// Target when the condition is false.
        else_target: BlockId,
    },
    /// Control never reaches past this point.
    Unreachable,
}

impl Opcode {
    /// Check whether this opcode ends a basic block.
    #[inline]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Ret | Opcode::Br { .. } | Opcode::CondBr { .. } | Opcode::Unreachable
        )
    }

    /// Check whether this opcode is a call.
    #[inline]
    pub fn is_call(&self) -> bool {
        matches!(self, Opcode::Call(_))
    }

    /// Check whether this opcode produces a result value.
    #[inline]
    pub fn has_result(&self) -> bool {
        !matches!(
            self,
            Opcode::Store
                | Opcode::Ret
                | Opcode::Br { .. }
                | Opcode::CondBr { .. }
                | Opcode::Unreachable
        )
    }
}

// =============================================================================
// Instructions
// =============================================================================

/// An instruction: opcode, operand values, optional result, owning block.
#[derive(Debug, Clone)]
pub struct Inst {
    /// What the instruction does.
    pub opcode: Opcode,
    /// Operand values, in slot order.
    pub operands: SmallVec<[ValueId; 2]>,
    /// Result value, if the opcode produces one.
    pub result: Option<ValueId>,
    /// Block this instruction belongs to.
    pub block: BlockId,
}

impl Inst {
    /// Get the call site metadata, if this is a call.
    #[inline]
    pub fn call_site(&self) -> Option<&CallSite> {
        match &self.opcode {
            Opcode::Call(site) => Some(site),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
