//! Function representation.
//!
//! A [`Function`] owns its blocks, instructions, values, and use-def chains.
//! The analysis only ever reads it; the one construction path is
//! [`FunctionBuilder`](super::FunctionBuilder), which guarantees the
//! structural invariant that every block ends in exactly one terminator.

use smallvec::SmallVec;
use thiserror::Error;

use super::inst::{BlockId, Inst, InstId, Opcode, Use, ValueDef, ValueId};

// =============================================================================
// Validation
// =============================================================================

/// Structural invariant violations caught at the construction boundary.
///
/// These are contract breaches, not analysis outcomes: a verdict computed for
/// a malformed function would be meaningless, so malformed functions are
/// rejected before the analysis ever sees them.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// A block is empty or does not end in a terminator.
    #[error("block bb{0} does not end in a terminator")]
    MissingTerminator(u32),
    /// A terminator appears before the last instruction of a block.
    #[error("block bb{0} has a terminator before its last instruction")]
    EarlyTerminator(u32),
    /// A branch names a block that does not exist.
    #[error("block bb{0} branches to undefined block bb{1}")]
    UndefinedBlock(u32, u32),
}

// =============================================================================
// Parameters and Blocks
// =============================================================================

/// A function parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Param {
    /// Storage for this parameter is owned by the current frame (the
    /// parameter is a stack root). Pointer parameters without this flag are
    /// owned by the caller.
    pub byval: bool,
}

/// A basic block: an ordered instruction sequence ending in one terminator.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub(crate) insts: Vec<InstId>,
}

impl BasicBlock {
    /// Instructions in program order.
    #[inline]
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }
}

// =============================================================================
// Value Table
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct ValueData {
    pub(crate) def: ValueDef,
    pub(crate) uses: Vec<Use>,
}

// =============================================================================
// Function
// =============================================================================

/// A function body, read-only to the analysis.
#[derive(Debug, Clone)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) params: Vec<Param>,
    pub(crate) param_values: Vec<ValueId>,
    pub(crate) globals: Vec<String>,
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) insts: Vec<Inst>,
    pub(crate) values: Vec<ValueData>,
    pub(crate) disable_tail_calls: bool,
}

impl Function {
    /// Function name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameters, in declaration order.
    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// The value bound to parameter `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[inline]
    pub fn param_value(&self, index: u32) -> ValueId {
        self.param_values[index as usize]
    }

    /// Whether tail call analysis is disabled for this function.
    #[inline]
    pub fn tail_calls_disabled(&self) -> bool {
        self.disable_tail_calls
    }

    /// Name of the global at `index`.
    #[inline]
    pub fn global_name(&self, index: u32) -> &str {
        &self.globals[index as usize]
    }

    // =========================================================================
    // Block Access
    // =========================================================================

    /// Number of basic blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the function has an empty body.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block ids in layout order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Get a block.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    /// Successor blocks of `id`, from its terminator.
    pub fn successors(&self, id: BlockId) -> SmallVec<[BlockId; 2]> {
        let mut succs = SmallVec::new();
        if let Some(&last) = self.block(id).insts.last() {
            match self.inst(last).opcode {
                Opcode::Br { target } => succs.push(target),
                Opcode::CondBr {
                    then_target,
                    else_target,
                } => {
                    succs.push(then_target);
                    succs.push(else_target);
                }
                _ => {}
            }
        }
        succs
    }

    // =========================================================================
    // Instruction and Value Access
    // =========================================================================

    /// Get an instruction.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[inline]
    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }

    /// Number of instructions across all blocks.
    #[inline]
    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// Where a value is defined.
    #[inline]
    pub fn value_def(&self, id: ValueId) -> ValueDef {
        self.values[id.index()].def
    }

    /// All use-def edges out of a value: the instructions consuming it.
    #[inline]
    pub fn uses(&self, id: ValueId) -> &[Use] {
        &self.values[id.index()].uses
    }

    /// Iterate all instructions in block layout order.
    pub fn iter_insts(&self) -> impl Iterator<Item = (InstId, &Inst)> {
        self.blocks
            .iter()
            .flat_map(|b| b.insts.iter())
            .map(|&id| (id, self.inst(id)))
    }

    // =========================================================================
    // Analysis Queries
    // =========================================================================

    /// All call sites, in block layout order.
    pub fn call_sites(&self) -> Vec<InstId> {
        self.iter_insts()
            .filter(|(_, inst)| inst.opcode.is_call())
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether any block ends in a return.
    pub fn has_return(&self) -> bool {
        self.blocks.iter().any(|b| {
            b.insts
                .last()
                .is_some_and(|&last| matches!(self.inst(last).opcode, Opcode::Ret))
        })
    }

    /// Whether any call site targets a function that may return twice.
    ///
    /// Reusing a frame for a tail call and then re-entering it through a
    /// second return from such a callee would observe corrupted state, so
    /// this disqualifies the whole function.
    pub fn calls_returns_twice(&self) -> bool {
        self.iter_insts()
            .any(|(_, inst)| inst.call_site().is_some_and(|site| site.returns_twice))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Re-check the structural invariant: every block ends in exactly one
    /// terminator, and branch targets exist.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (index, block) in self.blocks.iter().enumerate() {
            let index = index as u32;
            let Some((&last, body)) = block.insts.split_last() else {
                return Err(ValidationError::MissingTerminator(index));
            };
            if !self.inst(last).opcode.is_terminator() {
                return Err(ValidationError::MissingTerminator(index));
            }
            if body.iter().any(|&id| self.inst(id).opcode.is_terminator()) {
                return Err(ValidationError::EarlyTerminator(index));
            }
            for succ in self.successors(BlockId(index)) {
                if succ.index() >= self.blocks.len() {
                    return Err(ValidationError::UndefinedBlock(index, succ.0));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
