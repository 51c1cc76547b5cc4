//! Function construction.
//!
//! [`FunctionBuilder`] is the only way to create a [`Function`], and the
//! boundary where malformed input is rejected: misuse of the builder itself
//! (appending past a terminator, foreign value ids) fails fast with a panic,
//! while [`FunctionBuilder::finish`] validates the completed body and refuses
//! to hand out a function whose blocks are not properly terminated.

use smallvec::SmallVec;

use super::function::{BasicBlock, Function, Param, ValidationError, ValueData};
use super::inst::{
    ArithOp, BlockId, CallSite, CmpOp, Inst, InstId, Opcode, Use, ValueDef, ValueId,
};

// =============================================================================
// Function Builder
// =============================================================================

/// Incrementally builds a [`Function`], maintaining use-def chains as
/// instructions are appended.
#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    current: Option<BlockId>,
}

impl FunctionBuilder {
    /// Start building a function with `param_count` parameters.
    pub fn new(name: &str, param_count: u32) -> Self {
        let mut func = Function {
            name: name.to_string(),
            params: vec![Param::default(); param_count as usize],
            param_values: Vec::with_capacity(param_count as usize),
            globals: Vec::new(),
            blocks: Vec::new(),
            insts: Vec::new(),
            values: Vec::new(),
            disable_tail_calls: false,
        };
        for index in 0..param_count {
            let value = ValueId(func.values.len() as u32);
            func.values.push(ValueData {
                def: ValueDef::Param(index),
                uses: Vec::new(),
            });
            func.param_values.push(value);
        }
        FunctionBuilder {
            func,
            current: None,
        }
    }

    /// Mark parameter `index` as by-value (frame-owned storage).
    pub fn set_byval(&mut self, index: u32) {
        self.func.params[index as usize].byval = true;
    }

    /// Disable tail call analysis for this function.
    pub fn disable_tail_calls(&mut self) {
        self.func.disable_tail_calls = true;
    }

    /// The value bound to parameter `index`.
    #[inline]
    pub fn param_value(&self, index: u32) -> ValueId {
        self.func.param_value(index)
    }

    /// Materialize an integer constant.
    pub fn const_int(&mut self, value: i64) -> ValueId {
        self.new_value(ValueDef::Const(value))
    }

    /// Materialize the address of a global.
    pub fn global(&mut self, name: &str) -> ValueId {
        let index = self.func.globals.len() as u32;
        self.func.globals.push(name.to_string());
        self.new_value(ValueDef::Global(index))
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Create a new, empty basic block.
    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        self.func.blocks.push(BasicBlock::default());
        id
    }

    /// Direct subsequent instructions into `block`.
    pub fn switch_to_block(&mut self, block: BlockId) {
        assert!(
            block.index() < self.func.blocks.len(),
            "switch to undefined block {block}"
        );
        self.current = Some(block);
    }

    // =========================================================================
    // Instructions
    // =========================================================================

    /// Allocate `size` bytes of frame storage; returns the address.
    pub fn stack_alloc(&mut self, size: u32) -> ValueId {
        self.append_with_result(Opcode::StackAlloc { size }, &[])
    }

    /// Load from `addr`.
    pub fn load(&mut self, addr: ValueId) -> ValueId {
        self.append_with_result(Opcode::Load, &[addr])
    }

    /// Store `value` to `addr`.
    pub fn store(&mut self, value: ValueId, addr: ValueId) {
        self.append(Opcode::Store, &[value, addr]);
    }

    /// Call `callee` with no attributes; returns the call result.
    pub fn call(&mut self, callee: &str, args: &[ValueId]) -> ValueId {
        self.call_with(CallSite::new(callee), args)
    }

    /// Call with explicit call-site attributes; returns the call result.
    pub fn call_with(&mut self, site: CallSite, args: &[ValueId]) -> ValueId {
        self.append_with_result(Opcode::Call(site), args)
    }

    /// Bit-preserving cast.
    pub fn bitcast(&mut self, value: ValueId) -> ValueId {
        self.append_with_result(Opcode::BitCast, &[value])
    }

    /// Address-space cast.
    pub fn addrspace_cast(&mut self, value: ValueId) -> ValueId {
        self.append_with_result(Opcode::AddrSpaceCast, &[value])
    }

    /// Element address computation from `base` and `index`.
    pub fn gep(&mut self, base: ValueId, index: ValueId) -> ValueId {
        self.append_with_result(Opcode::GetElementPtr, &[base, index])
    }

    /// SSA merge of `incoming` values. More inputs can be added later with
    /// [`FunctionBuilder::add_phi_input`] to close loops.
    pub fn phi(&mut self, incoming: &[ValueId]) -> ValueId {
        self.append_with_result(Opcode::Phi, incoming)
    }

    /// Add an input to an existing phi. This is how cyclic use-def chains
    /// (loop-carried values) are constructed.
    ///
    /// # Panics
    ///
    /// Panics if `phi` is not the result of a phi instruction.
    pub fn add_phi_input(&mut self, phi: ValueId, value: ValueId) {
        self.check_value(value);
        let ValueDef::Inst(inst_id) = self.func.value_def(phi) else {
            panic!("{phi:?} is not a phi result");
        };
        assert!(
            matches!(self.func.inst(inst_id).opcode, Opcode::Phi),
            "{phi:?} is not a phi result"
        );
        let index = self.func.insts[inst_id.index()].operands.len() as u32;
        self.func.insts[inst_id.index()].operands.push(value);
        self.func.values[value.index()].uses.push(Use {
            inst: inst_id,
            index,
        });
    }

    /// Select between `on_true` and `on_false` by `cond`.
    pub fn select(&mut self, cond: ValueId, on_true: ValueId, on_false: ValueId) -> ValueId {
        self.append_with_result(Opcode::Select, &[cond, on_true, on_false])
    }

    /// Integer arithmetic.
    pub fn int_op(&mut self, op: ArithOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.append_with_result(Opcode::IntOp(op), &[lhs, rhs])
    }

    /// Integer comparison.
    pub fn int_cmp(&mut self, op: CmpOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.append_with_result(Opcode::IntCmp(op), &[lhs, rhs])
    }

    /// Pointer-to-integer conversion.
    pub fn ptr_to_int(&mut self, value: ValueId) -> ValueId {
        self.append_with_result(Opcode::PtrToInt, &[value])
    }

    // =========================================================================
    // Terminators
    // =========================================================================

    /// Return, optionally with a value.
    pub fn ret(&mut self, value: Option<ValueId>) {
        match value {
            Some(v) => self.append(Opcode::Ret, &[v]),
            None => self.append(Opcode::Ret, &[]),
        };
    }

    /// Unconditional branch to `target`.
    pub fn br(&mut self, target: BlockId) {
        self.append(Opcode::Br { target }, &[]);
    }

    /// Conditional branch on `cond`.
    pub fn cond_br(&mut self, cond: ValueId, then_target: BlockId, else_target: BlockId) {
        self.append(
            Opcode::CondBr {
                then_target,
                else_target,
            },
            &[cond],
        );
    }

    /// Mark the current point unreachable.
    pub fn unreachable(&mut self) {
        self.append(Opcode::Unreachable, &[]);
    }

    // =========================================================================
    // Finish
    // =========================================================================

    /// Validate and return the completed function.
    pub fn finish(self) -> Result<Function, ValidationError> {
        self.func.validate()?;
        Ok(self.func)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_value(&self, value: ValueId) {
        assert!(
            value.index() < self.func.values.len(),
            "{value:?} does not belong to this function"
        );
    }

    fn append(&mut self, opcode: Opcode, operands: &[ValueId]) -> InstId {
        let block = self.current.expect("no current block");
        if let Some(&last) = self.func.blocks[block.index()].insts.last() {
            assert!(
                !self.func.inst(last).opcode.is_terminator(),
                "appending to terminated block {block}"
            );
        }

        let id = InstId(self.func.insts.len() as u32);
        let result = opcode.has_result().then(|| self.new_value(ValueDef::Inst(id)));

        for (index, &operand) in operands.iter().enumerate() {
            self.check_value(operand);
            self.func.values[operand.index()].uses.push(Use {
                inst: id,
                index: index as u32,
            });
        }

        self.func.insts.push(Inst {
            opcode,
            operands: SmallVec::from_slice(operands),
            result,
            block,
        });
        self.func.blocks[block.index()].insts.push(id);
        id
    }

    fn append_with_result(&mut self, opcode: Opcode, operands: &[ValueId]) -> ValueId {
        let id = self.append(opcode, operands);
        self.func.insts[id.index()]
            .result
            .expect("opcode produces no result")
    }

    fn new_value(&mut self, def: ValueDef) -> ValueId {
        let id = ValueId(self.func.values.len() as u32);
        self.func.values.push(ValueData {
            def,
            uses: Vec::new(),
        });
        id
    }
}

// =============================================================================
// Tests
// =============================================================================
