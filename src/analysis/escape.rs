//! Escape tracking over stack-frame-local storage.
//!
//! The tracker answers one question per function: which instructions merely
//! *touch* frame-local memory, and which let a frame-local address outlive
//! the frame's reuse point. Reusing a caller's frame for a tail call while a
//! callee could still read or write into that frame is a memory-safety
//! violation, so every value derived from a stack root (a stack allocation or
//! a by-value parameter) is traced transitively through use-def edges.
//!
//! The analysis is a conservative over-approximation: false positives
//! (treating a safe instruction as escaping) are acceptable, false negatives
//! are not. Any instruction kind not explicitly classified as
//! address-preserving is assumed to leak the address.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::ir::{Function, InstId, Opcode, Use, ValueId};

// =============================================================================
// Escape Summary
// =============================================================================

/// The tracker's output: per-instruction escape facts for one function.
///
/// The two sets may overlap: a call can both touch a root and escape it.
#[derive(Debug, Default)]
pub struct EscapeSummary {
    /// Calls that receive a root-derived value as an operand, excluding
    /// operands passed by guaranteed-copy semantics.
    call_users: FxHashSet<InstId>,
    /// Instructions that let a root-derived address outlive or leave the
    /// frame's synchronous control, plus calls reachable after such a point.
    escaped: FxHashSet<InstId>,
    /// Calls whose only contact with frame memory is a by-value copy; the
    /// callee provably cannot observe the original address.
    byval_copies: FxHashSet<InstId>,
}

impl EscapeSummary {
    /// Calls that touch frame-local memory.
    #[inline]
    pub fn call_users(&self) -> &FxHashSet<InstId> {
        &self.call_users
    }

    /// Instructions through which a frame-local address escapes.
    #[inline]
    pub fn escaped(&self) -> &FxHashSet<InstId> {
        &self.escaped
    }

    /// Calls receiving roots only as guaranteed bitwise copies.
    #[inline]
    pub fn byval_copies(&self) -> &FxHashSet<InstId> {
        &self.byval_copies
    }

    /// Check whether an instruction touches frame-local memory as a call.
    #[inline]
    pub fn is_call_user(&self, id: InstId) -> bool {
        self.call_users.contains(&id)
    }

    /// Check whether an instruction escapes a frame-local address.
    #[inline]
    pub fn is_escaped(&self, id: InstId) -> bool {
        self.escaped.contains(&id)
    }
}

// =============================================================================
// Escape Tracker
// =============================================================================

/// Computes an [`EscapeSummary`] for a function.
///
/// One traversal runs per stack root; traversals share the output sets but
/// keep independent visited-edge state. A visited-edge set (rather than a
/// visited-instruction set on a recursive walk) guarantees termination on
/// cyclic use-def chains, which arise from phis in loops.
#[derive(Debug)]
pub struct EscapeTracker<'f> {
    func: &'f Function,
    summary: EscapeSummary,
}

impl<'f> EscapeTracker<'f> {
    /// Track every stack root in `func` and return the merged summary.
    pub fn track_all(func: &'f Function) -> EscapeSummary {
        let mut tracker = EscapeTracker {
            func,
            summary: EscapeSummary::default(),
        };
        for root in tracker.stack_roots() {
            tracker.walk(root);
        }
        tracker.taint_calls_after_escape();
        tracker.summary
    }

    /// Enumerate stack roots: by-value parameters in index order, then every
    /// stack allocation found by a single linear scan of the blocks.
    fn stack_roots(&self) -> Vec<ValueId> {
        let func = self.func;
        let mut roots: Vec<ValueId> = func
            .params()
            .iter()
            .enumerate()
            .filter(|(_, param)| param.byval)
            .map(|(index, _)| func.param_value(index as u32))
            .collect();

        for (_, inst) in func.iter_insts() {
            if matches!(inst.opcode, Opcode::StackAlloc { .. }) {
                if let Some(result) = inst.result {
                    roots.push(result);
                }
            }
        }
        roots
    }

    /// Worklist traversal over use-def edges starting from one root.
    fn walk(&mut self, root: ValueId) {
        let func = self.func;
        let mut visited: FxHashSet<Use> = FxHashSet::default();
        let mut worklist: VecDeque<Use> = func.uses(root).iter().copied().collect();

        while let Some(edge) = worklist.pop_front() {
            if !visited.insert(edge) {
                continue;
            }
            let inst = func.inst(edge.inst);

            let propagate = match &inst.opcode {
                Opcode::Call(site) => {
                    // A by-value argument copies the contents of the root
                    // into storage that exists beyond this frame; the callee
                    // never sees the original address.
                    if site.is_byval_arg(edge.index as usize) {
                        self.summary.byval_copies.insert(edge.inst);
                        continue;
                    }
                    self.summary.call_users.insert(edge.inst);
                    // A non-capturing argument cannot propagate to the
                    // call's result either; the attribute is a closed
                    // guarantee.
                    if site.is_nocapture_arg(edge.index as usize) {
                        continue;
                    }
                    if !site.readonly {
                        self.summary.escaped.insert(edge.inst);
                    }
                    // Call results are fresh values and never alias a root.
                    false
                }
                // The loaded value is not root-derived.
                Opcode::Load => false,
                Opcode::Store => {
                    // Slot 0 is the stored value: writing the address itself
                    // into memory escapes it. Slot 1 is the address being
                    // written through, which stays within the frame.
                    if edge.index == 0 {
                        self.summary.escaped.insert(edge.inst);
                    }
                    false
                }
                Opcode::BitCast
                | Opcode::AddrSpaceCast
                | Opcode::GetElementPtr
                | Opcode::Phi
                | Opcode::Select => true,
                // Unknown instruction kinds are assumed to leak the address.
                _ => {
                    self.summary.escaped.insert(edge.inst);
                    true
                }
            };

            if propagate {
                if let Some(result) = inst.result {
                    worklist.extend(func.uses(result).iter().copied());
                }
            }
        }
    }

    /// Forward may-escape dataflow: once an address has escaped, any callee
    /// reached afterwards could observe it through memory, so every call
    /// site strictly after an escape point is itself recorded as escaped.
    ///
    /// Working over the CFG rather than block layout keeps the result
    /// invariant under reordering of independent blocks.
    fn taint_calls_after_escape(&mut self) {
        let func = self.func;
        if self.summary.escaped.is_empty() {
            return;
        }

        // Blocks whose entry is reachable from an escape point.
        let mut tainted_entry = FxHashSet::default();
        let mut worklist: VecDeque<_> = VecDeque::new();
        for &inst_id in &self.summary.escaped {
            worklist.extend(func.successors(func.inst(inst_id).block));
        }
        while let Some(block) = worklist.pop_front() {
            if tainted_entry.insert(block) {
                worklist.extend(func.successors(block));
            }
        }

        for block_id in func.block_ids() {
            let mut tainted = tainted_entry.contains(&block_id);
            for &inst_id in func.block(block_id).insts() {
                if tainted && func.inst(inst_id).opcode.is_call() {
                    self.summary.escaped.insert(inst_id);
                }
                if self.summary.escaped.contains(&inst_id) {
                    tainted = true;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArgAttrs, ArithOp, CallSite, CmpOp, FunctionBuilder};

    #[test]
    fn test_no_roots_empty_summary() {
        let mut b = FunctionBuilder::new("f", 1);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let arg = b.param_value(0);
        let r = b.call("g", &[arg]);
        b.ret(Some(r));
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        assert!(summary.call_users().is_empty());
        assert!(summary.escaped().is_empty());
        assert!(summary.byval_copies().is_empty());
    }

    #[test]
    fn test_alloca_passed_to_call_escapes() {
        let mut b = FunctionBuilder::new("f", 0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        let call = b.call("sink", &[slot]);
        b.ret(Some(call));
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(summary.is_call_user(call_inst));
        assert!(summary.is_escaped(call_inst));
    }

    #[test]
    fn test_readonly_call_does_not_escape() {
        let mut b = FunctionBuilder::new("f", 0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        b.call_with(CallSite::new("peek").readonly(), &[slot]);
        b.ret(None);
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(summary.is_call_user(call_inst));
        assert!(!summary.is_escaped(call_inst));
    }

    #[test]
    fn test_nocapture_arg_does_not_escape() {
        let mut b = FunctionBuilder::new("f", 0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        b.call_with(
            CallSite::new("fill").arg_attr(0, ArgAttrs::NOCAPTURE),
            &[slot],
        );
        b.ret(None);
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(summary.is_call_user(call_inst));
        assert!(!summary.is_escaped(call_inst));
    }

    #[test]
    fn test_byval_arg_is_ignored() {
        let mut b = FunctionBuilder::new("f", 0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(16);
        b.call_with(CallSite::new("copy_in").arg_attr(0, ArgAttrs::BYVAL), &[slot]);
        b.ret(None);
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(!summary.is_call_user(call_inst));
        assert!(!summary.is_escaped(call_inst));
        assert!(summary.byval_copies().contains(&call_inst));
    }

    #[test]
    fn test_store_of_address_escapes() {
        let mut b = FunctionBuilder::new("f", 0);
        let g = b.global("cell");
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        b.store(slot, g);
        b.ret(None);
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        assert_eq!(summary.escaped().len(), 1);
    }

    #[test]
    fn test_store_into_slot_is_safe() {
        let mut b = FunctionBuilder::new("f", 1);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        let arg = b.param_value(0);
        b.store(arg, slot);
        let v = b.load(slot);
        b.ret(Some(v));
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        assert!(summary.escaped().is_empty());
        assert!(summary.call_users().is_empty());
    }

    #[test]
    fn test_propagation_through_address_preserving_ops() {
        let mut b = FunctionBuilder::new("f", 0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(32);
        let idx = b.const_int(4);
        let elem = b.gep(slot, idx);
        let cast = b.bitcast(elem);
        let call = b.call("sink", &[cast]);
        b.ret(Some(call));
        let func = b.finish().unwrap();

        // The root reaches the call only through gep + bitcast.
        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(summary.is_call_user(call_inst));
        assert!(summary.is_escaped(call_inst));
    }

    #[test]
    fn test_unknown_instruction_is_conservative() {
        let mut b = FunctionBuilder::new("f", 0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        let as_int = b.ptr_to_int(slot);
        let one = b.const_int(1);
        let _sum = b.int_op(ArithOp::Add, as_int, one);
        b.ret(None);
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        // ptr_to_int escapes and propagates; the add escapes too.
        assert_eq!(summary.escaped().len(), 2);
    }

    #[test]
    fn test_phi_cycle_terminates() {
        let mut b = FunctionBuilder::new("f", 0);
        let entry = b.create_block();
        let header = b.create_block();
        let exit = b.create_block();

        b.switch_to_block(entry);
        let slot = b.stack_alloc(64);
        b.br(header);

        b.switch_to_block(header);
        let cursor = b.phi(&[slot]);
        let step = b.const_int(8);
        let next = b.gep(cursor, step);
        b.add_phi_input(cursor, next);
        let done = b.int_cmp(CmpOp::Eq, next, step);
        b.cond_br(done, exit, header);

        b.switch_to_block(exit);
        b.ret(None);
        let func = b.finish().unwrap();

        // The phi and gep form a use-def cycle; the walk must terminate.
        let summary = EscapeTracker::track_all(&func);
        // The comparison is an unknown consumer of the root-derived gep.
        assert!(!summary.escaped().is_empty());
    }

    #[test]
    fn test_by_value_parameter_is_a_root() {
        let mut b = FunctionBuilder::new("f", 1);
        b.set_byval(0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let arg = b.param_value(0);
        let call = b.call("sink", &[arg]);
        b.ret(Some(call));
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(summary.is_call_user(call_inst));
        assert!(summary.is_escaped(call_inst));
    }

    #[test]
    fn test_reference_parameter_is_not_a_root() {
        let mut b = FunctionBuilder::new("f", 1);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let arg = b.param_value(0);
        let call = b.call("sink", &[arg]);
        b.ret(Some(call));
        let func = b.finish().unwrap();

        // The pointer is owned by the caller; nothing frame-local flows out.
        let summary = EscapeTracker::track_all(&func);
        assert!(summary.call_users().is_empty());
        assert!(summary.escaped().is_empty());
    }

    #[test]
    fn test_call_after_escape_point_is_tainted() {
        let mut b = FunctionBuilder::new("f", 0);
        let g = b.global("cell");
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        b.store(slot, g);
        let call = b.call("unrelated", &[]);
        b.ret(Some(call));
        let func = b.finish().unwrap();

        // The call never touches the root, but the address already escaped
        // through the store; the callee could reach it via the global.
        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(summary.is_escaped(call_inst));
        assert!(!summary.is_call_user(call_inst));
    }

    #[test]
    fn test_call_before_escape_point_is_clean() {
        let mut b = FunctionBuilder::new("f", 0);
        let g = b.global("cell");
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        let call = b.call("unrelated", &[]);
        b.store(slot, g);
        b.ret(Some(call));
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(!summary.is_escaped(call_inst));
    }

    #[test]
    fn test_taint_crosses_block_boundaries() {
        let mut b = FunctionBuilder::new("f", 0);
        let g = b.global("cell");
        let entry = b.create_block();
        let next = b.create_block();

        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        b.store(slot, g);
        b.br(next);

        b.switch_to_block(next);
        let call = b.call("unrelated", &[]);
        b.ret(Some(call));
        let func = b.finish().unwrap();

        let summary = EscapeTracker::track_all(&func);
        let call_inst = func.call_sites()[0];
        assert!(summary.is_escaped(call_inst));
    }

    #[test]
    fn test_track_all_is_deterministic() {
        let mut b = FunctionBuilder::new("f", 0);
        let entry = b.create_block();
        b.switch_to_block(entry);
        let slot = b.stack_alloc(8);
        let call = b.call("sink", &[slot]);
        b.ret(Some(call));
        let func = b.finish().unwrap();

        let first = EscapeTracker::track_all(&func);
        let second = EscapeTracker::track_all(&func);
        assert_eq!(first.call_users(), second.call_users());
        assert_eq!(first.escaped(), second.escaped());
    }
}
