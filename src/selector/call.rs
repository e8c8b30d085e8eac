//! Call & return ABI lowering (C7, §4.2.8): argument preparation for C and
//! non-C call conventions, and caller-frame result extraction.

use crate::error::SelectionResult;
use crate::frame::FrameHandle;
use crate::instr::{ArchOpcode, Instruction};
use crate::ir::Node;

use super::Selector;

/// Matches the ABI's reserved argument-slot count before the first
/// caller-provided C argument.
const C_ARG_SLOT_COUNT: i64 = 0;
const POINTER_SIZE: i64 = 4;

impl<'g, F: FrameHandle> Selector<'g, F> {
    pub(super) fn visit_call(&mut self, node: Node, is_c_call: bool) -> SelectionResult<()> {
        let all_inputs = self.graph.inputs(node);
        let target = all_inputs[0];
        let args: Vec<Node> = all_inputs[1..].to_vec();
        let ops = self.operands();

        if is_c_call {
            self.emit(Instruction::new(ArchOpcode::PrepareCallCFunction).with_misc(args.len() as u32));
            for (i, &arg) in args.iter().enumerate() {
                let ops = self.operands();
                let slot = ops.use_immediate_value(C_ARG_SLOT_COUNT + i as i64);
                let value = ops.use_register(arg);
                self.emit(Instruction::new(ArchOpcode::StoreToStackSlot).with_inputs([slot, value]));
            }
        } else {
            if !args.is_empty() {
                let claim = ops.use_immediate_value(args.len() as i64 * POINTER_SIZE);
                self.emit(Instruction::new(ArchOpcode::StackClaim).with_inputs([claim]));
            }
            for (i, &arg) in args.iter().enumerate() {
                let ops = self.operands();
                let slot = ops.use_immediate_value(i as i64);
                let value = ops.use_register(arg);
                self.emit(Instruction::new(ArchOpcode::StoreToStackSlot).with_inputs([slot, value]));
            }
        }

        let target_op = self.operands().use_register(target);
        let out = self.operands().define_as_register(node);
        self.emit(
            Instruction::new(if is_c_call { ArchOpcode::CallC } else { ArchOpcode::CallTarget })
                .with_outputs([out])
                .with_inputs([target_op]),
        );
        Ok(())
    }

    /// For each caller-frame result slot, emit `Peek` at a reverse-slot
    /// index, stepping by the result's size in pointer words. The output
    /// operand's virtual id still points at the result node, so the
    /// register allocator can read its representation and choose the FP
    /// file for float results without this pass needing a second opcode.
    pub(super) fn visit_return(&mut self, node: Node) -> SelectionResult<()> {
        let results: Vec<Node> = self.graph.inputs(node).to_vec();
        for (reverse_slot, &result) in results.iter().rev().enumerate() {
            let ops = self.operands();
            let slot = ops.use_immediate_value(reverse_slot as i64);
            let out = ops.define_as_register(result);
            self.emit(Instruction::new(ArchOpcode::Peek).with_outputs([out]).with_inputs([slot]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BumpFrame;
    use crate::ir::{MidIrGraph, OperatorKind, OperatorParams};
    use crate::selector::{Flags, Selector};

    #[test]
    fn c_call_prepares_then_stores_each_argument() {
        let mut graph = MidIrGraph::new();
        let target = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let a0 = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let a1 = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let call = graph.add_node(OperatorKind::CallC, OperatorParams::default(), vec![target, a0, a1]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        sel.visit(call).unwrap();
        assert_eq!(sel.sequence.instructions[0].opcode, ArchOpcode::PrepareCallCFunction);
        assert_eq!(sel.sequence.instructions[0].misc, 2);
    }

    #[test]
    fn non_c_call_claims_stack_before_storing_args() {
        let mut graph = MidIrGraph::new();
        let target = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let a0 = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let call = graph.add_node(OperatorKind::Call, OperatorParams::default(), vec![target, a0]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        sel.visit(call).unwrap();
        assert_eq!(sel.sequence.instructions[0].opcode, ArchOpcode::StackClaim);
    }
}
