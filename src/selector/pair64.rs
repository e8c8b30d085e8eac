//! 64-bit arithmetic on 32-bit targets (§4.2.6): `Int32Pair{Add,Sub,Mul,Shl,
//! Shr,Sar}` lower to dedicated pair opcodes over `UniqueRegister` half-word
//! pairs, degenerating to the 32-bit low-half instruction when the high
//! half is unused.

use crate::error::SelectionResult;
use crate::frame::FrameHandle;
use crate::instr::{ArchOpcode, Instruction};
use crate::ir::Node;

use super::Selector;

impl<'g, F: FrameHandle> Selector<'g, F> {
    pub(super) fn visit_pair_arith(
        &mut self,
        node: Node,
        pair_opcode: ArchOpcode,
        low_half_opcode: ArchOpcode,
    ) -> SelectionResult<()> {
        let low_left = self.graph.input(node, 0);
        let high_left = self.graph.input(node, 1);
        let low_right = self.graph.input(node, 2);
        let high_right = self.graph.input(node, 3);
        let ops = self.operands();

        let high_used = self.graph.find_projection(node, 1).is_some();
        if !high_used {
            let out = ops.define_as_register(node);
            let lhs = ops.use_register(low_left);
            let rhs = ops.use_register(low_right);
            self.emit(Instruction::new(low_half_opcode).with_outputs([out]).with_inputs([lhs, rhs]));
            return Ok(());
        }

        let low_out = ops.define_as_register(node);
        let high_out = self
            .graph
            .find_projection(node, 1)
            .map(|p| ops.define_as_register(p))
            .unwrap();
        let inputs = [
            ops.use_unique_register(low_left),
            ops.use_unique_register(high_left),
            ops.use_unique_register(low_right),
            ops.use_unique_register(high_right),
        ];
        self.emit(
            Instruction::new(pair_opcode)
                .with_outputs([low_out, high_out])
                .with_inputs(inputs),
        );
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
    fn pair_add_degenerates_to_low_half_when_high_unused() {
        let mut graph = MidIrGraph::new();
        let ll = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let lh = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let rl = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let rh = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let node = graph.add_node(OperatorKind::Int32PairAdd, OperatorParams::default(), vec![ll, lh, rl, rh]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        sel.visit(node).unwrap();
        assert_eq!(sel.sequence.len(), 1);
        assert_eq!(sel.sequence.instructions[0].opcode, ArchOpcode::Add);
    }

    #[test]
    fn pair_add_uses_pair_opcode_when_high_half_used() {
        let mut graph = MidIrGraph::new();
        let ll = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let lh = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let rl = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let rh = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let node = graph.add_node(OperatorKind::Int32PairAdd, OperatorParams::default(), vec![ll, lh, rl, rh]);
        graph.add_projection(node, 1);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        sel.visit(node).unwrap();
        assert_eq!(sel.sequence.instructions[0].opcode, ArchOpcode::AddPair);
    }
}
