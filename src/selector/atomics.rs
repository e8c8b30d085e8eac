//! Atomics (§4.2.5): word-32 atomics via the base+index addressing
//! synthesizer, and the `PairLoad`/`PairStore` subset of pair atomics.

use crate::error::SelectionResult;
use crate::frame::FrameHandle;
use crate::instr::{ArchOpcode, AtomicWidth, Instruction};
use crate::ir::{Node, OperatorKind};
use crate::operand::Register;

use super::Selector;

impl<'g, F: FrameHandle> Selector<'g, F> {
    pub(super) fn visit_word32_atomic(&mut self, node: Node, opcode: OperatorKind) -> SelectionResult<()> {
        let base = self.graph.input(node, 0);
        let index = self.graph.input(node, 1);
        let arch_opcode = match opcode {
            OperatorKind::Word32AtomicLoad => ArchOpcode::AtomicLoadWord32,
            OperatorKind::Word32AtomicStore => ArchOpcode::AtomicStoreWord32,
            OperatorKind::Word32AtomicExchange => ArchOpcode::AtomicExchangeWord32,
            OperatorKind::Word32AtomicCompareExchange => ArchOpcode::AtomicCompareExchangeWord32,
            OperatorKind::Word32AtomicAdd => ArchOpcode::AtomicAddWord32,
            OperatorKind::Word32AtomicSub => ArchOpcode::AtomicSubWord32,
            OperatorKind::Word32AtomicAnd => ArchOpcode::AtomicAndWord32,
            OperatorKind::Word32AtomicOr => ArchOpcode::AtomicOrWord32,
            OperatorKind::Word32AtomicXor => ArchOpcode::AtomicXorWord32,
            _ => unreachable!(),
        };
        let addressed = self.synthesize_address(base, index, arch_opcode);
        let ops = self.operands();

        let is_binop = matches!(
            opcode,
            OperatorKind::Word32AtomicAdd
                | OperatorKind::Word32AtomicSub
                | OperatorKind::Word32AtomicAnd
                | OperatorKind::Word32AtomicOr
                | OperatorKind::Word32AtomicXor
        );
        let is_exchange_like = matches!(
            opcode,
            OperatorKind::Word32AtomicExchange | OperatorKind::Word32AtomicCompareExchange
        );

        let mut inputs = vec![addressed.base, addressed.index];
        if opcode != OperatorKind::Word32AtomicLoad {
            let value = self.graph.input(node, 2);
            inputs.push(ops.use_unique_register(value));
        }
        if opcode == OperatorKind::Word32AtomicCompareExchange {
            let expected = self.graph.input(node, 3);
            inputs.push(ops.use_unique_register(expected));
        }

        // Binops need a status register plus a value register plus masking
        // temps for the LL/SC retry loop; exchange/compare-exchange need
        // three; everything else needs none.
        let temp_count = if is_binop { 4 } else if is_exchange_like { 3 } else { 0 };
        let temps: Vec<_> = (0..temp_count).map(|_| ops.temp_register()).collect();

        let out = ops.define_as_unique_register(node);
        self.emit(
            Instruction::new(arch_opcode)
                .with_atomic_width(AtomicWidth::Word32)
                .with_outputs([out])
                .with_inputs(inputs)
                .with_temps(temps),
        );
        Ok(())
    }

    /// Pair-load fixes the low/high halves to a0/a1.
    pub(super) fn visit_pair_load(&mut self, node: Node) -> SelectionResult<()> {
        let base = self.graph.input(node, 0);
        let index = self.graph.input(node, 1);
        let addressed = self.synthesize_address(base, index, ArchOpcode::AtomicPairLoad);
        let ops = self.operands();
        let low = ops.define_as_fixed(node, Register::A0);
        let high = self
            .graph
            .find_projection(node, 1)
            .map(|p| ops.define_as_fixed(p, Register::A1))
            .unwrap_or_else(|| ops.temp_register());
        self.emit(
            Instruction::new(ArchOpcode::AtomicPairLoad)
                .with_atomic_width(AtomicWidth::Word32)
                .with_outputs([low, high])
                .with_inputs([addressed.base, addressed.index]),
        );
        Ok(())
    }

    /// Pair-store fixes the stored value's low/high halves to a1/a2 and
    /// uses t0 as scratch, per the fixed argument-register convention.
    pub(super) fn visit_pair_store(&mut self, node: Node) -> SelectionResult<()> {
        let base = self.graph.input(node, 0);
        let index = self.graph.input(node, 1);
        let value_low = self.graph.input(node, 2);
        let value_high = self.graph.input(node, 3);
        let addressed = self.synthesize_address(base, index, ArchOpcode::AtomicPairStore);
        let ops = self.operands();
        let low = ops.use_fixed(value_low, Register::A1);
        let high = ops.use_fixed(value_high, Register::A2);
        let scratch = ops.temp_fixed(Register::T0);
        self.emit(
            Instruction::new(ArchOpcode::AtomicPairStore)
                .with_atomic_width(AtomicWidth::Word32)
                .with_inputs([addressed.base, addressed.index, low, high])
                .with_temps([scratch]),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BumpFrame;
    use crate::ir::{MidIrGraph, OperatorParams};
    use crate::selector::{Flags, Selector};

    #[test]
    fn pair_atomic_binops_are_unimplemented() {
        let mut graph = MidIrGraph::new();
        let base = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let index = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let value = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let node = graph.add_node(
            OperatorKind::Word32AtomicPairAdd,
            OperatorParams::default(),
            vec![base, index, value],
        );
        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        let err = sel.visit(node).unwrap_err();
        assert!(matches!(err, crate::error::SelectionError::Unimplemented { .. }));
    }

    #[test]
    fn word32_atomic_add_gets_four_scratch_temps() {
        let mut graph = MidIrGraph::new();
        let base = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let index = graph.add_node(
            OperatorKind::Int32Constant,
            OperatorParams { int_constant: Some(0), ..Default::default() },
            vec![],
        );
        let value = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let node = graph.add_node(
            OperatorKind::Word32AtomicAdd,
            OperatorParams::default(),
            vec![base, index, value],
        );
        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        sel.visit(node).unwrap();
        assert_eq!(sel.sequence.instructions.len(), 1);
        assert_eq!(sel.sequence.instructions[0].temps.len(), 4);
        match sel.sequence.instructions[0].outputs[0] {
            crate::operand::Operand::Unallocated { policy, .. } => {
                assert_eq!(policy, crate::operand::Policy::UniqueRegister)
            }
            other => panic!("expected unique register, got {other:?}"),
        }
    }
}
