//! Memory access selection rules (§4.2.2): the addressing-mode synthesizer
//! (C4), the representation -> opcode table, and write-barrier emission.

use crate::error::{SelectionError, SelectionResult};
use crate::frame::FrameHandle;
use crate::instr::{AddressingMode, ArchOpcode, AtomicWidth, Instruction};
use crate::ir::{MachineRepresentation, Node, WriteBarrierKind};
use crate::operand::Operand;

use super::Selector;

pub(super) struct Addressed {
    pub mode: AddressingMode,
    pub base: Operand,
    pub index: Operand,
    pub extra: Vec<Operand>,
}

impl<'g, F: FrameHandle> Selector<'g, F> {
    /// Synthesizes an addressing mode for a load/store (§4.2.2 steps 1-3).
    pub(super) fn synthesize_address(&mut self, base: Node, index: Node, opcode: ArchOpcode) -> Addressed {
        let ops = self.operands();

        if let Some(ext) = self.graph.params(base).external_reference {
            if let Some(idx) = self.graph.int_constant(index) {
                if let Ok(delta) = i32::try_from(ext.root_offset + idx) {
                    return Addressed {
                        mode: AddressingMode::RootImm,
                        base: ops.use_immediate_value(0),
                        index: ops.use_immediate_value(delta as i64),
                        extra: vec![],
                    };
                }
            }
        }

        if let Some(idx) = self.graph.int_constant(index) {
            if ops.fits_immediate(idx, opcode) {
                return Addressed {
                    mode: AddressingMode::BaseImm,
                    base: ops.use_register(base),
                    index: ops.use_immediate_value(idx),
                    extra: vec![],
                };
            }
        }

        // Materialize `temp = base + index` into a scratch register, then
        // address with `BaseImm` and immediate 0.
        let tmp = ops.temp_register();
        let base_reg = ops.use_register(base);
        let index_reg = ops.use_register(index);
        self.emit(
            Instruction::new(ArchOpcode::Add)
                .with_outputs([tmp])
                .with_inputs([base_reg, index_reg]),
        );
        let ops = self.operands();
        Addressed {
            mode: AddressingMode::BaseImm,
            base: tmp,
            index: ops.use_immediate_value(0),
            extra: vec![],
        }
    }

    fn load_opcode(representation: MachineRepresentation, unaligned: bool) -> Option<(ArchOpcode, ArchOpcode)> {
        use ArchOpcode::*;
        use MachineRepresentation::*;
        Some(match (representation, unaligned) {
            (Float32, false) => (LoadFloat, LoadFloat),
            (Float32, true) => (ULoadFloat, ULoadFloat),
            (Float64, false) => (LoadDouble, LoadDouble),
            (Float64, true) => (ULoadDouble, ULoadDouble),
            (Word8, false) => (Lb, Lbu),
            (Word16, false) => (Lh, Lhu),
            (Word16, true) => (Ulh, Ulhu),
            (Word32, false) | (MachineRepresentation::TaggedSigned, false) | (MachineRepresentation::TaggedPointer, false) => (Lw, Lw),
            (Word32, true) => (Ulw, Ulw),
            (Simd128, false) => (RvvLd, RvvLd),
            _ => return None,
        })
    }

    fn store_opcode(representation: MachineRepresentation, unaligned: bool) -> Option<ArchOpcode> {
        use ArchOpcode::*;
        use MachineRepresentation::*;
        Some(match (representation, unaligned) {
            (Float32, false) => StoreFloat,
            (Float32, true) => UStoreFloat,
            (Float64, false) => StoreDouble,
            (Float64, true) => UStoreDouble,
            (Word8, false) => Sb,
            (Word16, false) => Sh,
            (Word16, true) => Ush,
            (Word32, false) | (MachineRepresentation::TaggedSigned, false) | (MachineRepresentation::TaggedPointer, false) => Sw,
            (Word32, true) => Usw,
            (Simd128, false) => RvvSt,
            _ => return None,
        })
    }

    pub(super) fn visit_load(&mut self, node: Node, unaligned: bool) -> SelectionResult<()> {
        let representation = self
            .graph
            .params(node)
            .representation
            .unwrap_or(MachineRepresentation::Word32);
        if representation.is_unsupported() {
            return Err(SelectionError::UnsupportedRepresentation {
                function: self.function,
                representation: "rejected load representation",
                line: line!(),
            });
        }
        let (signed_opcode, unsigned_opcode) = Self::load_opcode(representation, unaligned)
            .ok_or(SelectionError::UnsupportedRepresentation {
                function: self.function,
                representation: "rejected load representation",
                line: line!(),
            })?;
        let opcode = if self.graph.params(node).signed { signed_opcode } else { unsigned_opcode };
        let base = self.graph.input(node, 0);
        let index = self.graph.input(node, 1);
        let addressed = self.synthesize_address(base, index, opcode);
        let ops = self.operands();
        let out = ops.define_as_register(node);
        self.emit(
            Instruction::new(opcode)
                .with_addressing_mode(addressed.mode)
                .with_outputs([out])
                .with_inputs([addressed.base, addressed.index]),
        );
        Ok(())
    }

    pub(super) fn visit_store(&mut self, node: Node, unaligned: bool) -> SelectionResult<()> {
        let representation = self
            .graph
            .params(node)
            .representation
            .unwrap_or(MachineRepresentation::Word32);
        if representation.is_unsupported() {
            return Err(SelectionError::UnsupportedRepresentation {
                function: self.function,
                representation: "rejected store representation",
                line: line!(),
            });
        }
        let barrier = self.graph.params(node).write_barrier.unwrap_or(WriteBarrierKind::None);
        let base = self.graph.input(node, 0);
        let index = self.graph.input(node, 1);
        let value = self.graph.input(node, 2);

        if !matches!(barrier, WriteBarrierKind::None) && !self.flags.disable_write_barriers {
            // A write-barrier store never accepts an immediate; base,
            // index, and value are all UniqueRegister.
            let ops = self.operands();
            let base_op = ops.use_unique_register(base);
            let index_op = ops.use_unique_register(index);
            let value_op = ops.use_unique_register(value);
            let scratch1 = ops.temp_register();
            let scratch2 = ops.temp_register();
            let misc = match barrier {
                WriteBarrierKind::Map => 1,
                WriteBarrierKind::Pointer => 2,
                WriteBarrierKind::Full => 3,
                WriteBarrierKind::None => 0,
            };
            self.emit(
                Instruction::new(ArchOpcode::ArchStoreWithWriteBarrier)
                    .with_misc(misc)
                    .with_inputs([base_op, index_op, value_op])
                    .with_temps([scratch1, scratch2]),
            );
            return Ok(());
        }

        let opcode = Self::store_opcode(representation, unaligned).ok_or(SelectionError::UnsupportedRepresentation {
            function: self.function,
            representation: "rejected store representation",
            line: line!(),
        })?;
        let addressed = self.synthesize_address(base, index, opcode);
        let ops = self.operands();
        let value_op = ops.use_register(value);
        self.emit(
            Instruction::new(opcode)
                .with_addressing_mode(addressed.mode)
                .with_inputs([addressed.base, addressed.index, value_op])
                .with_atomic_width(AtomicWidth::None),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BumpFrame;
    use crate::ir::{ExternalReference, MidIrGraph, OperatorKind, OperatorParams};
    use crate::selector::{Flags, Selector};

    fn func_name() -> crate::ir::FunctionName {
        internment::Intern::new("test".to_string())
    }

    #[test]
    fn root_relative_load_folds_external_reference() {
        let mut graph = MidIrGraph::new();
        let base = graph.add_node(
            OperatorKind::Parameter,
            OperatorParams {
                external_reference: Some(ExternalReference { root_offset: 100 }),
                ..Default::default()
            },
            vec![],
        );
        let index = graph.add_node(
            OperatorKind::Int32Constant,
            OperatorParams {
                int_constant: Some(8),
                ..Default::default()
            },
            vec![],
        );
        let load = graph.add_node(
            OperatorKind::Load,
            OperatorParams {
                representation: Some(MachineRepresentation::Word32),
                ..Default::default()
            },
            vec![base, index],
        );

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(load).unwrap();
        let insn = &sel.sequence.instructions[0];
        assert_eq!(insn.addressing_mode, AddressingMode::RootImm);
        assert_eq!(insn.inputs[1].immediate_value(), Some(108));
    }

    #[test]
    fn write_barrier_store_uses_unique_registers() {
        let mut graph = MidIrGraph::new();
        let base = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let index = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let value = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let store = graph.add_node(
            OperatorKind::Store,
            OperatorParams {
                representation: Some(MachineRepresentation::TaggedPointer),
                write_barrier: Some(WriteBarrierKind::Full),
                ..Default::default()
            },
            vec![base, index, value],
        );

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(store).unwrap();
        let insn = &sel.sequence.instructions[0];
        assert_eq!(insn.opcode, ArchOpcode::ArchStoreWithWriteBarrier);
        for input in &insn.inputs {
            match input {
                Operand::Unallocated { policy, .. } => {
                    assert_eq!(*policy, crate::operand::Policy::UniqueRegister)
                }
                other => panic!("expected unique register, got {other:?}"),
            }
        }
    }

    #[test]
    fn signed_byte_load_picks_sign_extending_opcode() {
        let mut graph = MidIrGraph::new();
        let base = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let index = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let load = graph.add_node(
            OperatorKind::Load,
            OperatorParams {
                representation: Some(MachineRepresentation::Word8),
                signed: true,
                ..Default::default()
            },
            vec![base, index],
        );

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(load).unwrap();
        assert_eq!(sel.sequence.instructions.last().unwrap().opcode, ArchOpcode::Lb);
    }

    #[test]
    fn rejected_representation_is_unsupported() {
        let mut graph = MidIrGraph::new();
        let base = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let index = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let load = graph.add_node(
            OperatorKind::Load,
            OperatorParams {
                representation: Some(MachineRepresentation::Word64),
                ..Default::default()
            },
            vec![base, index],
        );

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        let err = sel.visit(load).unwrap_err();
        assert!(matches!(err, SelectionError::UnsupportedRepresentation { .. }));
    }
}
