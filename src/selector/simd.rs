//! SIMD / 128-bit vector unit (§4.2.7): table-driven unary/binary/shift
//! lowering, extended-multiply pairs, shuffle canonicalization, constants,
//! and load-transform/load-lane/store-lane forms.

use crate::error::SelectionResult;
use crate::frame::FrameHandle;
use crate::instr::{ArchOpcode, Instruction};
use crate::ir::{Node, OperatorKind};

use super::Selector;

impl<'g, F: FrameHandle> Selector<'g, F> {
    /// One-to-one table mapping from IR kind to vector opcode, e.g.
    /// `F32x4Add -> RiscvF32x4Add`.
    pub(super) fn visit_simd_table(&mut self, node: Node, opcode: OperatorKind) -> SelectionResult<()> {
        let arch = match opcode {
            OperatorKind::F32x4Add => ArchOpcode::F32x4Add,
            OperatorKind::F32x4Sub => ArchOpcode::F32x4Sub,
            OperatorKind::I32x4Add => ArchOpcode::I32x4Add,
            OperatorKind::I32x4Sub => ArchOpcode::I32x4Sub,
            OperatorKind::I32x4Shl => ArchOpcode::I32x4Shl,
            _ => unreachable!(),
        };
        let ops = self.operands();
        let out = ops.define_as_register(node);
        let inputs: Vec<_> = self.graph.inputs(node).iter().map(|&n| ops.use_register(n)).collect();
        self.emit(Instruction::new(arch).with_outputs([out]).with_inputs(inputs));
        Ok(())
    }

    /// Extended-multiply pairs: `Vwmul`/`Vwmulu`; the *High* variants first
    /// `Vslidedown` each input by `VLEN / element-width / 2` lanes.
    pub(super) fn visit_ext_mul(&mut self, node: Node, opcode: OperatorKind) -> SelectionResult<()> {
        use OperatorKind::*;
        let is_high = matches!(
            opcode,
            I16x8ExtMulHighI8x16S | I16x8ExtMulHighI8x16U | I32x4ExtMulHighI16x8S | I32x4ExtMulHighI16x8U
                | I64x2ExtMulHighI32x4S | I64x2ExtMulHighI32x4U
        );
        let is_unsigned = matches!(
            opcode,
            I16x8ExtMulLowI8x16U | I16x8ExtMulHighI8x16U | I32x4ExtMulLowI16x8U | I32x4ExtMulHighI16x8U
                | I64x2ExtMulLowI32x4U | I64x2ExtMulHighI32x4U
        );
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        let ops = self.operands();

        let (lhs, rhs) = if is_high {
            let tmp_l = ops.temp_simd128_register();
            let tmp_r = ops.temp_simd128_register();
            let left_op = ops.use_register(left);
            self.emit(Instruction::new(ArchOpcode::Vslidedown).with_outputs([tmp_l]).with_inputs([left_op]));
            let right_op = ops.use_register(right);
            self.emit(Instruction::new(ArchOpcode::Vslidedown).with_outputs([tmp_r]).with_inputs([right_op]));
            (tmp_l, tmp_r)
        } else {
            (ops.use_register(left), ops.use_register(right))
        };

        let arch = if is_unsigned { ArchOpcode::Vwmulu } else { ArchOpcode::Vwmul };
        let out = ops.define_as_register(node);
        self.emit(Instruction::new(arch).with_outputs([out]).with_inputs([lhs, rhs]));
        Ok(())
    }

    /// Canonicalizes a 16-byte permutation, returning `(permutation,
    /// is_swizzle)`. The fallback `Vrgather` path is specified as the only
    /// behavior this pass implements (§9 "Shuffle canonicalization"):
    /// faster arch-specific patterns may be layered on later without
    /// breaking this contract.
    fn canonicalize_shuffle(shuffle: [u8; 16]) -> ([u8; 16], bool) {
        let is_swizzle = shuffle.iter().all(|&b| b < 16);
        (shuffle, is_swizzle)
    }

    pub(super) fn visit_shuffle(&mut self, node: Node) -> SelectionResult<()> {
        let shuffle = self.graph.params(node).shuffle.unwrap_or([0; 16]);
        let (permutation, _is_swizzle) = Self::canonicalize_shuffle(shuffle);
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        let ops = self.operands();
        let out = ops.define_as_register(node);
        let lhs = ops.use_register(left);
        let rhs = ops.use_register(right);
        // Four 32-bit immediates packing 4 lanes each.
        let imms: Vec<_> = permutation
            .chunks(4)
            .map(|chunk| {
                let packed = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                ops.use_immediate_value(packed as i64)
            })
            .collect();
        let mut inputs = vec![lhs, rhs];
        inputs.extend(imms);
        self.emit(Instruction::new(ArchOpcode::Vrgather).with_outputs([out]).with_inputs(inputs));
        Ok(())
    }

    pub(super) fn visit_swizzle(&mut self, node: Node) -> SelectionResult<()> {
        let table = self.graph.input(node, 0);
        let indices = self.graph.input(node, 1);
        let ops = self.operands();
        let out = ops.define_as_register(node);
        let lhs = ops.use_register(table);
        let rhs = ops.use_register(indices);
        self.emit(Instruction::new(ArchOpcode::Vrgather).with_outputs([out]).with_inputs([lhs, rhs]));
        Ok(())
    }

    pub(super) fn visit_simd_constant(&mut self, node: Node, opcode: OperatorKind) -> SelectionResult<()> {
        let ops = self.operands();
        let out = ops.define_as_register(node);
        match opcode {
            OperatorKind::S128Zero => {
                self.emit(Instruction::new(ArchOpcode::S128Zero).with_outputs([out]));
            }
            OperatorKind::S128AllOnes => {
                self.emit(Instruction::new(ArchOpcode::S128AllOnes).with_outputs([out]));
            }
            OperatorKind::S128Const => {
                let shuffle = self.graph.params(node).shuffle.unwrap_or([0; 16]);
                let imms: Vec<_> = shuffle
                    .chunks(4)
                    .map(|chunk| {
                        let packed = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                        ops.use_immediate_value(packed as i64)
                    })
                    .collect();
                self.emit(Instruction::new(ArchOpcode::S128Const).with_outputs([out]).with_inputs(imms));
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    pub(super) fn visit_simd_load_store_lane(&mut self, node: Node, opcode: OperatorKind) -> SelectionResult<()> {
        use OperatorKind::*;
        let base = self.graph.input(node, 0);
        let index = self.graph.input(node, 1);
        let (arch, is_store) = match opcode {
            S128LoadSplat => (ArchOpcode::S128LoadSplat, false),
            S128Load32Zero => (ArchOpcode::S128Load32Zero, false),
            S128Load64Zero => (ArchOpcode::S128Load64Zero, false),
            S128Load64ExtendS => (ArchOpcode::S128Load64ExtendS, false),
            S128Load64ExtendU => (ArchOpcode::S128Load64ExtendU, false),
            S128LoadLane => (ArchOpcode::S128LoadLane, false),
            S128StoreLane => (ArchOpcode::S128StoreLane, true),
            _ => unreachable!(),
        };
        let lane_width = self.graph.params(node).lane_width;
        let lmul = self.graph.params(node).lmul;
        let misc = encode_lane_lmul(lane_width, lmul);
        let addressed = self.synthesize_address(base, index, arch);
        let ops = self.operands();
        if is_store {
            let value = self.graph.input(node, 2);
            let value_op = ops.use_register(value);
            self.emit(
                Instruction::new(arch)
                    .with_addressing_mode(addressed.mode)
                    .with_misc(misc)
                    .with_inputs([addressed.base, addressed.index, value_op]),
            );
        } else {
            let out = ops.define_as_register(node);
            self.emit(
                Instruction::new(arch)
                    .with_addressing_mode(addressed.mode)
                    .with_misc(misc)
                    .with_outputs([out])
                    .with_inputs([addressed.base, addressed.index]),
            );
        }
        Ok(())
    }
}

fn encode_lane_lmul(lane_width: Option<crate::ir::LaneWidth>, lmul: Option<crate::ir::Lmul>) -> u32 {
    use crate::ir::{LaneWidth, Lmul};
    let w = match lane_width {
        Some(LaneWidth::E8) => 0,
        Some(LaneWidth::E16) => 1,
        Some(LaneWidth::E32) => 2,
        Some(LaneWidth::E64) => 3,
        None => 2,
    };
    let m = match lmul {
        Some(Lmul::Mf2) => 0,
        Some(Lmul::M1) => 1,
        Some(Lmul::M2) => 2,
        None => 1,
    };
    (m << 4) | w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BumpFrame;
    use crate::ir::{MidIrGraph, OperatorParams};
    use crate::selector::{Flags, Selector};

    #[test]
    fn shuffle_emits_generic_vrgather_with_four_immediates() {
        let mut graph = MidIrGraph::new();
        let left = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let right = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let mut shuffle = [0u8; 16];
        for (i, b) in shuffle.iter_mut().enumerate() {
            *b = i as u8;
        }
        let node = graph.add_node(
            OperatorKind::I8x16Shuffle,
            OperatorParams {
                shuffle: Some(shuffle),
                ..Default::default()
            },
            vec![left, right],
        );
        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        sel.visit(node).unwrap();
        let insn = &sel.sequence.instructions[0];
        assert_eq!(insn.opcode, ArchOpcode::Vrgather);
        assert_eq!(insn.inputs.len(), 6); // 2 operands + 4 packed immediates
    }

    #[test]
    fn all_zero_constant_emits_s128_zero() {
        let mut graph = MidIrGraph::new();
        let node = graph.add_node(OperatorKind::S128Zero, OperatorParams::default(), vec![]);
        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        sel.visit(node).unwrap();
        assert_eq!(sel.sequence.instructions[0].opcode, ArchOpcode::S128Zero);
    }
}
