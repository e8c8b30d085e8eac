//! Integer ALU selection rules (§4.2.1): the shared `VisitBinop` routine,
//! its peephole rewrites, and the fixed-arity div/mod rules.

use crate::error::SelectionResult;
use crate::flags::FlagsContinuation;
use crate::frame::FrameHandle;
use crate::instr::{ArchOpcode, Instruction};
use crate::ir::{Node, OperatorKind};

use super::Selector;

impl<'g, F: FrameHandle> Selector<'g, F> {
    /// The shared binop lowering routine (§4.2.1 steps 1-4).
    fn visit_binop(
        &mut self,
        node: Node,
        opcode: ArchOpcode,
        commutative: bool,
        reverse_opcode: ArchOpcode,
        continuation: Option<FlagsContinuation>,
    ) {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        let ops = self.operands();

        let is_deopt = matches!(continuation, Some(FlagsContinuation::Deoptimize { .. }));
        let output = if is_deopt {
            ops.define_same_as_first(node)
        } else {
            ops.define_as_register(node)
        };

        let right_fits = self
            .graph
            .int_constant(right)
            .is_some_and(|v| ops.fits_immediate(v, opcode));
        let left_fits = commutative
            && self
                .graph
                .int_constant(left)
                .is_some_and(|v| ops.fits_immediate(v, reverse_opcode));

        let instruction = if right_fits {
            let lhs = ops.use_register_or_immediate_zero(left);
            let rhs = ops.use_operand(right, opcode);
            Instruction::new(opcode).with_outputs([output]).with_inputs([lhs, rhs])
        } else if left_fits {
            let lhs = ops.use_register_or_immediate_zero(right);
            let rhs = ops.use_operand(left, reverse_opcode);
            Instruction::new(reverse_opcode).with_outputs([output]).with_inputs([lhs, rhs])
        } else {
            let lhs = ops.use_register(left);
            let rhs = ops.use_register(right);
            Instruction::new(opcode).with_outputs([output]).with_inputs([lhs, rhs])
        };

        let instruction = match continuation {
            Some(c) => instruction.with_continuation(c),
            None => instruction,
        };
        self.emit(instruction);
    }

    pub(super) fn visit_add(&mut self, node: Node) -> SelectionResult<()> {
        self.visit_binop(node, ArchOpcode::Add, true, ArchOpcode::Add, None);
        Ok(())
    }

    pub(super) fn visit_sub(&mut self, node: Node) -> SelectionResult<()> {
        self.visit_binop(node, ArchOpcode::Sub, false, ArchOpcode::Sub, None);
        Ok(())
    }

    pub(super) fn visit_and(&mut self, node: Node) -> SelectionResult<()> {
        self.visit_binop(node, ArchOpcode::And, true, ArchOpcode::And, None);
        Ok(())
    }

    pub(super) fn visit_or(&mut self, node: Node) -> SelectionResult<()> {
        // Xor(Or(a, b), -1) with b non-constant -> Nor(a, b) is recognized
        // by the caller (Xor); a plain Or has no peephole of its own.
        self.visit_binop(node, ArchOpcode::Or, true, ArchOpcode::Or, None);
        Ok(())
    }

    /// `Xor(x, -1)` -> `Nor(x, 0)`; `Xor(Or(a, b), -1)` with `b`
    /// non-constant -> `Nor(a, b)` (§4.2.1 peepholes).
    pub(super) fn visit_xor(&mut self, node: Node) -> SelectionResult<()> {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        if self.graph.int_constant(right) == Some(-1) {
            if self.graph.opcode(left) == OperatorKind::Word32Or && self.can_cover(node, left) {
                let a = self.graph.input(left, 0);
                let b = self.graph.input(left, 1);
                if self.graph.int_constant(b).is_none() {
                    let ops = self.operands();
                    let out = ops.define_as_register(node);
                    let lhs = ops.use_register(a);
                    let rhs = ops.use_register(b);
                    self.emit(Instruction::new(ArchOpcode::Nor).with_outputs([out]).with_inputs([lhs, rhs]));
                    return Ok(());
                }
            }
            let ops = self.operands();
            let out = ops.define_as_register(node);
            let lhs = ops.use_register(left);
            let zero = ops.use_immediate_value(0);
            self.emit(Instruction::new(ArchOpcode::Nor).with_outputs([out]).with_inputs([lhs, zero]));
            return Ok(());
        }
        self.visit_binop(node, ArchOpcode::Xor, true, ArchOpcode::Xor, None);
        Ok(())
    }

    /// Returns `Some((width, shift))` when `mask` is a contiguous bit-run
    /// rooted at bit 0 with width `width`, i.e. `mask == (1 << width) - 1`.
    fn contiguous_low_mask_width(mask: i64) -> Option<u32> {
        if mask <= 0 {
            return None;
        }
        let mask = mask as u64 as u32;
        if mask & (mask.wrapping_add(1)) == 0 {
            Some(32 - mask.leading_zeros())
        } else {
            None
        }
    }

    /// `Shl(And(x, mask), k)` with a low-rooted mask of width `w`,
    /// `1 <= k <= 31`, `k + w >= 32` -> drop the mask, emit `Shl(x, k)`.
    pub(super) fn visit_shl(&mut self, node: Node) -> SelectionResult<()> {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        if let Some(k) = self.graph.int_constant(right) {
            if (1..32).contains(&k)
                && self.graph.opcode(left) == OperatorKind::Word32And
                && self.can_cover(node, left)
            {
                let and_right = self.graph.input(left, 1);
                if let Some(mask) = self.graph.int_constant(and_right) {
                    if let Some(width) = Self::contiguous_low_mask_width(mask) {
                        if k as u32 + width >= 32 {
                            let x = self.graph.input(left, 0);
                            let ops = self.operands();
                            let out = ops.define_as_register(node);
                            let lhs = ops.use_register(x);
                            let imm = ops.use_immediate_value(k);
                            self.emit(
                                Instruction::new(ArchOpcode::Shl32)
                                    .with_outputs([out])
                                    .with_inputs([lhs, imm]),
                            );
                            return Ok(());
                        }
                    }
                }
            }
        }
        self.visit_binop(node, ArchOpcode::Shl32, false, ArchOpcode::Shl32, None);
        Ok(())
    }

    /// `Sar(Shl(x, k), k)` with `k in {16, 24}` -> sign-extend from
    /// halfword/byte; `k == 32` -> canonicalize to `Shl(x, 0)`.
    pub(super) fn visit_sar(&mut self, node: Node) -> SelectionResult<()> {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        if let Some(k) = self.graph.int_constant(right) {
            if self.graph.opcode(left) == OperatorKind::Word32Shl && self.can_cover(node, left) {
                let shl_right = self.graph.input(left, 1);
                if self.graph.int_constant(shl_right) == Some(k) {
                    let x = self.graph.input(left, 0);
                    let ops = self.operands();
                    if k == 16 || k == 24 {
                        let opcode = if k == 24 {
                            ArchOpcode::SignExtendByte
                        } else {
                            ArchOpcode::SignExtendShort
                        };
                        let out = ops.define_as_register(node);
                        let lhs = ops.use_register(x);
                        self.emit(Instruction::new(opcode).with_outputs([out]).with_inputs([lhs]));
                        return Ok(());
                    } else if k == 32 {
                        let out = ops.define_as_register(node);
                        let lhs = ops.use_register(x);
                        let zero = ops.use_immediate_value(0);
                        self.emit(
                            Instruction::new(ArchOpcode::Shl32)
                                .with_outputs([out])
                                .with_inputs([lhs, zero]),
                        );
                        return Ok(());
                    }
                }
            }
        }
        self.visit_binop(node, ArchOpcode::Sar32, false, ArchOpcode::Sar32, None);
        Ok(())
    }

    pub(super) fn visit_shr(&mut self, node: Node) -> SelectionResult<()> {
        self.visit_binop(node, ArchOpcode::Shr32, false, ArchOpcode::Shr32, None);
        Ok(())
    }

    fn is_power_of_two(v: i64) -> Option<u32> {
        if v > 0 && (v as u64).is_power_of_two() {
            Some(v.trailing_zeros())
        } else {
            None
        }
    }

    /// `Mul(x, c)`: power-of-two `c` -> a shift; power-of-two `c + 1` ->
    /// shift into a temp then subtract `x` (§4.2.1).
    pub(super) fn visit_mul(&mut self, node: Node) -> SelectionResult<()> {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        if let Some(c) = self.graph.int_constant(right) {
            if c > 0 {
                if let Some(log2) = Self::is_power_of_two(c) {
                    let ops = self.operands();
                    let out = ops.define_as_register(node);
                    let lhs = ops.use_register(left);
                    let imm = ops.use_immediate_value(log2 as i64);
                    self.emit(
                        Instruction::new(ArchOpcode::Shl32)
                            .with_outputs([out])
                            .with_inputs([lhs, imm]),
                    );
                    return Ok(());
                }
                if let Some(log2) = Self::is_power_of_two(c + 1) {
                    let ops = self.operands();
                    let tmp = ops.temp_register();
                    let lhs = ops.use_register(left);
                    let imm = ops.use_immediate_value(log2 as i64);
                    self.emit(
                        Instruction::new(ArchOpcode::Shl32)
                            .with_outputs([tmp])
                            .with_inputs([lhs, imm]),
                    );
                    let out = ops.define_as_register(node);
                    let lhs2 = ops.use_register(left);
                    self.emit(
                        Instruction::new(ArchOpcode::Sub)
                            .with_outputs([out])
                            .with_inputs([tmp, lhs2]),
                    );
                    return Ok(());
                }
            }
        }
        self.visit_binop(node, ArchOpcode::Mul, true, ArchOpcode::Mul, None);
        Ok(())
    }

    /// `Int32{Add,Sub,Mul}WithOverflow`: an overflow continuation consumed
    /// by the projection-1 user; `None` if only projection-0 is used.
    pub(super) fn visit_binop_with_overflow(&mut self, node: Node, opcode: ArchOpcode) -> SelectionResult<()> {
        let continuation = self.graph.find_projection(node, 1).map(|overflow_proj| FlagsContinuation::Set {
            condition: crate::flags::Condition::Overflow,
            dest: overflow_proj,
        });
        self.visit_binop(node, opcode, matches!(opcode, ArchOpcode::AddOvf | ArchOpcode::MulOvf32), opcode, continuation);
        Ok(())
    }

    /// Division and modulo never fold constants on this target (no
    /// immediate-division form); div/mod alias the dividend with
    /// `DefineSameAsFirst`, other forms use `DefineAsRegister`.
    pub(super) fn visit_div_mod(&mut self, node: Node, opcode: ArchOpcode) -> SelectionResult<()> {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        let ops = self.operands();
        let aliases_dividend = matches!(opcode, ArchOpcode::Div32 | ArchOpcode::DivU32 | ArchOpcode::Mod32 | ArchOpcode::ModU32);
        let out = if aliases_dividend {
            ops.define_same_as_first(node)
        } else {
            ops.define_as_register(node)
        };
        let lhs = ops.use_register(left);
        let rhs = ops.use_register(right);
        self.emit(Instruction::new(opcode).with_outputs([out]).with_inputs([lhs, rhs]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BumpFrame;
    use crate::ir::{MidIrGraph, OperatorParams};
    use crate::selector::Flags;

    fn func_name() -> crate::ir::FunctionName {
        internment::Intern::new("test".to_string())
    }

    #[test]
    fn add_with_small_constant_folds_to_immediate() {
        let mut graph = MidIrGraph::new();
        let param = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let five = graph.add_node(
            OperatorKind::Int32Constant,
            OperatorParams {
                int_constant: Some(5),
                ..Default::default()
            },
            vec![],
        );
        let add = graph.add_node(OperatorKind::Int32Add, OperatorParams::default(), vec![param, five]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(add).unwrap();
        assert_eq!(sel.sequence.len(), 1);
        let insn = &sel.sequence.instructions[0];
        assert_eq!(insn.opcode, ArchOpcode::Add);
        assert!(insn.inputs[1].is_immediate());
        assert_eq!(insn.inputs[1].immediate_value(), Some(5));
    }

    #[test]
    fn add_with_large_constant_uses_register() {
        let mut graph = MidIrGraph::new();
        let param = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let big = graph.add_node(
            OperatorKind::Int32Constant,
            OperatorParams {
                int_constant: Some(4096),
                ..Default::default()
            },
            vec![],
        );
        let add = graph.add_node(OperatorKind::Int32Add, OperatorParams::default(), vec![param, big]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(add).unwrap();
        let insn = &sel.sequence.instructions[0];
        assert_eq!(insn.opcode, ArchOpcode::Add);
        assert!(!insn.inputs[1].is_immediate());
    }

    #[test]
    fn shl_and_mask_folds_away_mask() {
        let mut graph = MidIrGraph::new();
        let param = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let mask = graph.add_node(
            OperatorKind::Int32Constant,
            OperatorParams {
                int_constant: Some(0x0000_FFFF),
                ..Default::default()
            },
            vec![],
        );
        let and = graph.add_node(OperatorKind::Word32And, OperatorParams::default(), vec![param, mask]);
        let sixteen = graph.add_node(
            OperatorKind::Int32Constant,
            OperatorParams {
                int_constant: Some(16),
                ..Default::default()
            },
            vec![],
        );
        let shl = graph.add_node(OperatorKind::Word32Shl, OperatorParams::default(), vec![and, sixteen]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(shl).unwrap();
        assert_eq!(sel.sequence.len(), 1);
        assert_eq!(sel.sequence.instructions[0].opcode, ArchOpcode::Shl32);
    }

    #[test]
    fn mul_by_seven_uses_shift_then_sub() {
        // 7 + 1 = 8 = 2^3, so this hits the `c + 1` power-of-two rewrite:
        // Shl(x, 3) into a temp, then Sub(temp, x) == 8x - x == 7x.
        let mut graph = MidIrGraph::new();
        let param = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let seven = graph.add_node(
            OperatorKind::Int32Constant,
            OperatorParams {
                int_constant: Some(7),
                ..Default::default()
            },
            vec![],
        );
        let mul = graph.add_node(OperatorKind::Int32Mul, OperatorParams::default(), vec![param, seven]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(mul).unwrap();
        assert_eq!(sel.sequence.len(), 2);
        assert_eq!(sel.sequence.instructions[0].opcode, ArchOpcode::Shl32);
        assert_eq!(sel.sequence.instructions[1].opcode, ArchOpcode::Sub);
    }
}
