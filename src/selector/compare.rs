//! Compare & branch fusion (C6, §4.2.3): `VisitWordCompareZero`, the
//! negation loop, the fusion switch, and operand normalization.

use crate::error::SelectionResult;
use crate::flags::{Condition, FlagsContinuation};
use crate::frame::FrameHandle;
use crate::instr::{ArchOpcode, Instruction};
use crate::ir::{Node, OperatorKind};

use super::Selector;

impl<'g, F: FrameHandle> Selector<'g, F> {
    /// Builds the flags continuation implied by a `Branch`/`DeoptimizeIf`/
    /// `TrapIf` node and fuses its condition input into one instruction.
    pub(super) fn visit_branch_like(&mut self, node: Node, opcode: OperatorKind) -> SelectionResult<()> {
        let condition_node = self.graph.input(node, 0);
        let mut cont = match opcode {
            OperatorKind::Branch => FlagsContinuation::Branch {
                condition: Condition::NotEqual,
                true_block: self.graph.input(node, 1),
                false_block: self.graph.input(node, 2),
            },
            OperatorKind::DeoptimizeIf => FlagsContinuation::Deoptimize {
                condition: Condition::NotEqual,
                reason: "deopt",
                feedback: node,
            },
            OperatorKind::TrapIf => FlagsContinuation::Trap {
                condition: Condition::NotEqual,
                trap_id: self.graph.params(node).trap_id.unwrap_or(0),
            },
            _ => unreachable!("visit_branch_like called with non-branch-like opcode"),
        };
        self.visit_word_compare_zero(node, condition_node, &mut cont)
    }

    /// Entry point for C6: folds any number of `!!!x`-style negations into
    /// a single branch polarity, then dispatches the fusion switch.
    pub(super) fn visit_word_compare_zero(
        &mut self,
        mut user: Node,
        mut value: Node,
        cont: &mut FlagsContinuation,
    ) -> SelectionResult<()> {
        // Negation loop (§4.2.3 "Negation loop"): Equal(x, 0) chains cancel.
        while self.can_cover(user, value) && self.graph.opcode(value) == OperatorKind::Word32Equal {
            let rhs = self.graph.input(value, 1);
            if self.graph.int_constant(rhs) != Some(0) {
                break;
            }
            let inner = self.graph.input(value, 0);
            user = value;
            value = inner;
            cont.negate();
        }

        if self.can_cover(user, value) {
            match self.graph.opcode(value) {
                OperatorKind::Int32LessThan => {
                    return self.visit_word_compare(value, Condition::SignedLessThan, cont);
                }
                OperatorKind::Int32LessThanOrEqual => {
                    return self.visit_word_compare(value, Condition::SignedLessThanOrEqual, cont);
                }
                OperatorKind::Uint32LessThan => {
                    return self.visit_word_compare(value, Condition::UnsignedLessThan, cont);
                }
                OperatorKind::Uint32LessThanOrEqual => {
                    return self.visit_word_compare(value, Condition::UnsignedLessThanOrEqual, cont);
                }
                OperatorKind::Word32Equal => {
                    return self.visit_word_compare(value, Condition::Equal, cont);
                }
                OperatorKind::Float32Equal | OperatorKind::Float64Equal => {
                    return self.visit_float_compare(value, Condition::Equal, cont);
                }
                OperatorKind::Float32LessThan | OperatorKind::Float64LessThan => {
                    // Ordered float less-than is encoded with the unsigned
                    // condition per the RISC-V flag convention (§9).
                    return self.visit_float_compare(value, Condition::UnsignedLessThan, cont);
                }
                OperatorKind::Float32LessThanOrEqual | OperatorKind::Float64LessThanOrEqual => {
                    return self.visit_float_compare(value, Condition::UnsignedLessThanOrEqual, cont);
                }
                OperatorKind::Projection => {
                    if let Some(overflow_op) = self.overflow_parent_if_eligible(value) {
                        let opcode = match self.graph.opcode(overflow_op) {
                            OperatorKind::Int32AddWithOverflow => ArchOpcode::AddOvf,
                            OperatorKind::Int32SubWithOverflow => ArchOpcode::SubOvf,
                            OperatorKind::Int32MulWithOverflow => ArchOpcode::MulOvf32,
                            _ => unreachable!(),
                        };
                        *cont = match cont {
                            FlagsContinuation::Set { dest, .. } => FlagsContinuation::Set {
                                condition: Condition::Overflow,
                                dest: *dest,
                            },
                            FlagsContinuation::Branch { true_block, false_block, .. } => FlagsContinuation::Branch {
                                condition: Condition::Overflow,
                                true_block: *true_block,
                                false_block: *false_block,
                            },
                            FlagsContinuation::Deoptimize { reason, feedback, .. } => FlagsContinuation::Deoptimize {
                                condition: Condition::Overflow,
                                reason,
                                feedback: *feedback,
                            },
                            FlagsContinuation::Trap { trap_id, .. } => FlagsContinuation::Trap {
                                condition: Condition::Overflow,
                                trap_id: *trap_id,
                            },
                            FlagsContinuation::None => FlagsContinuation::None,
                        };
                        return self.visit_binop_with_overflow_continuation(overflow_op, opcode, cont);
                    }
                }
                OperatorKind::Word32And => {
                    return self.visit_tst(value, cont);
                }
                OperatorKind::StackPointerGreaterThan => {
                    self.emit_flagged(
                        Instruction::new(ArchOpcode::StackPointerGreaterThan),
                        cont,
                    );
                    return Ok(());
                }
                _ => {}
            }
        }

        self.visit_cmp_zero(value, cont)
    }

    /// `Projection(op-with-overflow, 1)` is eligible to recurse into its
    /// parent when projection-0 is either absent or already defined.
    fn overflow_parent_if_eligible(&self, projection: Node) -> Option<Node> {
        let parent = self.graph.input(projection, 0);
        let is_overflow_op = matches!(
            self.graph.opcode(parent),
            OperatorKind::Int32AddWithOverflow | OperatorKind::Int32SubWithOverflow | OperatorKind::Int32MulWithOverflow
        );
        if !is_overflow_op {
            return None;
        }
        // `projection` here must itself be the overflow (index-1) output:
        // the caller matched on `OperatorKind::Projection` generically, so
        // confirm this is not projection-0 of the same parent.
        let proj0 = self.graph.find_projection(parent, 0);
        if proj0 == Some(projection) {
            return None;
        }
        let proj0_defined = proj0.map(|p| self.defined.is_defined(p)).unwrap_or(true);
        if proj0_defined {
            Some(parent)
        } else {
            None
        }
    }

    fn visit_binop_with_overflow_continuation(
        &mut self,
        node: Node,
        opcode: ArchOpcode,
        cont: &FlagsContinuation,
    ) -> SelectionResult<()> {
        self.emit_binop_with_continuation(node, opcode, cont.clone());
        Ok(())
    }

    /// Integer compare normalization (§4.2.3 "Operand normalization"): if
    /// the right side is not an immediate but the left side is, swap and
    /// commute the continuation.
    fn visit_word_compare(&mut self, node: Node, condition: Condition, cont: &mut FlagsContinuation) -> SelectionResult<()> {
        let mut left = self.graph.input(node, 0);
        let mut right = self.graph.input(node, 1);
        let opcode = ArchOpcode::Cmp;
        let ops = self.operands();
        let right_is_imm = self.graph.int_constant(right).is_some_and(|v| ops.fits_immediate(v, opcode));
        let left_is_imm = self.graph.int_constant(left).is_some_and(|v| ops.fits_immediate(v, opcode));
        if !right_is_imm && left_is_imm {
            std::mem::swap(&mut left, &mut right);
            cont.commute();
        }
        // For equality at Set (boolean materialization) the right side
        // must be in a register; for branches an immediate is fine.
        let force_register_right = matches!(cont, FlagsContinuation::Set { .. }) && condition == Condition::Equal;
        let ops = self.operands();
        let lhs = ops.use_register(left);
        let rhs = if force_register_right {
            ops.use_register(right)
        } else {
            ops.use_operand(right, opcode)
        };
        let mut final_cont = cont.clone();
        final_cont.overwrite_and_negate_if_equal(condition);
        *cont = final_cont.clone();
        self.emit_flagged(
            Instruction::new(opcode).with_inputs([lhs, rhs]),
            &final_cont,
        );
        Ok(())
    }

    fn visit_float_compare(&mut self, node: Node, condition: Condition, cont: &mut FlagsContinuation) -> SelectionResult<()> {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        let ops = self.operands();
        let lhs = ops.use_register(left);
        let rhs = ops.use_register(right);
        let mut final_cont = cont.clone();
        final_cont.overwrite_and_negate_if_equal(condition);
        *cont = final_cont.clone();
        self.emit_flagged(
            Instruction::new(ArchOpcode::CmpS).with_inputs([lhs, rhs]),
            &final_cont,
        );
        Ok(())
    }

    /// For the `Tst` opcode, the immediate is always kept on the right.
    fn visit_tst(&mut self, node: Node, cont: &mut FlagsContinuation) -> SelectionResult<()> {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        let ops = self.operands();
        let lhs = ops.use_register(left);
        let rhs = ops.use_operand(right, ArchOpcode::Tst);
        let (lhs, rhs) = if rhs.is_immediate() {
            (lhs, rhs)
        } else {
            let ops = self.operands();
            (lhs, ops.use_register(right))
        };
        self.emit_flagged(Instruction::new(ArchOpcode::Tst).with_inputs([lhs, rhs]), cont);
        Ok(())
    }

    fn visit_cmp_zero(&mut self, node: Node, cont: &mut FlagsContinuation) -> SelectionResult<()> {
        let ops = self.operands();
        let value = ops.use_register(node);
        self.emit_flagged(Instruction::new(ArchOpcode::CmpZero).with_inputs([value]), cont);
        Ok(())
    }

    /// Attaches the continuation to `instruction` and, for `Set`, defines
    /// the destination register; otherwise just emits the flagged compare.
    fn emit_flagged(&mut self, instruction: Instruction, cont: &FlagsContinuation) {
        let mut instruction = instruction.with_continuation(cont.clone());
        if let FlagsContinuation::Set { dest, .. } = cont {
            let ops = self.operands();
            instruction = instruction.with_outputs([ops.define_as_register(*dest)]);
        }
        self.emit(instruction);
    }

    fn emit_binop_with_continuation(&mut self, node: Node, opcode: ArchOpcode, cont: FlagsContinuation) {
        let left = self.graph.input(node, 0);
        let right = self.graph.input(node, 1);
        let ops = self.operands();
        let out = ops.define_as_register(node);
        let lhs = ops.use_register(left);
        let rhs = ops.use_operand(right, opcode);
        self.emit(
            Instruction::new(opcode)
                .with_outputs([out])
                .with_inputs([lhs, rhs])
                .with_continuation(cont),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BumpFrame;
    use crate::ir::{MidIrGraph, OperatorParams};
    use crate::selector::{Flags, Selector};

    fn func_name() -> crate::ir::FunctionName {
        internment::Intern::new("test".to_string())
    }

    #[test]
    fn double_negation_cancels_to_single_cmp_zero() {
        let mut graph = MidIrGraph::new();
        let x = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let zero = graph.add_node(
            OperatorKind::Int32Constant,
            OperatorParams {
                int_constant: Some(0),
                ..Default::default()
            },
            vec![],
        );
        let eq1 = graph.add_node(OperatorKind::Word32Equal, OperatorParams::default(), vec![x, zero]);
        let eq2 = graph.add_node(OperatorKind::Word32Equal, OperatorParams::default(), vec![eq1, zero]);
        let true_block = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let false_block = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let branch = graph.add_node(OperatorKind::Branch, OperatorParams::default(), vec![eq2, true_block, false_block]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(branch).unwrap();
        assert_eq!(sel.sequence.len(), 1);
        assert_eq!(sel.sequence.instructions[0].opcode, ArchOpcode::CmpZero);
    }

    #[test]
    fn branch_on_equality_fusion_keeps_equal_polarity() {
        // Branch(Word32Equal(a, b)) with non-foldable a, b must branch-true
        // when a == b: the continuation starts at NotEqual (branch's default
        // polarity) and the Word32Equal fusion should flip it to Equal
        // exactly once, not cancel back to NotEqual.
        let mut graph = MidIrGraph::new();
        let a = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let b = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let eq = graph.add_node(OperatorKind::Word32Equal, OperatorParams::default(), vec![a, b]);
        let true_block = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let false_block = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let branch = graph.add_node(OperatorKind::Branch, OperatorParams::default(), vec![eq, true_block, false_block]);

        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), func_name());
        sel.visit(branch).unwrap();
        let insn = sel.sequence.instructions.last().unwrap();
        assert_eq!(insn.continuation.as_ref().and_then(|c| c.condition()), Some(Condition::Equal));
    }
}
