//! The instruction selector (C5 dispatcher) and its per-pass mutable state.
//!
//! Mirrors the teacher's split between a `Program`/codegen driver and a
//! `Instruction` sink (`src/back/asm.rs`, `src/back/codegen.rs`): this
//! module owns the walk and delegates each operator kind to a focused rule
//! module, the same way the teacher keeps register/instruction modeling in
//! `asm.rs` separate from the (never-finished) `codegen.rs` driver.

mod alu;
mod atomics;
mod call;
mod capability;
mod compare;
mod memory;
mod pair64;
mod simd;
mod switch;
mod unsupported;

pub use capability::Capabilities;

use crate::error::{SelectionError, SelectionResult};
use crate::flags::FlagsContinuation;
use crate::frame::FrameHandle;
use crate::instr::{Instruction, InstructionSequence};
use crate::ir::{DefinedSet, FunctionName, MidIrGraph, Node, OperatorKind};
use crate::operand::OperandGenerator;

/// Environment / capability knobs (SPEC_FULL.md §4.10).
#[derive(Copy, Clone, Debug)]
pub struct Flags {
    pub disable_write_barriers: bool,
    pub enable_switch_jump_table: bool,
    pub has_no_unaligned: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            disable_write_barriers: false,
            enable_switch_jump_table: true,
            has_no_unaligned: false,
        }
    }
}

/// Per-pass mutable state (§3 "Per-pass mutable state").
pub struct Selector<'g, F: FrameHandle> {
    pub graph: &'g MidIrGraph,
    pub defined: DefinedSet,
    pub frame: F,
    pub sequence: InstructionSequence,
    pub flags: Flags,
    pub function: FunctionName,
}

impl<'g, F: FrameHandle> Selector<'g, F> {
    pub fn new(graph: &'g MidIrGraph, frame: F, flags: Flags, function: FunctionName) -> Self {
        Selector {
            graph,
            defined: DefinedSet::new(),
            frame,
            sequence: InstructionSequence::default(),
            flags,
            function,
        }
    }

    pub fn operands(&self) -> OperandGenerator<'g> {
        OperandGenerator::new(self.graph)
    }

    pub fn can_cover(&self, user: Node, value: Node) -> bool {
        self.graph.can_cover(user, value)
    }

    pub fn emit(&mut self, instruction: Instruction) {
        self.sequence.push(instruction);
    }

    fn fatal_unimplemented(&self, operator: &'static str) -> SelectionError {
        SelectionError::Unimplemented {
            function: self.function,
            operator,
            line: line!(),
        }
    }

    /// Visits one IR node in scheduling order, emitting zero or more
    /// instructions. This is the large closed-form switch §9 calls for: a
    /// tagged-union match with an explicit fatal arm, never dynamic
    /// dispatch per node.
    #[tracing::instrument(name = "select_node", skip(self), fields(function = %self.function))]
    pub fn visit(&mut self, node: Node) -> SelectionResult<()> {
        if self.defined.is_defined(node) {
            return Ok(());
        }
        let opcode = self.graph.opcode(node);
        tracing::trace!(?opcode, "selecting node");
        match opcode {
            OperatorKind::Parameter | OperatorKind::Int32Constant | OperatorKind::Float32Constant
            | OperatorKind::Float64Constant | OperatorKind::Projection => {
                // Pure data nodes: materialized lazily by whichever user
                // folds or uses them; nothing to emit up front.
            }

            OperatorKind::Int32Add => self.visit_add(node)?,
            OperatorKind::Int32Sub => self.visit_sub(node)?,
            OperatorKind::Int32Mul => self.visit_mul(node)?,
            OperatorKind::Word32And => self.visit_and(node)?,
            OperatorKind::Word32Or => self.visit_or(node)?,
            OperatorKind::Word32Xor => self.visit_xor(node)?,
            OperatorKind::Word32Shl => self.visit_shl(node)?,
            OperatorKind::Word32Sar => self.visit_sar(node)?,
            OperatorKind::Word32Shr => self.visit_shr(node)?,
            OperatorKind::Int32Div => self.visit_div_mod(node, crate::instr::ArchOpcode::Div32)?,
            OperatorKind::Uint32Div => self.visit_div_mod(node, crate::instr::ArchOpcode::DivU32)?,
            OperatorKind::Int32Mod => self.visit_div_mod(node, crate::instr::ArchOpcode::Mod32)?,
            OperatorKind::Uint32Mod => self.visit_div_mod(node, crate::instr::ArchOpcode::ModU32)?,

            OperatorKind::Int32AddWithOverflow => {
                self.visit_binop_with_overflow(node, crate::instr::ArchOpcode::AddOvf)?
            }
            OperatorKind::Int32SubWithOverflow => {
                self.visit_binop_with_overflow(node, crate::instr::ArchOpcode::SubOvf)?
            }
            OperatorKind::Int32MulWithOverflow => {
                self.visit_binop_with_overflow(node, crate::instr::ArchOpcode::MulOvf32)?
            }

            OperatorKind::Load | OperatorKind::UnalignedLoad => {
                self.visit_load(node, opcode == OperatorKind::UnalignedLoad)?
            }
            OperatorKind::Store | OperatorKind::UnalignedStore => {
                self.visit_store(node, opcode == OperatorKind::UnalignedStore)?
            }

            OperatorKind::Branch | OperatorKind::DeoptimizeIf | OperatorKind::TrapIf => {
                self.visit_branch_like(node, opcode)?
            }

            OperatorKind::Switch => self.visit_switch(node)?,

            OperatorKind::Word32AtomicLoad
            | OperatorKind::Word32AtomicStore
            | OperatorKind::Word32AtomicExchange
            | OperatorKind::Word32AtomicCompareExchange
            | OperatorKind::Word32AtomicAdd
            | OperatorKind::Word32AtomicSub
            | OperatorKind::Word32AtomicAnd
            | OperatorKind::Word32AtomicOr
            | OperatorKind::Word32AtomicXor => self.visit_word32_atomic(node, opcode)?,

            OperatorKind::Word32AtomicPairLoad => self.visit_pair_load(node)?,
            OperatorKind::Word32AtomicPairStore => self.visit_pair_store(node)?,
            OperatorKind::Word32AtomicPairAdd
            | OperatorKind::Word32AtomicPairSub
            | OperatorKind::Word32AtomicPairAnd
            | OperatorKind::Word32AtomicPairOr
            | OperatorKind::Word32AtomicPairXor
            | OperatorKind::Word32AtomicPairExchange
            | OperatorKind::Word32AtomicPairCompareExchange => {
                return Err(self.fatal_unimplemented("pair atomic binop"));
            }

            OperatorKind::Int32PairAdd => self.visit_pair_arith(node, crate::instr::ArchOpcode::AddPair, crate::instr::ArchOpcode::Add)?,
            OperatorKind::Int32PairSub => self.visit_pair_arith(node, crate::instr::ArchOpcode::SubPair, crate::instr::ArchOpcode::Sub)?,
            OperatorKind::Int32PairMul => self.visit_pair_arith(node, crate::instr::ArchOpcode::MulPair, crate::instr::ArchOpcode::Mul)?,
            OperatorKind::Word32PairShl => self.visit_pair_arith(node, crate::instr::ArchOpcode::ShlPair, crate::instr::ArchOpcode::Shl32)?,
            OperatorKind::Word32PairShr => self.visit_pair_arith(node, crate::instr::ArchOpcode::ShrPair, crate::instr::ArchOpcode::Shr32)?,
            OperatorKind::Word32PairSar => self.visit_pair_arith(node, crate::instr::ArchOpcode::SarPair, crate::instr::ArchOpcode::Sar32)?,

            OperatorKind::F32x4Add
            | OperatorKind::F32x4Sub
            | OperatorKind::I32x4Add
            | OperatorKind::I32x4Sub
            | OperatorKind::I32x4Shl => self.visit_simd_table(node, opcode)?,
            OperatorKind::I16x8ExtMulLowI8x16S
            | OperatorKind::I16x8ExtMulHighI8x16S
            | OperatorKind::I16x8ExtMulLowI8x16U
            | OperatorKind::I16x8ExtMulHighI8x16U
            | OperatorKind::I32x4ExtMulLowI16x8S
            | OperatorKind::I32x4ExtMulHighI16x8S
            | OperatorKind::I32x4ExtMulLowI16x8U
            | OperatorKind::I32x4ExtMulHighI16x8U
            | OperatorKind::I64x2ExtMulLowI32x4S
            | OperatorKind::I64x2ExtMulHighI32x4S
            | OperatorKind::I64x2ExtMulLowI32x4U
            | OperatorKind::I64x2ExtMulHighI32x4U => self.visit_ext_mul(node, opcode)?,
            OperatorKind::I8x16Shuffle => self.visit_shuffle(node)?,
            OperatorKind::I8x16Swizzle => self.visit_swizzle(node)?,
            OperatorKind::S128Const | OperatorKind::S128Zero | OperatorKind::S128AllOnes => {
                self.visit_simd_constant(node, opcode)?
            }
            OperatorKind::S128LoadSplat
            | OperatorKind::S128Load32Zero
            | OperatorKind::S128Load64Zero
            | OperatorKind::S128Load64ExtendS
            | OperatorKind::S128Load64ExtendU
            | OperatorKind::S128LoadLane
            | OperatorKind::S128StoreLane => self.visit_simd_load_store_lane(node, opcode)?,

            OperatorKind::Call => self.visit_call(node, false)?,
            OperatorKind::CallC => self.visit_call(node, true)?,
            OperatorKind::Return => self.visit_return(node)?,

            OperatorKind::Word32Equal => {
                // A compare not already fused by a branch/set user; the
                // C6 entry point handles this in context (visit_branch_like
                // and visit_set both recurse into it). A bare, unconsumed
                // Word32Equal still needs a materialized boolean.
                let mut cont = FlagsContinuation::Set { condition: crate::flags::Condition::Equal, dest: node };
                self.visit_word_compare_zero(node, node, &mut cont)?;
            }
            OperatorKind::Int32LessThan
            | OperatorKind::Int32LessThanOrEqual
            | OperatorKind::Uint32LessThan
            | OperatorKind::Uint32LessThanOrEqual
            | OperatorKind::Float32Equal
            | OperatorKind::Float32LessThan
            | OperatorKind::Float32LessThanOrEqual
            | OperatorKind::Float64Equal
            | OperatorKind::Float64LessThan
            | OperatorKind::Float64LessThanOrEqual
            | OperatorKind::StackPointerGreaterThan => {
                let mut cont = FlagsContinuation::Set { condition: crate::flags::Condition::Equal, dest: node };
                self.visit_word_compare_zero(node, node, &mut cont)?;
            }

            OperatorKind::ProtectedLoad
            | OperatorKind::ProtectedStore
            | OperatorKind::Float64RoundDown
            | OperatorKind::Float64RoundUp
            | OperatorKind::Float64RoundTruncate
            | OperatorKind::Float64RoundTiesEven
            | OperatorKind::Float64RoundTiesAway
            | OperatorKind::Word32Rol
            | OperatorKind::Word32ReverseBits
            | OperatorKind::Word64ReverseBytes
            | OperatorKind::Simd128ReverseBytes
            | OperatorKind::Int32AbsWithOverflow
            | OperatorKind::Int64AbsWithOverflow => {
                return self.visit_unsupported(opcode);
            }

            OperatorKind::Other(name) => return Err(self.fatal_unimplemented(name)),
        }
        self.defined.mark_defined(node);
        Ok(())
    }
}
