//! Operand generator (C1): wraps register/immediate/temp/fixed allocation
//! and knows the per-opcode immediate-range predicates.

use derive_more::Display;

use crate::instr::ArchOpcode;
use crate::ir::{MidIrGraph, Node};

/// Physical RISC-V register names. Shared by the integer, floating-point,
/// and vector files; which file a given variant belongs to is fixed by its
/// name, the same layout the teacher's backend uses for its RV64 register
/// enum (`src/back/asm.rs::Register`), extended here with the FP/vector
/// files this target also needs.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[allow(missing_docs)]
pub enum Register {
    #[display("zero")]
    Zero,
    #[display("ra")]
    Ra,
    #[display("sp")]
    Sp,
    #[display("gp")]
    Gp,
    #[display("tp")]
    Tp,
    #[display("t0")]
    T0,
    #[display("t1")]
    T1,
    #[display("t2")]
    T2,
    #[display("fp")]
    Fp,
    #[display("s1")]
    S1,
    #[display("a0")]
    A0,
    #[display("a1")]
    A1,
    #[display("a2")]
    A2,
    #[display("a3")]
    A3,
    #[display("a4")]
    A4,
    #[display("a5")]
    A5,
    #[display("a6")]
    A6,
    #[display("a7")]
    A7,
    #[display("s2")]
    S2,
    #[display("s3")]
    S3,
    #[display("t3")]
    T3,
    #[display("t4")]
    T4,
    #[display("t5")]
    T5,
    #[display("t6")]
    T6,
    #[display("fa0")]
    Fa0,
    #[display("fa1")]
    Fa1,
    #[display("ft0")]
    Ft0,
    #[display("v0")]
    V0,
    #[display("v1")]
    V1,
}

impl Register {
    pub const ROOT: Register = Register::S2;
}

/// Allocation policy for an as-yet-unallocated operand. The register
/// allocator downstream resolves these to physical registers; this pass
/// only records the policy.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Policy {
    AnyRegister,
    SameAsFirstInput,
    FixedRegister(Register),
    UniqueRegister,
    RegisterOrImmediateZero,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TempKind {
    Scratch,
    FpScratch,
    Simd128Scratch,
    Fixed(Register),
}

/// An operand attached to an instruction: unallocated virtual register
/// (with a policy), an immediate (indexing the constant pool), or a
/// scratch/fixed temp.
#[derive(Copy, Clone, Debug)]
pub enum Operand {
    Unallocated { policy: Policy, virtual_id: Node },
    Immediate(i64),
    Temp(TempKind),
}

impl Operand {
    pub fn is_immediate(&self) -> bool {
        matches!(self, Operand::Immediate(_))
    }

    pub fn immediate_value(&self) -> Option<i64> {
        match self {
            Operand::Immediate(v) => Some(*v),
            _ => None,
        }
    }
}

/// Immediate-field width, keyed by opcode class (§4.1 table).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ImmediateClass {
    /// 32-bit shifts: unsigned 5-bit.
    Shift5,
    /// Integer ALU ops: signed 12-bit.
    Alu12,
    /// Byte/halfword/word load and store: signed 32-bit.
    LoadStore32,
}

impl ImmediateClass {
    pub fn for_opcode(opcode: ArchOpcode) -> ImmediateClass {
        use ArchOpcode::*;
        match opcode {
            Shl32 | Sar32 | Shr32 => ImmediateClass::Shift5,
            Lb | Lbu | Lh | Lhu | Lw | Sb | Sh | Sw | LoadFloat | StoreFloat | LoadDouble
            | StoreDouble | Ulh | Ulhu | Ulw | Ush | Usw | ULoadFloat | UStoreFloat
            | ULoadDouble | UStoreDouble => ImmediateClass::LoadStore32,
            _ => ImmediateClass::Alu12,
        }
    }

    pub fn fits(self, value: i64) -> bool {
        match self {
            ImmediateClass::Shift5 => (0..32).contains(&value),
            ImmediateClass::Alu12 => (-2048..2048).contains(&value),
            ImmediateClass::LoadStore32 => i32::try_from(value).is_ok(),
        }
    }
}

/// Wraps register/immediate/temp/fixed allocation for a selection rule. One
/// instance is threaded through a single node's lowering.
pub struct OperandGenerator<'g> {
    pub graph: &'g MidIrGraph,
}

impl<'g> OperandGenerator<'g> {
    pub fn new(graph: &'g MidIrGraph) -> Self {
        OperandGenerator { graph }
    }

    pub fn use_register(&self, node: Node) -> Operand {
        Operand::Unallocated {
            policy: Policy::AnyRegister,
            virtual_id: node,
        }
    }

    pub fn use_unique_register(&self, node: Node) -> Operand {
        Operand::Unallocated {
            policy: Policy::UniqueRegister,
            virtual_id: node,
        }
    }

    pub fn use_fixed(&self, node: Node, reg: Register) -> Operand {
        Operand::Unallocated {
            policy: Policy::FixedRegister(reg),
            virtual_id: node,
        }
    }

    /// Materializes the architectural zero register when `node` is the
    /// integer constant 0 or the floating-point bit pattern zero; falls
    /// back to a plain register use otherwise.
    pub fn use_register_or_immediate_zero(&self, node: Node) -> Operand {
        let is_zero_int = self.graph.int_constant(node) == Some(0);
        let is_zero_float = self.graph.params(node).float_bits == Some(0);
        if is_zero_int || is_zero_float {
            Operand::Unallocated {
                policy: Policy::RegisterOrImmediateZero,
                virtual_id: node,
            }
        } else {
            self.use_register(node)
        }
    }

    pub fn use_immediate_value(&self, value: i64) -> Operand {
        Operand::Immediate(value)
    }

    /// Returns an immediate if `node` is an integer constant that fits
    /// `opcode`'s immediate field, otherwise a register use.
    pub fn use_operand(&self, node: Node, opcode: ArchOpcode) -> Operand {
        if let Some(value) = self.graph.int_constant(node) {
            if ImmediateClass::for_opcode(opcode).fits(value) {
                return Operand::Immediate(value);
            }
        }
        self.use_register(node)
    }

    pub fn fits_immediate(&self, value: i64, opcode: ArchOpcode) -> bool {
        ImmediateClass::for_opcode(opcode).fits(value)
    }

    pub fn define_as_register(&self, node: Node) -> Operand {
        self.use_register(node)
    }

    pub fn define_same_as_first(&self, node: Node) -> Operand {
        Operand::Unallocated {
            policy: Policy::SameAsFirstInput,
            virtual_id: node,
        }
    }

    pub fn define_as_fixed(&self, node: Node, reg: Register) -> Operand {
        self.use_fixed(node, reg)
    }

    pub fn define_as_unique_register(&self, node: Node) -> Operand {
        self.use_unique_register(node)
    }

    pub fn temp_register(&self) -> Operand {
        Operand::Temp(TempKind::Scratch)
    }

    pub fn temp_fp_register(&self) -> Operand {
        Operand::Temp(TempKind::FpScratch)
    }

    pub fn temp_simd128_register(&self) -> Operand {
        Operand::Temp(TempKind::Simd128Scratch)
    }

    pub fn temp_fixed(&self, reg: Register) -> Operand {
        Operand::Temp(TempKind::Fixed(reg))
    }

    pub fn temp_immediate(&self, value: i64) -> Operand {
        Operand::Immediate(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alu_immediate_range_is_signed_12_bit() {
        assert!(ImmediateClass::Alu12.fits(2047));
        assert!(!ImmediateClass::Alu12.fits(2048));
        assert!(ImmediateClass::Alu12.fits(-2048));
        assert!(!ImmediateClass::Alu12.fits(-2049));
    }

    #[test]
    fn shift_immediate_range_is_unsigned_5_bit() {
        assert!(ImmediateClass::Shift5.fits(0));
        assert!(ImmediateClass::Shift5.fits(31));
        assert!(!ImmediateClass::Shift5.fits(32));
        assert!(!ImmediateClass::Shift5.fits(-1));
    }

    #[test]
    fn load_store_immediate_range_is_signed_32_bit() {
        assert!(ImmediateClass::LoadStore32.fits(i32::MAX as i64));
        assert!(ImmediateClass::LoadStore32.fits(i32::MIN as i64));
        assert!(!ImmediateClass::LoadStore32.fits(i32::MAX as i64 + 1));
    }
}
