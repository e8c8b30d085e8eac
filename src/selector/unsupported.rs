//! The explicit unsupported-operator list (§4.2.9): these IR kinds are
//! architecturally unsupported by the 32-bit RISC-V target as specified
//! here, and fail with a fatal diagnostic rather than a guessed lowering.

use crate::error::{SelectionError, SelectionResult};
use crate::frame::FrameHandle;
use crate::ir::OperatorKind;

use super::Selector;

impl<'g, F: FrameHandle> Selector<'g, F> {
    pub(super) fn visit_unsupported(&self, opcode: OperatorKind) -> SelectionResult<()> {
        let name: &'static str = match opcode {
            OperatorKind::ProtectedLoad => "ProtectedLoad",
            OperatorKind::ProtectedStore => "ProtectedStore",
            OperatorKind::Float64RoundDown => "Float64RoundDown",
            OperatorKind::Float64RoundUp => "Float64RoundUp",
            OperatorKind::Float64RoundTruncate => "Float64RoundTruncate",
            OperatorKind::Float64RoundTiesEven => "Float64RoundTiesEven",
            OperatorKind::Float64RoundTiesAway => "Float64RoundTiesAway",
            OperatorKind::Word32Rol => "Word32Rol",
            OperatorKind::Word32ReverseBits => "Word32ReverseBits",
            OperatorKind::Word64ReverseBytes => "Word64ReverseBytes",
            OperatorKind::Simd128ReverseBytes => "Simd128ReverseBytes",
            OperatorKind::Int32AbsWithOverflow => "Int32AbsWithOverflow",
            OperatorKind::Int64AbsWithOverflow => "Int64AbsWithOverflow",
            _ => "unknown",
        };
        Err(SelectionError::Unimplemented {
            function: self.function,
            operator: name,
            line: line!(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BumpFrame;
    use crate::ir::{MidIrGraph, OperatorParams};
    use crate::selector::{Flags, Selector};

    #[test]
    fn word32_rol_is_unimplemented() {
        let mut graph = MidIrGraph::new();
        let x = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
        let node = graph.add_node(OperatorKind::Word32Rol, OperatorParams::default(), vec![x]);
        let mut sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        let err = sel.visit(node).unwrap_err();
        assert!(matches!(err, SelectionError::Unimplemented { operator: "Word32Rol", .. }));
    }
}
