//! Capability advertisement (C8, §4.5): reports to the pipeline which
//! optional operator lowerings and alignment requirements this target
//! supports.

use crate::frame::FrameHandle;

use super::Selector;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AlignmentRequirement {
    /// Full unaligned access is supported.
    Any,
    /// Unaligned access must go through the explicit `U*` opcodes.
    NoUnaligned,
}

#[derive(Copy, Clone, Debug)]
pub struct Capabilities {
    pub word32_shift_is_safe: bool,
    pub int32_div_is_safe: bool,
    pub uint32_div_is_safe: bool,
    pub float32_round_down: bool,
    pub float32_round_up: bool,
    pub float32_round_truncate: bool,
    pub float32_round_ties_even: bool,
    pub alignment: AlignmentRequirement,
}

impl<'g, F: FrameHandle> Selector<'g, F> {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            word32_shift_is_safe: true,
            int32_div_is_safe: true,
            uint32_div_is_safe: true,
            float32_round_down: true,
            float32_round_up: true,
            float32_round_truncate: true,
            float32_round_ties_even: true,
            alignment: if self.flags.has_no_unaligned {
                AlignmentRequirement::NoUnaligned
            } else {
                AlignmentRequirement::Any
            },
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            word32_shift_is_safe: true,
            int32_div_is_safe: true,
            uint32_div_is_safe: true,
            float32_round_down: true,
            float32_round_up: true,
            float32_round_truncate: true,
            float32_round_ties_even: true,
            alignment: AlignmentRequirement::Any,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BumpFrame;
    use crate::ir::MidIrGraph;
    use crate::selector::{Flags, Selector};

    #[test]
    fn no_unaligned_flag_forces_alignment_requirement() {
        let graph = MidIrGraph::new();
        let flags = Flags {
            has_no_unaligned: true,
            ..Flags::default()
        };
        let sel = Selector::new(&graph, BumpFrame::default(), flags, internment::Intern::new("t".to_string()));
        assert_eq!(sel.capabilities().alignment, AlignmentRequirement::NoUnaligned);
    }

    #[test]
    fn float32_rounding_is_advertised_as_supported() {
        let graph = MidIrGraph::new();
        let sel = Selector::new(&graph, BumpFrame::default(), Flags::default(), internment::Intern::new("t".to_string()));
        let caps = sel.capabilities();
        assert!(caps.float32_round_down);
        assert!(caps.float32_round_up);
        assert!(caps.float32_round_truncate);
        assert!(caps.float32_round_ties_even);
    }
}
