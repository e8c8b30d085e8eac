//! Error taxonomy (§7). None of these are recovered: the pass is total with
//! respect to its declared operator subset and fails loudly outside it, so
//! the enclosing compile job aborts on any `Err` this crate returns.

use derive_more::{Display, Error};

use crate::ir::FunctionName;

#[derive(Debug, Display, Error)]
pub enum SelectionError {
    /// A node whose operator kind has no selection rule on this target.
    #[display("unimplemented operator {operator} in {function} at line {line}")]
    Unimplemented {
        function: FunctionName,
        operator: &'static str,
        line: u32,
    },
    /// A load/store whose machine representation is rejected on this
    /// target (compressed, 64-bit, sandboxed pointers, map words).
    #[display("unsupported representation {representation:?} in {function} at line {line}")]
    UnsupportedRepresentation {
        function: FunctionName,
        representation: &'static str,
        line: u32,
    },
    /// An internal consistency check (arity, input/output counts) failed.
    #[display("invariant violation in {function}: {detail}")]
    InvariantViolation {
        function: FunctionName,
        detail: &'static str,
    },
}

pub type SelectionResult<T> = Result<T, SelectionError>;
