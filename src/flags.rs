//! Flags continuations (C3): a deferred consumer of a comparison's flags,
//! letting the compare and its user (branch/set/deopt/trap) fuse into one
//! instruction.

use derive_more::Display;

use crate::ir::Node;

/// Condition codes a flags-producing instruction can be tested against.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum Condition {
    #[display("eq")]
    Equal,
    #[display("ne")]
    NotEqual,
    #[display("slt")]
    SignedLessThan,
    #[display("sle")]
    SignedLessThanOrEqual,
    #[display("sgt")]
    SignedGreaterThan,
    #[display("sge")]
    SignedGreaterThanOrEqual,
    #[display("ult")]
    UnsignedLessThan,
    #[display("ule")]
    UnsignedLessThanOrEqual,
    #[display("ugt")]
    UnsignedGreaterThan,
    #[display("uge")]
    UnsignedGreaterThanOrEqual,
    #[display("ovf")]
    Overflow,
    #[display("novf")]
    NotOverflow,
    #[display("spgt")]
    StackPointerGreaterThan,
}

impl Condition {
    /// The condition that holds exactly when `self` does not.
    pub fn negated(self) -> Condition {
        use Condition::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            SignedLessThan => SignedGreaterThanOrEqual,
            SignedLessThanOrEqual => SignedGreaterThan,
            SignedGreaterThan => SignedLessThanOrEqual,
            SignedGreaterThanOrEqual => SignedLessThan,
            UnsignedLessThan => UnsignedGreaterThanOrEqual,
            UnsignedLessThanOrEqual => UnsignedGreaterThan,
            UnsignedGreaterThan => UnsignedLessThanOrEqual,
            UnsignedGreaterThanOrEqual => UnsignedLessThan,
            Overflow => NotOverflow,
            NotOverflow => Overflow,
            StackPointerGreaterThan => StackPointerGreaterThan,
        }
    }

    /// The condition that holds for `(b, a)` exactly when `self` holds for
    /// `(a, b)` — i.e. swapping operand order.
    pub fn commuted(self) -> Condition {
        use Condition::*;
        match self {
            Equal => Equal,
            NotEqual => NotEqual,
            SignedLessThan => SignedGreaterThan,
            SignedLessThanOrEqual => SignedGreaterThanOrEqual,
            SignedGreaterThan => SignedLessThan,
            SignedGreaterThanOrEqual => SignedLessThanOrEqual,
            UnsignedLessThan => UnsignedGreaterThan,
            UnsignedLessThanOrEqual => UnsignedGreaterThanOrEqual,
            UnsignedGreaterThan => UnsignedLessThan,
            UnsignedGreaterThanOrEqual => UnsignedLessThanOrEqual,
            Overflow => Overflow,
            NotOverflow => NotOverflow,
            StackPointerGreaterThan => StackPointerGreaterThan,
        }
    }
}

/// How a comparison's flags are consumed.
#[derive(Clone, Debug)]
pub enum FlagsContinuation {
    /// The value is produced into a register; no flags are consumed.
    None,
    /// Materialize a 0/1 boolean into `dest` under `condition`.
    Set { condition: Condition, dest: Node },
    /// Branch to one of two blocks depending on `condition`.
    Branch {
        condition: Condition,
        true_block: Node,
        false_block: Node,
    },
    /// Bail out of optimized code when `condition` holds.
    Deoptimize {
        condition: Condition,
        reason: &'static str,
        feedback: Node,
    },
    /// Trap when `condition` holds.
    Trap { condition: Condition, trap_id: u32 },
}

impl FlagsContinuation {
    pub fn condition(&self) -> Option<Condition> {
        match self {
            FlagsContinuation::None => None,
            FlagsContinuation::Set { condition, .. }
            | FlagsContinuation::Branch { condition, .. }
            | FlagsContinuation::Deoptimize { condition, .. }
            | FlagsContinuation::Trap { condition, .. } => Some(*condition),
        }
    }

    fn set_condition(&mut self, new: Condition) {
        match self {
            FlagsContinuation::None => {}
            FlagsContinuation::Set { condition, .. }
            | FlagsContinuation::Branch { condition, .. }
            | FlagsContinuation::Deoptimize { condition, .. }
            | FlagsContinuation::Trap { condition, .. } => *condition = new,
        }
    }

    /// Invert the polarity in place. `Negate().Negate()` is the identity
    /// (tested in §8 "Negation law").
    pub fn negate(&mut self) {
        if let Some(c) = self.condition() {
            self.set_condition(c.negated());
        }
    }

    /// Swap the operand order this continuation was built for.
    pub fn commute(&mut self) {
        if let Some(c) = self.condition() {
            self.set_condition(c.commuted());
        }
    }

    /// Special-cased rewrite used when folding `Equal(x, 0)` into a compare
    /// whose own result is itself being compared to zero again: the
    /// continuation is negated only if the condition is equality-shaped.
    pub fn overwrite_and_negate_if_equal(&mut self, condition: Condition) {
        let negate = matches!(self.condition(), Some(Condition::Equal));
        self.set_condition(condition);
        if negate {
            self.negate();
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FlagsContinuation::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negate_is_involution() {
        for c in [
            Condition::Equal,
            Condition::NotEqual,
            Condition::SignedLessThan,
            Condition::UnsignedGreaterThanOrEqual,
            Condition::Overflow,
            Condition::StackPointerGreaterThan,
        ] {
            assert_eq!(c.negated().negated(), c);
        }
    }

    #[test]
    fn commute_is_involution() {
        for c in [
            Condition::SignedLessThan,
            Condition::UnsignedGreaterThanOrEqual,
            Condition::Equal,
        ] {
            assert_eq!(c.commuted().commuted(), c);
        }
    }
}
