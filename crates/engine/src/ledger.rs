//! Obligation ledger arithmetic.
//!
//! `to_settle` and `is_settled` are never stored independently of `settled`:
//! they are always the output of [`settlement`] for the current
//! `(total_amount, settled)` pair.
//!
//! Overpayment is absorbed: when `settled` exceeds `total_amount` the
//! outstanding amount clamps at zero and the excess is not tracked.

use crate::{Money, Obligation};

/// Derived settlement state of an obligation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub to_settle: Money,
    pub is_settled: bool,
}

/// Computes `to_settle = clamp(total_amount - settled, 0, total_amount)` and
/// `is_settled = (to_settle == 0)`.
///
/// A negative `settled` clamps `to_settle` at `total_amount`.
#[must_use]
pub fn settlement(total_amount: Money, settled: Money) -> Settlement {
    let upper = total_amount.max(Money::ZERO);
    let to_settle = total_amount
        .saturating_sub(settled)
        .max(Money::ZERO)
        .min(upper);
    Settlement {
        to_settle,
        is_settled: to_settle.is_zero(),
    }
}

/// Returns the obligation with its derived fields recomputed from
/// `total_amount` and `settled`.
///
/// Pure and idempotent: recomputing an already recomputed snapshot is a no-op.
#[must_use]
pub fn recompute(obligation: Obligation) -> Obligation {
    let derived = settlement(obligation.total_amount(), obligation.settled());
    obligation.with_settlement(derived)
}
