// 💰 Money - fixed-point amounts with two decimal places
//
// Amounts travel as `Decimal` and are stored as integer cents.
// Equality is numeric: 1.5 and 1.50 are the same amount.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// Number of decimal places every stored amount carries
pub const SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount {0} has more than two decimal places")]
    TooPrecise(Decimal),

    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
}

/// Normalize an amount to exactly two decimal places.
///
/// Fails instead of rounding when the amount carries significant digits
/// past the second decimal place.
pub fn fixed(amount: Decimal) -> Result<Decimal, MoneyError> {
    let cents = to_cents(amount)?;
    Ok(from_cents(cents))
}

/// Convert an amount to integer cents (the storage representation)
pub fn to_cents(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.round_dp(SCALE) != amount {
        return Err(MoneyError::TooPrecise(amount));
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or(MoneyError::OutOfRange(amount))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, SCALE)
}

/// Numeric equality regardless of scale
pub fn same_amount(a: &Decimal, b: &Decimal) -> bool {
    a.normalize() == b.normalize()
}

/// Mean of a cents total over `count` items, rounded half-even to cents.
/// `None` when there is nothing to average.
pub fn average_cents(total_cents: i64, count: i64) -> Option<Decimal> {
    if count <= 0 {
        return None;
    }

    let mean = from_cents(total_cents).checked_div(Decimal::from(count))?;
    let mut rounded = mean.round_dp(SCALE);
    rounded.rescale(SCALE);
    Some(rounded)
}

// ============================================================================
// TESTS
// ============================================================================
