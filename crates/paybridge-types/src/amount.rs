//! Decimal token amounts.
//!
//! Amounts are carried as [`Decimal`] in the token's human units (e.g. `10.5` USDC),
//! never as floats. This module holds the validation shared by the fee calculator
//! and the payment lifecycle.

use rust_decimal::Decimal;

/// Errors raised while validating an amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be greater than zero, got {0}")]
    NonPositive(Decimal),
    #[error("Too big of a precision: {amount} has {scale} decimals, token supports {decimals}")]
    WrongPrecision {
        amount: Decimal,
        scale: u32,
        decimals: u8,
    },
    #[error("Amount {amount} is below the token minimum {min}")]
    BelowMinimum { amount: Decimal, min: Decimal },
    #[error("Amount {amount} is above the token maximum {max}")]
    AboveMaximum { amount: Decimal, max: Decimal },
    #[error("Amount {0} is out of range for fee arithmetic")]
    Overflow(Decimal),
}

/// Rejects zero and negative amounts.
pub fn ensure_positive(amount: Decimal) -> Result<Decimal, AmountError> {
    if amount <= Decimal::ZERO {
        Err(AmountError::NonPositive(amount))
    } else {
        Ok(amount)
    }
}

/// Rejects amounts with more fractional digits than the token can represent.
pub fn ensure_precision(amount: Decimal, decimals: u8) -> Result<Decimal, AmountError> {
    let normalized = amount.normalize();
    if normalized.scale() > u32::from(decimals) {
        Err(AmountError::WrongPrecision {
            amount,
            scale: normalized.scale(),
            decimals,
        })
    } else {
        Ok(amount)
    }
}

/// `amount * percent / 100`.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Result<Decimal, AmountError> {
    amount
        .checked_mul(percent)
        .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(AmountError::Overflow(amount))
}

/// Sums `parts`, failing instead of wrapping past [`Decimal::MAX`].
pub fn checked_sum(parts: &[Decimal]) -> Result<Decimal, AmountError> {
    parts.iter().try_fold(Decimal::ZERO, |sum, part| {
        sum.checked_add(*part).ok_or(AmountError::Overflow(*part))
    })
}
