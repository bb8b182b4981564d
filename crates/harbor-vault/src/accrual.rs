//! Reward accrual math.
//!
//! ## Formula
//!
//! ```text
//! interest = balance * rate.numerator * elapsed / (rate.denominator * SECONDS_PER_YEAR)
//! reward   = interest                                  (flat)
//! reward   = interest * price.value / 10^price.decimals (price-converted)
//! ```
//!
//! Each stage rounds down. All arithmetic is checked.

use harbor_oracle::PriceData;
use harbor_types::{Amount, AnnualRate, SECONDS_PER_YEAR};

use crate::{Result, VaultError};

/// `floor(amount * numerator / denominator)` without forming the full product
/// when `amount` is large.
///
/// # Errors
///
/// - [`VaultError::Arithmetic`] on a zero denominator or overflow
pub fn mul_div(amount: u128, numerator: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(VaultError::Arithmetic("division by zero"));
    }
    let quotient = amount / denominator;
    let remainder = amount % denominator;
    let whole = quotient
        .checked_mul(numerator)
        .ok_or(VaultError::Arithmetic("accrual overflow"))?;
    let fraction = remainder
        .checked_mul(numerator)
        .ok_or(VaultError::Arithmetic("accrual overflow"))?
        / denominator;
    whole
        .checked_add(fraction)
        .ok_or(VaultError::Arithmetic("accrual overflow"))
}

/// Interest in staked-asset units for `balance` held `elapsed` seconds.
///
/// # Errors
///
/// - [`VaultError::Arithmetic`] on overflow
pub fn interest(balance: Amount, rate: &AnnualRate, elapsed: u64) -> Result<Amount> {
    if balance == 0 || elapsed == 0 || rate.is_zero() {
        return Ok(0);
    }
    let numerator = u128::from(rate.numerator) * u128::from(elapsed);
    let denominator = u128::from(rate.denominator) * u128::from(SECONDS_PER_YEAR);
    mul_div(balance, numerator, denominator)
}

/// Convert staked-asset interest into reward units at `price`.
///
/// # Errors
///
/// - [`VaultError::Oracle`] if the price carries out-of-range decimals
/// - [`VaultError::Arithmetic`] on overflow
pub fn convert(interest: Amount, price: &PriceData) -> Result<Amount> {
    let scale = price.scale()?;
    mul_div(interest, price.value, scale)
}

/// Reward earned by `balance` over `elapsed` seconds, converted at `price`
/// when one is given.
///
/// # Errors
///
/// See [`interest`] and [`convert`].
pub fn reward(
    balance: Amount,
    rate: &AnnualRate,
    elapsed: u64,
    price: Option<&PriceData>,
) -> Result<Amount> {
    let earned = interest(balance, rate, elapsed)?;
    match price {
        Some(price) if earned > 0 => convert(earned, price),
        _ => Ok(earned),
    }
}
