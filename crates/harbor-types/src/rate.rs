//! Fixed annual interest rate as a rational fraction.

use serde::{Deserialize, Serialize};

use crate::{Result, TypesError};

/// Basis points in 100%.
pub const BASIS_POINTS_100_PERCENT: u64 = 10_000;

/// An annual rate `numerator / denominator` applied to staked principal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualRate {
    /// Rate numerator.
    pub numerator: u64,
    /// Rate denominator (never zero).
    pub denominator: u64,
}

impl AnnualRate {
    /// Build a rate from a numerator and a non-zero denominator.
    ///
    /// # Errors
    ///
    /// - [`TypesError::InvalidRate`] if `denominator` is zero
    pub fn new(numerator: u64, denominator: u64) -> Result<Self> {
        if denominator == 0 {
            return Err(TypesError::InvalidRate {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Rate in basis points (100 bps = 1%).
    pub const fn from_bps(bps: u64) -> Self {
        Self {
            numerator: bps,
            denominator: BASIS_POINTS_100_PERCENT,
        }
    }

    /// Rate in whole percent.
    pub const fn from_percent(percent: u64) -> Self {
        Self {
            numerator: percent,
            denominator: 100,
        }
    }

    /// Return whether the rate accrues nothing.
    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominator_rejected() {
        assert!(AnnualRate::new(1, 0).is_err());
        assert!(AnnualRate::new(1, 100).is_ok());
    }

    #[test]
    fn test_bps_and_percent_agree() {
        let a = AnnualRate::from_bps(100);
        let b = AnnualRate::from_percent(1);
        assert_eq!(
            u128::from(a.numerator) * u128::from(b.denominator),
            u128::from(b.numerator) * u128::from(a.denominator)
        );
        assert!(AnnualRate::from_bps(0).is_zero());
    }
}
