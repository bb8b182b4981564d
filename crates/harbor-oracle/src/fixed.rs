//! Settable price feed.
//!
//! Stands in for an external aggregator on local nodes and in tests. The
//! price only changes through [`FixedPriceOracle::set_price`].

use harbor_types::{Address, Timestamp};

use crate::{OracleError, PriceData, PriceOracle, Result, MAX_DECIMALS};

/// Default feed decimals.
pub const DEFAULT_DECIMALS: u8 = 8;

/// Default price: 100.00000000.
pub const DEFAULT_PRICE: u128 = 100 * 100_000_000;

/// A price feed that reports whatever it was last set to.
#[derive(Debug, Clone)]
pub struct FixedPriceOracle {
    address: Address,
    value: u128,
    decimals: u8,
    updated_at: Timestamp,
}

impl FixedPriceOracle {
    /// Create a feed at `address` reporting `value` with `decimals`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidPrice`] if `value` is zero
    /// - [`OracleError::InvalidDecimals`] if `decimals` exceeds [`MAX_DECIMALS`]
    pub fn new(address: Address, value: u128, decimals: u8, updated_at: Timestamp) -> Result<Self> {
        validate(value, decimals)?;
        Ok(Self {
            address,
            value,
            decimals,
            updated_at,
        })
    }

    /// Create a feed reporting [`DEFAULT_PRICE`] with [`DEFAULT_DECIMALS`].
    pub fn with_default_price(address: Address, updated_at: Timestamp) -> Self {
        Self {
            address,
            value: DEFAULT_PRICE,
            decimals: DEFAULT_DECIMALS,
            updated_at,
        }
    }

    /// Set a new price (development/testing only).
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidPrice`] if `value` is zero
    pub fn set_price(&mut self, value: u128, updated_at: Timestamp) -> Result<()> {
        validate(value, self.decimals)?;
        tracing::warn!(
            new_price = value,
            decimals = self.decimals,
            "fixed oracle: price changed (dev only)"
        );
        self.value = value;
        self.updated_at = updated_at;
        Ok(())
    }
}

impl PriceOracle for FixedPriceOracle {
    fn address(&self) -> Address {
        self.address
    }

    fn latest_price(&self) -> Result<PriceData> {
        Ok(PriceData {
            value: self.value,
            decimals: self.decimals,
            updated_at: self.updated_at,
        })
    }
}

fn validate(value: u128, decimals: u8) -> Result<()> {
    if value == 0 {
        return Err(OracleError::InvalidPrice(value));
    }
    if decimals > MAX_DECIMALS {
        return Err(OracleError::InvalidDecimals(decimals));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_price() {
        let oracle = FixedPriceOracle::with_default_price(Address::derive("oracle"), 10);
        let price = oracle.latest_price().expect("price");
        assert_eq!(price.value, 100_00000000);
        assert_eq!(price.decimals, 8);
        assert_eq!(price.updated_at, 10);
    }

    #[test]
    fn test_zero_price_rejected() {
        assert!(FixedPriceOracle::new(Address::derive("oracle"), 0, 8, 0).is_err());

        let mut oracle = FixedPriceOracle::with_default_price(Address::derive("oracle"), 0);
        assert_eq!(oracle.set_price(0, 5), Err(OracleError::InvalidPrice(0)));
        assert_eq!(oracle.latest_price().expect("price").value, DEFAULT_PRICE);
    }

    #[test]
    fn test_set_price() {
        let mut oracle = FixedPriceOracle::with_default_price(Address::derive("oracle"), 0);
        oracle.set_price(250_00000000, 99).expect("set");
        let price = oracle.latest_price().expect("price");
        assert_eq!(price.value, 250_00000000);
        assert_eq!(price.updated_at, 99);
    }
}
