//! # harbor-types
//!
//! Shared domain types used across the Harbor workspace: addresses, amounts,
//! the annual rate, the persisted vault ledger layout, and emitted events.

pub mod address;
pub mod events;
pub mod ledger;
pub mod rate;

pub use address::Address;
pub use events::{Event, EventKind};
pub use ledger::{AccountState, GlobalVaultState, LedgerSnapshot};
pub use rate::AnnualRate;

/// Token and asset amounts in base units.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Seconds in a (non-leap) year. Accrual is always pro-rated against this.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Decimals of the default base asset and reward token.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Base units per whole unit at [`DEFAULT_DECIMALS`].
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Error types for domain type construction and parsing.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Address string was not 20 hex-encoded bytes.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Rate denominator was zero.
    #[error("invalid rate: {numerator}/{denominator}")]
    InvalidRate {
        /// Rate numerator.
        numerator: u64,
        /// Rate denominator.
        denominator: u64,
    },

    /// Amount string could not be parsed.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Convenience result type for domain type operations.
pub type Result<T> = std::result::Result<T, TypesError>;

/// Parse a decimal amount string, accepting an optional fractional part
/// scaled by `decimals` (e.g. `"0.1"` with 18 decimals).
pub fn parse_units(s: &str, decimals: u8) -> Result<Amount> {
    let invalid = || TypesError::InvalidAmount(s.to_string());
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > decimals as usize {
        return Err(invalid());
    }
    let scale = 10u128.checked_pow(u32::from(decimals)).ok_or_else(invalid)?;
    let whole: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac_value: Amount = if frac.is_empty() {
        0
    } else {
        let padding = 10u128
            .checked_pow((decimals as usize - frac.len()) as u32)
            .ok_or_else(invalid)?;
        frac.parse::<Amount>()
            .map_err(|_| invalid())?
            .checked_mul(padding)
            .ok_or_else(invalid)?
    };
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_value))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_per_year() {
        assert_eq!(SECONDS_PER_YEAR, 31_536_000);
    }

    #[test]
    fn test_parse_units_whole_and_fraction() {
        assert_eq!(parse_units("10", 18).expect("parse"), 10 * UNIT);
        assert_eq!(parse_units("0.1", 18).expect("parse"), UNIT / 10);
        assert_eq!(parse_units("2.5", 2).expect("parse"), 250);
        assert_eq!(parse_units(".5", 1).expect("parse"), 5);
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units("0.001", 2).is_err());
    }
}
