//! # harbor-oracle
//!
//! Price feeds consumed by the vault when rewards are priced in a reference
//! currency rather than in staked-asset units.
//!
//! A feed reports `(value, decimals, updated_at)`; the real price is
//! `value / 10^decimals`. Feeds are external and consumed only through
//! [`PriceOracle`].
//!
//! ## Modules
//!
//! - [`fixed`] — Settable price feed for local nodes and tests
//! - [`guard`] — Staleness checks and emergency pause

pub mod fixed;
pub mod guard;

pub use fixed::FixedPriceOracle;
pub use guard::{check_fresh, StalenessGuard, STALENESS_THRESHOLD};

use harbor_types::{Address, Timestamp};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

/// Largest accepted `decimals` value; `10^38` is the largest power of ten in a `u128`.
pub const MAX_DECIMALS: u8 = 38;

/// A price observation.
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    /// Price scaled by `10^decimals`.
    #[serde_as(as = "DisplayFromStr")]
    pub value: u128,
    /// Number of decimals in `value`.
    pub decimals: u8,
    /// When the feed last updated.
    pub updated_at: Timestamp,
}

impl PriceData {
    /// `10^decimals`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidDecimals`] if `decimals` exceeds [`MAX_DECIMALS`]
    pub fn scale(&self) -> Result<u128> {
        if self.decimals > MAX_DECIMALS {
            return Err(OracleError::InvalidDecimals(self.decimals));
        }
        Ok(10u128.pow(u32::from(self.decimals)))
    }
}

/// Error types for oracle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Price is zero.
    #[error("invalid price: {0}")]
    InvalidPrice(u128),

    /// Decimals out of range.
    #[error("invalid decimals: {0}")]
    InvalidDecimals(u8),

    /// Oracle data is stale beyond the staleness threshold.
    #[error(
        "oracle data is stale: last update {last_update}, current {current}, threshold {threshold}"
    )]
    StaleData {
        /// Timestamp of the last update.
        last_update: Timestamp,
        /// Current timestamp.
        current: Timestamp,
        /// Staleness threshold in seconds.
        threshold: u64,
    },

    /// The oracle is paused via the circuit breaker.
    #[error("oracle is paused")]
    Paused,

    /// The feed could not be reached.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;

/// A price feed.
pub trait PriceOracle {
    /// Address of the feed, recorded in the vault's global state.
    fn address(&self) -> Address;

    /// Latest reported price.
    fn latest_price(&self) -> Result<PriceData>;
}

impl<O: PriceOracle + ?Sized> PriceOracle for Box<O> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn latest_price(&self) -> Result<PriceData> {
        (**self).latest_price()
    }
}
