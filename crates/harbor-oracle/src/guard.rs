//! Staleness guard and emergency pause for price feeds.
//!
//! ## Staleness Detection
//!
//! A price whose `updated_at` lags the guard's clock by more than the
//! configured threshold is rejected with [`OracleError::StaleData`]. A price
//! stamped in the future is treated as fresh.

use harbor_types::{Address, Timestamp};

use crate::{OracleError, PriceData, PriceOracle, Result};

/// Default staleness threshold in seconds (1 hour).
pub const STALENESS_THRESHOLD: u64 = 3600;

/// Reject `price` if it is older than `threshold` seconds at `now`.
///
/// # Errors
///
/// - [`OracleError::StaleData`] if `now - price.updated_at > threshold`
pub fn check_fresh(price: &PriceData, now: Timestamp, threshold: u64) -> Result<()> {
    if now.saturating_sub(price.updated_at) > threshold {
        return Err(OracleError::StaleData {
            last_update: price.updated_at,
            current: now,
            threshold,
        });
    }
    Ok(())
}

/// Wraps a feed, rejecting stale prices and supporting an emergency pause.
///
/// `clock` supplies the current time on every read.
pub struct StalenessGuard<O, C> {
    inner: O,
    clock: C,
    staleness_threshold: u64,
    paused: bool,
}

impl<O, C> StalenessGuard<O, C>
where
    O: PriceOracle,
    C: Fn() -> Timestamp,
{
    /// Guard `inner` with the default threshold.
    pub fn new(inner: O, clock: C) -> Self {
        Self::with_threshold(inner, clock, STALENESS_THRESHOLD)
    }

    /// Guard `inner` with a custom threshold.
    pub fn with_threshold(inner: O, clock: C, staleness_threshold: u64) -> Self {
        Self {
            inner,
            clock,
            staleness_threshold,
            paused: false,
        }
    }

    /// Trigger an emergency pause. Every read fails until [`resume`](Self::resume).
    pub fn trigger_pause(&mut self) {
        tracing::warn!(oracle = %self.inner.address(), "staleness guard: oracle paused");
        self.paused = true;
    }

    pub fn resume(&mut self) {
        tracing::info!(oracle = %self.inner.address(), "staleness guard: oracle resumed");
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn staleness_threshold(&self) -> u64 {
        self.staleness_threshold
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut O {
        &mut self.inner
    }
}

impl<O, C> PriceOracle for StalenessGuard<O, C>
where
    O: PriceOracle,
    C: Fn() -> Timestamp,
{
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn latest_price(&self) -> Result<PriceData> {
        if self.paused {
            return Err(OracleError::Paused);
        }
        let price = self.inner.latest_price()?;
        check_fresh(&price, (self.clock)(), self.staleness_threshold)?;
        Ok(price)
    }
}
