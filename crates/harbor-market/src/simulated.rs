//! In-memory money market.
//!
//! Models an exchange-rate market: supplying underlying mints market tokens at
//! the current exchange rate, and interest accrues by growing that rate. The
//! position's underlying value is `tokens * exchange_rate / SCALE`, rounded
//! down, so it can sit a few base units below what was supplied.
//!
//! ## Formula
//!
//! ```text
//! tokens_minted  = floor(amount * SCALE / exchange_rate)
//! tokens_burned  = floor(amount * SCALE / exchange_rate)
//! rate'          = rate + rate * supply_apr * elapsed / SECONDS_PER_YEAR
//! reward'        = reward + underlying * reward_rate * elapsed / SECONDS_PER_YEAR
//! ```

use std::collections::BTreeMap;

use harbor_types::{Address, Amount, AnnualRate, Timestamp, SECONDS_PER_YEAR};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{LendingMarket, MarketError, MarketOp, Result};

/// Fixed-point scale of the exchange rate.
pub const EXCHANGE_RATE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Market parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Interest paid to suppliers per year.
    pub supply_apr: AnnualRate,
    /// Protocol-reward tokens accrued per unit of underlying per year.
    pub protocol_reward_rate: AnnualRate,
    /// Exchange rate at deployment, scaled by [`EXCHANGE_RATE_SCALE`].
    pub initial_exchange_rate: u128,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            supply_apr: AnnualRate::from_bps(250),
            protocol_reward_rate: AnnualRate::from_bps(10),
            initial_exchange_rate: EXCHANGE_RATE_SCALE,
        }
    }
}

/// Read-only view of the market for diagnostics.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub address: Address,
    pub supplier: Address,
    #[serde_as(as = "DisplayFromStr")]
    pub exchange_rate: u128,
    #[serde_as(as = "DisplayFromStr")]
    pub market_tokens: u128,
    #[serde_as(as = "DisplayFromStr")]
    pub underlying: Amount,
    #[serde_as(as = "DisplayFromStr")]
    pub accrued_protocol_reward: Amount,
    pub last_accrual: Timestamp,
    pub unavailable: bool,
}

/// An in-memory money market serving one supplier.
#[derive(Clone, Debug)]
pub struct SimulatedMarket {
    address: Address,
    supplier: Address,
    config: MarketConfig,
    exchange_rate: u128,
    market_tokens: u128,
    accrued_protocol_reward: Amount,
    protocol_reward_balances: BTreeMap<Address, Amount>,
    last_accrual: Timestamp,
    unavailable: bool,
    fail_next: Option<MarketOp>,
}

impl SimulatedMarket {
    /// Deploy a market at `address` serving `supplier`, with accrual starting
    /// at `now`.
    pub fn new(address: Address, supplier: Address, config: MarketConfig, now: Timestamp) -> Self {
        let exchange_rate = config.initial_exchange_rate.max(1);
        Self {
            address,
            supplier,
            config,
            exchange_rate,
            market_tokens: 0,
            accrued_protocol_reward: 0,
            protocol_reward_balances: BTreeMap::new(),
            last_accrual: now,
            unavailable: false,
            fail_next: None,
        }
    }

    /// Accrue interest and protocol reward up to `now`. Earlier timestamps
    /// are ignored.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Overflow`] on arithmetic overflow
    pub fn accrue_to(&mut self, now: Timestamp) -> Result<()> {
        if now <= self.last_accrual {
            return Ok(());
        }
        let elapsed = now - self.last_accrual;
        let underlying = self.position_underlying()?;

        let rate_growth = pro_rata(self.exchange_rate, &self.config.supply_apr, elapsed)?;
        let reward_growth = pro_rata(underlying, &self.config.protocol_reward_rate, elapsed)?;

        self.exchange_rate = self
            .exchange_rate
            .checked_add(rate_growth)
            .ok_or(MarketError::Overflow)?;
        self.accrued_protocol_reward = self
            .accrued_protocol_reward
            .checked_add(reward_growth)
            .ok_or(MarketError::Overflow)?;
        self.last_accrual = now;

        tracing::trace!(
            elapsed,
            exchange_rate = self.exchange_rate,
            reward = self.accrued_protocol_reward,
            "market: accrued"
        );
        Ok(())
    }

    /// Credit roughly `amount` of extra underlying to the position by bumping
    /// the exchange rate. No effect on an empty position.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Overflow`] on arithmetic overflow
    pub fn simulate_yield(&mut self, amount: Amount) -> Result<()> {
        if self.market_tokens == 0 {
            return Ok(());
        }
        let bump = amount
            .checked_mul(EXCHANGE_RATE_SCALE)
            .ok_or(MarketError::Overflow)?
            / self.market_tokens;
        self.exchange_rate = self
            .exchange_rate
            .checked_add(bump)
            .ok_or(MarketError::Overflow)?;
        Ok(())
    }

    /// Make every call fail (or succeed again) until toggled.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        tracing::warn!(unavailable, "market: availability changed (dev only)");
        self.unavailable = unavailable;
    }

    /// Make the next call of `op` be rejected once.
    pub fn fail_next(&mut self, op: MarketOp) {
        self.fail_next = Some(op);
    }

    /// Protocol-reward tokens previously claimed to `recipient`.
    pub fn protocol_reward_balance(&self, recipient: &Address) -> Amount {
        self.protocol_reward_balances
            .get(recipient)
            .copied()
            .unwrap_or(0)
    }

    /// Protocol reward accrued and not yet claimed.
    pub fn accrued_protocol_reward(&self) -> Amount {
        self.accrued_protocol_reward
    }

    pub fn exchange_rate(&self) -> u128 {
        self.exchange_rate
    }

    /// Diagnostic snapshot.
    pub fn status(&self) -> MarketStatus {
        MarketStatus {
            address: self.address,
            supplier: self.supplier,
            exchange_rate: self.exchange_rate,
            market_tokens: self.market_tokens,
            underlying: self.position_underlying().unwrap_or(Amount::MAX),
            accrued_protocol_reward: self.accrued_protocol_reward,
            last_accrual: self.last_accrual,
            unavailable: self.unavailable,
        }
    }

    fn position_underlying(&self) -> Result<Amount> {
        Ok(self
            .market_tokens
            .checked_mul(self.exchange_rate)
            .ok_or(MarketError::Overflow)?
            / EXCHANGE_RATE_SCALE)
    }

    fn tokens_for(&self, amount: Amount) -> Result<u128> {
        Ok(amount
            .checked_mul(EXCHANGE_RATE_SCALE)
            .ok_or(MarketError::Overflow)?
            / self.exchange_rate)
    }

    fn guard(&mut self, op: MarketOp) -> Result<()> {
        if self.unavailable {
            tracing::warn!(%op, "market: call while unavailable");
            return Err(MarketError::Unavailable { op });
        }
        if self.fail_next == Some(op) {
            self.fail_next = None;
            tracing::warn!(%op, "market: injected rejection");
            return Err(MarketError::Rejected {
                op,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl LendingMarket for SimulatedMarket {
    fn address(&self) -> Address {
        self.address
    }

    fn supply(&mut self, amount: Amount) -> Result<()> {
        self.guard(MarketOp::Supply)?;
        let minted = self.tokens_for(amount)?;
        if minted == 0 {
            return Err(MarketError::Rejected {
                op: MarketOp::Supply,
                reason: "supply rounds to zero market tokens".to_string(),
            });
        }
        self.market_tokens = self
            .market_tokens
            .checked_add(minted)
            .ok_or(MarketError::Overflow)?;
        tracing::debug!(amount, minted, "market: supplied");
        Ok(())
    }

    fn redeem(&mut self, amount: Amount) -> Result<()> {
        self.guard(MarketOp::Redeem)?;
        // Gate on tokens: above par, the floored underlying of a fresh
        // position reads below what was supplied.
        let burned = self.tokens_for(amount)?;
        if burned > self.market_tokens {
            return Err(MarketError::InsufficientLiquidity {
                requested: amount,
                available: self.position_underlying()?,
            });
        }
        if burned == 0 {
            return Err(MarketError::Rejected {
                op: MarketOp::Redeem,
                reason: "redeem rounds to zero market tokens".to_string(),
            });
        }
        self.market_tokens -= burned;
        tracing::debug!(amount, burned, "market: redeemed");
        Ok(())
    }

    fn underlying_balance(&self, owner: &Address) -> Result<Amount> {
        if self.unavailable {
            return Err(MarketError::Unavailable {
                op: MarketOp::UnderlyingBalance,
            });
        }
        if *owner != self.supplier {
            return Ok(0);
        }
        self.position_underlying()
    }

    fn claim_protocol_reward(&mut self, recipient: &Address) -> Result<Amount> {
        self.guard(MarketOp::ClaimProtocolReward)?;
        let claimed = std::mem::take(&mut self.accrued_protocol_reward);
        if claimed == 0 {
            return Ok(0);
        }
        let balance = self
            .protocol_reward_balance(recipient)
            .checked_add(claimed)
            .ok_or(MarketError::Overflow)?;
        self.protocol_reward_balances.insert(*recipient, balance);
        tracing::debug!(%recipient, claimed, "market: protocol reward claimed");
        Ok(claimed)
    }
}

/// `value * rate * elapsed / SECONDS_PER_YEAR`, rounded down.
fn pro_rata(value: u128, rate: &AnnualRate, elapsed: u64) -> Result<u128> {
    let numerator = value
        .checked_mul(u128::from(rate.numerator))
        .and_then(|v| v.checked_mul(u128::from(elapsed)))
        .ok_or(MarketError::Overflow)?;
    let denominator = u128::from(rate.denominator) * u128::from(SECONDS_PER_YEAR);
    Ok(numerator / denominator)
}
