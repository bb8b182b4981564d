//! # harbor-market
//!
//! Boundary to the external money market that custodies vault principal.
//!
//! The vault only ever talks to a market through [`LendingMarket`]. Every
//! call may fail; callers treat a failure as fatal to the enclosing operation
//! and never retry. The market's own accounting is authoritative: reported
//! balances may drift from what was supplied by a few base units of rounding.
//!
//! ## Modules
//!
//! - [`simulated`] — In-memory exchange-rate money market for local nodes and tests

pub mod simulated;

pub use simulated::{MarketConfig, MarketStatus, SimulatedMarket};

use harbor_types::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Market operations, used for error reporting and fault injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketOp {
    Supply,
    Redeem,
    UnderlyingBalance,
    ClaimProtocolReward,
}

impl std::fmt::Display for MarketOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MarketOp::Supply => "supply",
            MarketOp::Redeem => "redeem",
            MarketOp::UnderlyingBalance => "underlying_balance",
            MarketOp::ClaimProtocolReward => "claim_protocol_reward",
        };
        f.write_str(name)
    }
}

/// Error types for lending market calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    /// The market could not be reached.
    #[error("market unavailable during {op}")]
    Unavailable {
        /// The failed operation.
        op: MarketOp,
    },

    /// The market reverted the call.
    #[error("market rejected {op}: {reason}")]
    Rejected {
        /// The failed operation.
        op: MarketOp,
        /// Reason reported by the market.
        reason: String,
    },

    /// Redeem exceeds the position.
    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity {
        /// Requested underlying.
        requested: Amount,
        /// Underlying held by the position.
        available: Amount,
    },

    /// Arithmetic overflow in market accounting.
    #[error("arithmetic overflow in market accounting")]
    Overflow,
}

/// Convenience result type for market calls.
pub type Result<T> = std::result::Result<T, MarketError>;

/// An external money market holding principal on behalf of one supplier.
pub trait LendingMarket {
    /// Address of the market, recorded in the vault's global state.
    fn address(&self) -> Address;

    /// Supply `amount` of underlying from the bound supplier.
    fn supply(&mut self, amount: Amount) -> Result<()>;

    /// Redeem exactly `amount` of underlying back to the bound supplier.
    fn redeem(&mut self, amount: Amount) -> Result<()>;

    /// Current underlying value of `owner`'s position, including interest.
    fn underlying_balance(&self, owner: &Address) -> Result<Amount>;

    /// Send all accrued protocol-reward tokens to `recipient`. Returns the
    /// amount sent, which may be zero.
    fn claim_protocol_reward(&mut self, recipient: &Address) -> Result<Amount>;
}
