//! # harbor-vault
//!
//! Yield-bearing custodial vault: staking ledger, reward accrual engine and
//! external-yield extraction.
//!
//! Depositors stake a base asset. The vault tracks each depositor's principal
//! and time-accrued reward, forwards principal to an external lending market,
//! and mints reward tokens to depositors when they withdraw. The owner can
//! extract yield the market earned above total principal without touching
//! what depositors are owed.
//!
//! Every operation is all-or-nothing: the ledger is snapshotted first and
//! external steps already performed are compensated in reverse order if a
//! later step fails.
//!
//! ## Modules
//!
//! - [`accrual`] — Interest and price-conversion math
//! - [`config`] — Construction parameters and accrual mode
//! - [`ledger`] — Global and per-account state with settlement
//! - [`journal`] — Compensation journal for unwinding external steps
//! - [`payout`] — Base-asset payout boundary
//! - [`vault`] — The vault itself

pub mod accrual;
pub mod config;
pub mod journal;
pub mod ledger;
pub mod payout;
pub mod vault;

pub use config::{AccrualMode, VaultConfig, DEFAULT_MIN_STAKE};
pub use ledger::Ledger;
pub use payout::{CashLedger, Payout, PayoutError};
pub use vault::Vault;

use harbor_access::AccessError;
use harbor_market::MarketError;
use harbor_oracle::OracleError;
use harbor_token::TokenError;
use harbor_types::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// Coarse error classification reported to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the required authority.
    AccessDenied,
    /// Zero amount, amount above balance, or a balance stranded below the minimum.
    InvalidAmount,
    /// The market, oracle, token or payout call did not succeed.
    ExternalCallFailure,
    /// Checked arithmetic overflowed or underflowed.
    ArithmeticFault,
    /// The vault is wired or called inconsistently.
    InvalidConfiguration,
}

/// Why an amount was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AmountViolation {
    #[error("amount must be greater than zero")]
    Zero,

    #[error("amount exceeds account balance: requested {requested}, available {available}")]
    ExceedsBalance {
        /// Requested amount.
        requested: Amount,
        /// Account principal.
        available: Amount,
    },

    #[error("below minimum staking amount: resulting balance {resulting}, minimum {minimum}")]
    BelowMinimumStake {
        /// Balance the operation would leave.
        resulting: Amount,
        /// Configured minimum stake.
        minimum: Amount,
    },
}

/// Error types for vault operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    /// Caller is not the owner.
    #[error("access denied: {0}")]
    AccessDenied(#[from] AccessError),

    /// Amount precondition failed.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountViolation),

    /// Lending market call failed.
    #[error("lending market call failed: {0}")]
    Market(#[from] MarketError),

    /// Price oracle call failed.
    #[error("price oracle call failed: {0}")]
    Oracle(#[from] OracleError),

    /// Reward token call failed.
    #[error("reward token call failed: {0}")]
    Token(#[from] TokenError),

    /// Base-asset payout failed.
    #[error("payout failed: {0}")]
    Payout(#[from] PayoutError),

    /// Checked arithmetic failed.
    #[error("arithmetic fault: {0}")]
    Arithmetic(&'static str),

    /// `now` precedes the account's accrual checkpoint.
    #[error("timestamp {now} precedes accrual checkpoint {checkpoint}")]
    InvalidTimestamp {
        /// Supplied time.
        now: Timestamp,
        /// Account checkpoint.
        checkpoint: Timestamp,
    },

    /// The token handed to the vault is not the configured reward token.
    #[error("reward token mismatch: expected {expected}, got {actual}")]
    RewardTokenMismatch {
        /// Configured reward token.
        expected: Address,
        /// Token supplied by the caller.
        actual: Address,
    },

    /// Price-converted accrual without an installed oracle.
    #[error("price-converted accrual requires a price oracle")]
    OracleMissing,

    /// A persisted snapshot does not fit this vault.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(&'static str),
}

impl VaultError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::AccessDenied(_) => ErrorKind::AccessDenied,
            VaultError::Token(TokenError::AccessDenied(_)) => ErrorKind::AccessDenied,
            VaultError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            VaultError::Market(_)
            | VaultError::Oracle(_)
            | VaultError::Token(_)
            | VaultError::Payout(_) => ErrorKind::ExternalCallFailure,
            VaultError::Arithmetic(_) => ErrorKind::ArithmeticFault,
            VaultError::InvalidTimestamp { .. }
            | VaultError::RewardTokenMismatch { .. }
            | VaultError::OracleMissing
            | VaultError::InvalidSnapshot(_) => ErrorKind::InvalidConfiguration,
        }
    }
}

/// Convenience result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
