//! # harbor-token
//!
//! Reward token paid to vault depositors.
//!
//! A fungible balance ledger whose mint and burn are callable only by one
//! designated authority (the vault). The authority is set by the token
//! owner.
//!
//! ## Modules
//!
//! - [`token`] — Reward token ledger and authority gating

pub mod token;

pub use token::{RewardToken, TokenMetadata, TokenSnapshot};

use harbor_access::AccessError;
use harbor_types::{Address, Amount};

/// Error types for reward token operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Caller lacks owner or mint authority.
    #[error("access denied: {0}")]
    AccessDenied(#[from] AccessError),

    /// Account balance is too small for the requested debit.
    #[error("insufficient balance for {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Debited account.
        account: Address,
        /// Requested amount.
        requested: Amount,
        /// Available balance.
        available: Amount,
    },

    /// Zero address used as a recipient.
    #[error("invalid recipient: zero address")]
    InvalidRecipient,

    /// Supply or balance overflow.
    #[error("arithmetic overflow")]
    Overflow,

    /// A persisted token state does not add up.
    #[error("invalid token snapshot: {0}")]
    InvalidSnapshot(&'static str),
}

/// Convenience result type for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;
