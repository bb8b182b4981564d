//! Events emitted by the vault and the reward token.
//!
//! Components record events in order as operations commit; the daemon
//! persists them and pushes them to subscribers.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{Address, Amount, Timestamp};

/// An event with the time it was recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unix timestamp of the committing operation.
    pub timestamp: Timestamp,
    /// What happened.
    pub kind: EventKind,
}

/// All event kinds.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // Vault events
    Deposit {
        account: Address,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
    },
    Withdrawal {
        account: Address,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
        #[serde_as(as = "DisplayFromStr")]
        reward_paid: Amount,
    },
    RewardTokenChanged {
        reward_token: Address,
    },
    ProtocolRewardClaimed {
        recipient: Address,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
    },
    InterestSkimmed {
        recipient: Address,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },

    // Reward token events
    ChangedAuthority {
        new_authority: Address,
    },
    /// `from == None` is a mint, `to == None` is a burn.
    Transfer {
        from: Option<Address>,
        to: Option<Address>,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
    },
}

impl EventKind {
    /// Stable event name used for storage and subscription filters.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Deposit { .. } => "Deposit",
            EventKind::Withdrawal { .. } => "Withdrawal",
            EventKind::RewardTokenChanged { .. } => "RewardTokenChanged",
            EventKind::ProtocolRewardClaimed { .. } => "ProtocolRewardClaimed",
            EventKind::InterestSkimmed { .. } => "InterestSkimmed",
            EventKind::OwnershipTransferred { .. } => "OwnershipTransferred",
            EventKind::ChangedAuthority { .. } => "ChangedAuthority",
            EventKind::Transfer { .. } => "Transfer",
        }
    }
}
