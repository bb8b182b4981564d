//! Persisted vault ledger layout.
//!
//! The global state and the per-account map are the entire durable state of
//! a vault. Amounts serialize as decimal strings so `u128` values survive
//! JSON and SQLite round trips.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{Address, Amount, AnnualRate, Timestamp};

/// Per-depositor state. Created on first deposit and kept at zero balance
/// after a full withdrawal.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Current principal.
    #[serde_as(as = "DisplayFromStr")]
    pub staked_balance: Amount,
    /// Last settlement checkpoint.
    pub last_accrual_timestamp: Timestamp,
    /// Reward accrued up to the checkpoint and not yet paid out.
    #[serde_as(as = "DisplayFromStr")]
    pub settled_reward_amount: Amount,
}

impl AccountState {
    /// A zeroed account checkpointed at `now`.
    pub fn new(now: Timestamp) -> Self {
        Self {
            staked_balance: 0,
            last_accrual_timestamp: now,
            settled_reward_amount: 0,
        }
    }

    /// Return whether the account holds neither principal nor unpaid reward.
    pub fn is_empty(&self) -> bool {
        self.staked_balance == 0 && self.settled_reward_amount == 0
    }
}

/// Vault-wide singleton state.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVaultState {
    /// Sum of every account's principal.
    #[serde_as(as = "DisplayFromStr")]
    pub total_staked: Amount,
    /// Reward token the vault mints from.
    pub reward_token: Address,
    /// External lending market holding the principal.
    pub lending_market: Address,
    /// Annual rate applied to principal.
    pub annual_rate: AnnualRate,
    /// Price oracle used for price-converted accrual, if any.
    pub price_oracle: Option<Address>,
}

/// Full ledger snapshot: global state plus every account ever created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Global state.
    pub global: GlobalVaultState,
    /// Accounts keyed by depositor address.
    pub accounts: BTreeMap<Address, AccountState>,
}

impl LedgerSnapshot {
    /// Sum of all account balances, or `None` on overflow.
    pub fn sum_of_balances(&self) -> Option<Amount> {
        self.accounts
            .values()
            .try_fold(0u128, |acc, a| acc.checked_add(a.staked_balance))
    }

    /// Return whether the account balances add up to `total_staked`.
    pub fn is_conserved(&self) -> bool {
        self.sum_of_balances() == Some(self.global.total_staked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(total: Amount) -> GlobalVaultState {
        GlobalVaultState {
            total_staked: total,
            reward_token: Address::derive("token"),
            lending_market: Address::derive("market"),
            annual_rate: AnnualRate::from_percent(1),
            price_oracle: None,
        }
    }

    #[test]
    fn test_conservation_check() {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            Address::derive("a"),
            AccountState {
                staked_balance: 10,
                last_accrual_timestamp: 0,
                settled_reward_amount: 0,
            },
        );
        accounts.insert(
            Address::derive("b"),
            AccountState {
                staked_balance: 5,
                last_accrual_timestamp: 0,
                settled_reward_amount: 3,
            },
        );

        let snapshot = LedgerSnapshot {
            global: global(15),
            accounts: accounts.clone(),
        };
        assert!(snapshot.is_conserved());

        let broken = LedgerSnapshot {
            global: global(14),
            accounts,
        };
        assert!(!broken.is_conserved());
    }

    #[test]
    fn test_amounts_serialize_as_strings() {
        let account = AccountState {
            staked_balance: u128::MAX,
            last_accrual_timestamp: 7,
            settled_reward_amount: 1,
        };
        let json = serde_json::to_value(&account).expect("serialize");
        assert_eq!(json["staked_balance"], u128::MAX.to_string());
        let back: AccountState = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, account);
    }

    #[test]
    fn test_snapshot_json_round_trip_keeps_accounts() {
        let mut accounts = BTreeMap::new();
        accounts.insert(Address::derive("a"), AccountState::new(42));
        let snapshot = LedgerSnapshot {
            global: global(0),
            accounts,
        };
        let json = serde_json::to_string(&snapshot).expect("serialize");
        let back: LedgerSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, snapshot);
        assert!(back.accounts[&Address::derive("a")].is_empty());
    }
}
