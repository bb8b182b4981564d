//! Staking ledger with settle-then-mutate accrual.
//!
//! Every balance change is preceded by [`Ledger::settle`], which folds the
//! reward for the interval since the account's checkpoint into its settled
//! total using the balance that was active during that interval.

use std::collections::BTreeMap;

use harbor_oracle::PriceData;
use harbor_types::{AccountState, Address, Amount, GlobalVaultState, LedgerSnapshot, Timestamp};

use crate::accrual;
use crate::{Result, VaultError};

/// Owned vault ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    global: GlobalVaultState,
    accounts: BTreeMap<Address, AccountState>,
}

impl Ledger {
    /// An empty ledger.
    pub fn new(global: GlobalVaultState) -> Self {
        Self {
            global,
            accounts: BTreeMap::new(),
        }
    }

    /// Rebuild a ledger from a snapshot.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidSnapshot`] if the balances do not sum to `total_staked`
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self> {
        if !snapshot.is_conserved() {
            return Err(VaultError::InvalidSnapshot(
                "account balances do not sum to total staked",
            ));
        }
        Ok(Self {
            global: snapshot.global,
            accounts: snapshot.accounts,
        })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            global: self.global.clone(),
            accounts: self.accounts.clone(),
        }
    }

    pub fn global(&self) -> &GlobalVaultState {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut GlobalVaultState {
        &mut self.global
    }

    pub fn account(&self, account: &Address) -> Option<&AccountState> {
        self.accounts.get(account)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &AccountState)> {
        self.accounts.iter()
    }

    pub fn staked_balance(&self, account: &Address) -> Amount {
        self.accounts
            .get(account)
            .map(|a| a.staked_balance)
            .unwrap_or(0)
    }

    /// Seconds since `account`'s checkpoint, or zero for an unknown account.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidTimestamp`] if `now` precedes the checkpoint
    pub fn elapsed(&self, account: &Address, now: Timestamp) -> Result<u64> {
        match self.accounts.get(account) {
            Some(state) => elapsed_since(state, now),
            None => Ok(0),
        }
    }

    /// Return whether settling `account` at `now` would accrue anything.
    pub fn has_pending_interval(&self, account: &Address, now: Timestamp) -> bool {
        self.accounts.get(account).is_some_and(|state| {
            state.staked_balance > 0 && now > state.last_accrual_timestamp
        })
    }

    /// Settled reward plus the pending interval, without mutation.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidTimestamp`] if `now` precedes the checkpoint
    /// - [`VaultError::Arithmetic`] on overflow
    pub fn preview(
        &self,
        account: &Address,
        now: Timestamp,
        price: Option<&PriceData>,
    ) -> Result<Amount> {
        let Some(state) = self.accounts.get(account) else {
            return Ok(0);
        };
        let pending = self.pending(state, now, price)?;
        state
            .settled_reward_amount
            .checked_add(pending)
            .ok_or(VaultError::Arithmetic("settled reward overflow"))
    }

    /// Fold the pending interval into `account`'s settled reward and move its
    /// checkpoint to `now`. Creates the account if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidTimestamp`] if `now` precedes the checkpoint
    /// - [`VaultError::Arithmetic`] on overflow
    pub fn settle(
        &mut self,
        account: Address,
        now: Timestamp,
        price: Option<&PriceData>,
    ) -> Result<&mut AccountState> {
        let pending = match self.accounts.get(&account) {
            Some(state) => self.pending(state, now, price)?,
            None => 0,
        };
        let state = self
            .accounts
            .entry(account)
            .or_insert_with(|| AccountState::new(now));
        state.settled_reward_amount = state
            .settled_reward_amount
            .checked_add(pending)
            .ok_or(VaultError::Arithmetic("settled reward overflow"))?;
        state.last_accrual_timestamp = now;

        tracing::trace!(
            %account,
            pending,
            settled = state.settled_reward_amount,
            "ledger: settled"
        );
        Ok(state)
    }

    /// Add `amount` to `account`'s principal and the total.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Arithmetic`] on overflow
    pub fn credit(&mut self, account: Address, amount: Amount) -> Result<()> {
        let total = self
            .global
            .total_staked
            .checked_add(amount)
            .ok_or(VaultError::Arithmetic("total staked overflow"))?;
        let state = self
            .accounts
            .get_mut(&account)
            .ok_or(VaultError::Arithmetic("credit to unsettled account"))?;
        state.staked_balance = state
            .staked_balance
            .checked_add(amount)
            .ok_or(VaultError::Arithmetic("staked balance overflow"))?;
        self.global.total_staked = total;
        Ok(())
    }

    /// Remove `amount` from `account`'s principal and the total, and take its
    /// settled reward. Returns the reward taken.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Arithmetic`] on underflow
    pub fn debit_and_take_reward(&mut self, account: &Address, amount: Amount) -> Result<Amount> {
        let total = self
            .global
            .total_staked
            .checked_sub(amount)
            .ok_or(VaultError::Arithmetic("total staked underflow"))?;
        let state = self
            .accounts
            .get_mut(account)
            .ok_or(VaultError::Arithmetic("debit from unknown account"))?;
        state.staked_balance = state
            .staked_balance
            .checked_sub(amount)
            .ok_or(VaultError::Arithmetic("staked balance underflow"))?;
        self.global.total_staked = total;
        Ok(std::mem::take(&mut state.settled_reward_amount))
    }

    fn pending(
        &self,
        state: &AccountState,
        now: Timestamp,
        price: Option<&PriceData>,
    ) -> Result<Amount> {
        let elapsed = elapsed_since(state, now)?;
        accrual::reward(state.staked_balance, &self.global.annual_rate, elapsed, price)
    }
}

fn elapsed_since(state: &AccountState, now: Timestamp) -> Result<u64> {
    now.checked_sub(state.last_accrual_timestamp)
        .ok_or(VaultError::InvalidTimestamp {
            now,
            checkpoint: state.last_accrual_timestamp,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_types::{AnnualRate, SECONDS_PER_YEAR, UNIT};

    const T0: Timestamp = 1_700_000_000;

    fn ledger() -> Ledger {
        Ledger::new(GlobalVaultState {
            total_staked: 0,
            reward_token: Address::derive("token"),
            lending_market: Address::derive("market"),
            annual_rate: AnnualRate::from_percent(1),
            price_oracle: None,
        })
    }

    #[test]
    fn test_settle_creates_account() {
        let mut ledger = ledger();
        let alice = Address::derive("alice");
        let state = ledger.settle(alice, T0, None).expect("settle");
        assert_eq!(*state, AccountState::new(T0));
    }

    #[test]
    fn test_settle_uses_prior_balance() {
        let mut ledger = ledger();
        let alice = Address::derive("alice");
        ledger.settle(alice, T0, None).expect("settle");
        ledger.credit(alice, 10 * UNIT).expect("credit");

        let t1 = T0 + SECONDS_PER_YEAR;
        ledger.settle(alice, t1, None).expect("settle");
        ledger.credit(alice, 10 * UNIT).expect("credit");

        let state = ledger.account(&alice).expect("account");
        assert_eq!(state.settled_reward_amount, UNIT / 10);
        assert_eq!(state.last_accrual_timestamp, t1);
        assert_eq!(
            ledger.preview(&alice, t1 + SECONDS_PER_YEAR, None).expect("preview"),
            3 * UNIT / 10
        );
    }

    #[test]
    fn test_settle_twice_same_instant() {
        let mut ledger = ledger();
        let alice = Address::derive("alice");
        ledger.settle(alice, T0, None).expect("settle");
        ledger.credit(alice, 10 * UNIT).expect("credit");
        ledger.settle(alice, T0 + 100, None).expect("settle");
        let once = ledger.account(&alice).expect("account").clone();
        ledger.settle(alice, T0 + 100, None).expect("settle");
        assert_eq!(ledger.account(&alice), Some(&once));
    }

    #[test]
    fn test_settle_rejects_past() {
        let mut ledger = ledger();
        let alice = Address::derive("alice");
        ledger.settle(alice, T0, None).expect("settle");
        let err = ledger.settle(alice, T0 - 1, None).expect_err("past");
        assert_eq!(
            err,
            VaultError::InvalidTimestamp {
                now: T0 - 1,
                checkpoint: T0
            }
        );
    }

    #[test]
    fn test_debit_takes_reward() {
        let mut ledger = ledger();
        let alice = Address::derive("alice");
        ledger.settle(alice, T0, None).expect("settle");
        ledger.credit(alice, 10 * UNIT).expect("credit");
        ledger
            .settle(alice, T0 + SECONDS_PER_YEAR, None)
            .expect("settle");

        let reward = ledger.debit_and_take_reward(&alice, 10 * UNIT).expect("debit");
        assert_eq!(reward, UNIT / 10);
        assert_eq!(ledger.staked_balance(&alice), 0);
        assert_eq!(ledger.global().total_staked, 0);
        assert!(ledger.account(&alice).expect("kept at zero").is_empty());
    }

    #[test]
    fn test_debit_underflow() {
        let mut ledger = ledger();
        let alice = Address::derive("alice");
        ledger.settle(alice, T0, None).expect("settle");
        assert!(matches!(
            ledger.debit_and_take_reward(&alice, 1),
            Err(VaultError::Arithmetic(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut ledger = ledger();
        let alice = Address::derive("alice");
        ledger.settle(alice, T0, None).expect("settle");
        ledger.credit(alice, 3 * UNIT).expect("credit");

        let restored = Ledger::from_snapshot(ledger.snapshot()).expect("restore");
        assert_eq!(restored, ledger);
    }

    #[test]
    fn test_unconserved_snapshot_rejected() {
        let mut snapshot = ledger().snapshot();
        snapshot.global.total_staked = 5;
        assert!(matches!(
            Ledger::from_snapshot(snapshot),
            Err(VaultError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_pending_interval() {
        let mut ledger = ledger();
        let alice = Address::derive("alice");
        assert!(!ledger.has_pending_interval(&alice, T0));
        ledger.settle(alice, T0, None).expect("settle");
        assert!(!ledger.has_pending_interval(&alice, T0 + 10));
        ledger.credit(alice, UNIT).expect("credit");
        assert!(!ledger.has_pending_interval(&alice, T0));
        assert!(ledger.has_pending_interval(&alice, T0 + 10));
    }
}
