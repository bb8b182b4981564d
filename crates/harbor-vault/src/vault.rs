//! The vault: deposits, withdrawals, accrual queries and owner operations.
//!
//! ## Operation order
//!
//! Every mutating operation validates its inputs, snapshots the ledger,
//! settles the caller, applies its ledger effects and only then calls out to
//! the market, the reward token and the payout rail, in that order. The
//! base-asset payout is always the last external step. Collaborators never
//! receive a reference to the vault, so no external call can re-enter it.

use harbor_access::Ownable;
use harbor_market::LendingMarket;
use harbor_oracle::{OracleError, PriceData, PriceOracle};
use harbor_token::RewardToken;
use harbor_types::{
    AccountState, Address, Amount, AnnualRate, EventKind, GlobalVaultState, LedgerSnapshot,
    Timestamp,
};

use crate::journal::{Compensation, Journal};
use crate::{AccrualMode, AmountViolation, Ledger, Payout, Result, VaultConfig, VaultError};

/// A single-asset, single-market staking vault.
pub struct Vault<M> {
    address: Address,
    access: Ownable,
    min_stake: Amount,
    accrual: AccrualMode,
    ledger: Ledger,
    market: M,
    oracle: Option<Box<dyn PriceOracle + Send>>,
    events: Vec<EventKind>,
}

impl<M: LendingMarket> Vault<M> {
    /// Deploy a vault with an empty ledger in front of `market`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AccessDenied`] if the owner is the zero address
    pub fn new(config: VaultConfig, market: M) -> Result<Self> {
        let global = GlobalVaultState {
            total_staked: 0,
            reward_token: config.reward_token,
            lending_market: market.address(),
            annual_rate: config.annual_rate,
            price_oracle: None,
        };
        let vault = Self::assemble(config, Ledger::new(global), market)?;
        tracing::info!(
            vault = %vault.address,
            owner = %vault.access.owner(),
            market = %vault.ledger.global().lending_market,
            min_stake = vault.min_stake,
            accrual = ?vault.accrual,
            "vault: deployed"
        );
        Ok(vault)
    }

    /// Rebuild a vault from a persisted snapshot. The snapshot's rate and
    /// reward token take precedence over `config`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidSnapshot`] if the snapshot names another market
    ///   or its balances do not add up
    /// - [`VaultError::AccessDenied`] if the owner is the zero address
    pub fn restore(config: VaultConfig, snapshot: LedgerSnapshot, market: M) -> Result<Self> {
        if snapshot.global.lending_market != market.address() {
            return Err(VaultError::InvalidSnapshot("lending market mismatch"));
        }
        let ledger = Ledger::from_snapshot(snapshot)?;
        let vault = Self::assemble(config, ledger, market)?;
        tracing::info!(
            vault = %vault.address,
            accounts = vault.ledger.accounts().count(),
            total_staked = vault.total_staked(),
            "vault: restored"
        );
        Ok(vault)
    }

    fn assemble(config: VaultConfig, ledger: Ledger, market: M) -> Result<Self> {
        Ok(Self {
            address: config.address,
            access: Ownable::new(config.owner)?,
            min_stake: config.min_stake,
            accrual: config.accrual,
            ledger,
            market,
            oracle: None,
            events: Vec::new(),
        })
    }

    /// Install the price feed used by [`AccrualMode::PriceConverted`].
    pub fn with_oracle(mut self, oracle: Box<dyn PriceOracle + Send>) -> Self {
        self.ledger.global_mut().price_oracle = Some(oracle.address());
        self.oracle = Some(oracle);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn min_stake(&self) -> Amount {
        self.min_stake
    }

    pub fn accrual_mode(&self) -> AccrualMode {
        self.accrual
    }

    pub fn annual_rate(&self) -> AnnualRate {
        self.ledger.global().annual_rate
    }

    pub fn reward_token(&self) -> Address {
        self.ledger.global().reward_token
    }

    pub fn lending_market(&self) -> Address {
        self.ledger.global().lending_market
    }

    pub fn market(&self) -> &M {
        &self.market
    }

    pub fn market_mut(&mut self) -> &mut M {
        &mut self.market
    }

    pub fn staked_balance(&self, account: &Address) -> Amount {
        self.ledger.staked_balance(account)
    }

    pub fn total_staked(&self) -> Amount {
        self.ledger.global().total_staked
    }

    pub fn account(&self, account: &Address) -> Option<&AccountState> {
        self.ledger.account(account)
    }

    /// Full copy of the ledger for persistence.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<EventKind> {
        std::mem::take(&mut self.events)
    }

    /// Reward `account` would be paid if it withdrew at `now`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidTimestamp`] if `now` precedes the account checkpoint
    /// - [`VaultError::Oracle`] / [`VaultError::OracleMissing`] in price-converted mode
    /// - [`VaultError::Arithmetic`] on overflow
    pub fn accrued_reward(&self, account: &Address, now: Timestamp) -> Result<Amount> {
        let price = self.price_for(account, now)?;
        self.ledger.preview(account, now, price.as_ref())
    }

    /// Stake `amount` for `caller` and forward it to the market.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidAmount`] for a zero amount or a resulting
    ///   balance below the minimum stake
    /// - [`VaultError::InvalidTimestamp`] if `now` precedes the account checkpoint
    /// - [`VaultError::Market`] if the market rejects the supply
    /// - [`VaultError::Oracle`] / [`VaultError::OracleMissing`] in price-converted mode
    /// - [`VaultError::Arithmetic`] on overflow
    pub fn deposit(&mut self, caller: Address, amount: Amount, now: Timestamp) -> Result<()> {
        if amount == 0 {
            return Err(AmountViolation::Zero.into());
        }
        let resulting = self
            .ledger
            .staked_balance(&caller)
            .checked_add(amount)
            .ok_or(VaultError::Arithmetic("staked balance overflow"))?;
        if resulting < self.min_stake {
            return Err(AmountViolation::BelowMinimumStake {
                resulting,
                minimum: self.min_stake,
            }
            .into());
        }

        let snapshot = self.ledger.clone();
        if let Err(err) = self.apply_deposit(caller, amount, now) {
            tracing::warn!(account = %caller, amount, error = %err, "vault: deposit rolled back");
            self.ledger = snapshot;
            return Err(err);
        }

        self.events.push(EventKind::Deposit {
            account: caller,
            amount,
        });
        tracing::info!(
            account = %caller,
            amount,
            balance = resulting,
            total_staked = self.total_staked(),
            "vault: deposit"
        );
        Ok(())
    }

    fn apply_deposit(&mut self, caller: Address, amount: Amount, now: Timestamp) -> Result<()> {
        let price = self.price_for(&caller, now)?;
        self.ledger.settle(caller, now, price.as_ref())?;
        self.ledger.credit(caller, amount)?;
        self.market.supply(amount)?;
        Ok(())
    }

    /// Return `amount` of principal to `caller`, minting its settled reward.
    /// Returns the reward paid.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidAmount`] for a zero amount, an amount above the
    ///   balance, or a remaining balance strictly between zero and the minimum
    /// - [`VaultError::RewardTokenMismatch`] if `token` is not the configured reward token
    /// - [`VaultError::InvalidTimestamp`] if `now` precedes the account checkpoint
    /// - [`VaultError::Market`], [`VaultError::Token`], [`VaultError::Payout`]
    ///   if an external step fails; earlier steps are compensated
    /// - [`VaultError::Oracle`] / [`VaultError::OracleMissing`] in price-converted mode
    pub fn withdraw<P>(
        &mut self,
        caller: Address,
        amount: Amount,
        now: Timestamp,
        token: &mut RewardToken,
        payout: &mut P,
    ) -> Result<Amount>
    where
        P: Payout + ?Sized,
    {
        if amount == 0 {
            return Err(AmountViolation::Zero.into());
        }
        let available = self.ledger.staked_balance(&caller);
        let remaining = available
            .checked_sub(amount)
            .ok_or(AmountViolation::ExceedsBalance {
                requested: amount,
                available,
            })?;
        if remaining != 0 && remaining < self.min_stake {
            return Err(AmountViolation::BelowMinimumStake {
                resulting: remaining,
                minimum: self.min_stake,
            }
            .into());
        }
        let expected = self.reward_token();
        if token.address() != expected {
            return Err(VaultError::RewardTokenMismatch {
                expected,
                actual: token.address(),
            });
        }

        let snapshot = self.ledger.clone();
        let mut journal = Journal::new();
        let reward = match self.apply_withdraw(caller, amount, now, token, payout, &mut journal) {
            Ok(reward) => reward,
            Err(err) => {
                let failures = journal.unwind(&mut self.market, Some(token), &self.address);
                self.ledger = snapshot;
                tracing::warn!(
                    account = %caller,
                    amount,
                    error = %err,
                    failed_compensations = failures,
                    "vault: withdrawal rolled back"
                );
                return Err(err);
            }
        };

        self.events.push(EventKind::Withdrawal {
            account: caller,
            amount,
            reward_paid: reward,
        });
        tracing::info!(
            account = %caller,
            amount,
            reward,
            balance = remaining,
            total_staked = self.total_staked(),
            "vault: withdrawal"
        );
        Ok(reward)
    }

    fn apply_withdraw<P>(
        &mut self,
        caller: Address,
        amount: Amount,
        now: Timestamp,
        token: &mut RewardToken,
        payout: &mut P,
        journal: &mut Journal,
    ) -> Result<Amount>
    where
        P: Payout + ?Sized,
    {
        let price = self.price_for(&caller, now)?;
        self.ledger.settle(caller, now, price.as_ref())?;
        let reward = self.ledger.debit_and_take_reward(&caller, amount)?;
        if reward > 0 {
            token.check_mint(&self.address, &caller, reward)?;
        }

        self.market.redeem(amount)?;
        journal.record(Compensation::Resupply(amount));

        if reward > 0 {
            token.mint(&self.address, caller, reward)?;
            journal.record(Compensation::Burn {
                account: caller,
                amount: reward,
            });
        }

        payout.send(&caller, amount)?;
        Ok(reward)
    }

    /// Forward accrued protocol-reward tokens from the market to `recipient`.
    /// Returns the amount claimed; zero is a successful no-op.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AccessDenied`] if `caller` is not the owner
    /// - [`VaultError::Market`] if the market rejects the claim
    pub fn claim_external_protocol_reward(
        &mut self,
        caller: &Address,
        recipient: Address,
    ) -> Result<Amount> {
        self.access.ensure_owner(caller)?;
        let claimed = self.market.claim_protocol_reward(&recipient)?;
        if claimed == 0 {
            tracing::debug!(%recipient, "vault: no protocol reward to claim");
            return Ok(0);
        }
        self.events.push(EventKind::ProtocolRewardClaimed {
            recipient,
            amount: claimed,
        });
        tracing::info!(%recipient, amount = claimed, "vault: protocol reward claimed");
        Ok(claimed)
    }

    /// Redeem whatever the market holds above total principal and send it to
    /// `recipient`. Returns the amount skimmed; zero is a successful no-op.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AccessDenied`] if `caller` is not the owner
    /// - [`VaultError::Market`] if the balance query or redeem fails
    /// - [`VaultError::Payout`] if the transfer fails; the surplus is supplied back
    pub fn skim_external_interest<P>(
        &mut self,
        caller: &Address,
        recipient: Address,
        payout: &mut P,
    ) -> Result<Amount>
    where
        P: Payout + ?Sized,
    {
        self.access.ensure_owner(caller)?;
        let underlying = self.market.underlying_balance(&self.address)?;
        let total_staked = self.total_staked();
        let surplus = underlying.saturating_sub(total_staked);
        if surplus == 0 {
            tracing::debug!(underlying, total_staked, "vault: no surplus to skim");
            return Ok(0);
        }

        self.market.redeem(surplus)?;
        if let Err(err) = payout.send(&recipient, surplus) {
            let mut journal = Journal::new();
            journal.record(Compensation::Resupply(surplus));
            let failures = journal.unwind(&mut self.market, None, &self.address);
            tracing::warn!(
                %recipient,
                surplus,
                error = %err,
                failed_compensations = failures,
                "vault: skim rolled back"
            );
            return Err(err.into());
        }

        self.events.push(EventKind::InterestSkimmed {
            recipient,
            amount: surplus,
        });
        tracing::info!(%recipient, amount = surplus, total_staked, "vault: interest skimmed");
        Ok(surplus)
    }

    /// Point the vault at a different reward token.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AccessDenied`] if `caller` is not the owner
    pub fn set_reward_token(&mut self, caller: &Address, reward_token: Address) -> Result<()> {
        self.access.ensure_owner(caller)?;
        self.ledger.global_mut().reward_token = reward_token;
        self.events.push(EventKind::RewardTokenChanged { reward_token });
        tracing::info!(%reward_token, "vault: reward token changed");
        Ok(())
    }

    /// Hand ownership to `new_owner`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AccessDenied`] if `caller` is not the owner or
    ///   `new_owner` is the zero address
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<()> {
        let previous_owner = self.access.transfer_ownership(caller, new_owner)?;
        self.events.push(EventKind::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        tracing::info!(%previous_owner, %new_owner, "vault: ownership transferred");
        Ok(())
    }

    /// Price to settle `account` at `now` with, if any is needed.
    fn price_for(&self, account: &Address, now: Timestamp) -> Result<Option<PriceData>> {
        if self.accrual == AccrualMode::Flat || !self.ledger.has_pending_interval(account, now) {
            return Ok(None);
        }
        let oracle = self.oracle.as_ref().ok_or(VaultError::OracleMissing)?;
        let price = oracle.latest_price()?;
        if price.value == 0 {
            return Err(OracleError::InvalidPrice(price.value).into());
        }
        tracing::trace!(
            %account,
            price = price.value,
            decimals = price.decimals,
            "vault: price read"
        );
        Ok(Some(price))
    }
}
