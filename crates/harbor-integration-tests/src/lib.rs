//! Integration test crate for Harbor.
//!
//! The scenarios under `tests/` exercise end-to-end vault flows across the
//! workspace crates. This library only holds the deployment fixture they
//! share.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p harbor-integration-tests
//! ```

use harbor_market::{MarketConfig, SimulatedMarket};
use harbor_oracle::FixedPriceOracle;
use harbor_token::{RewardToken, TokenMetadata};
use harbor_types::{Address, Amount, Timestamp};
use harbor_vault::{CashLedger, Vault, VaultConfig, VaultError};

/// Base timestamp for test scenarios.
pub const BASE_TIME: Timestamp = 1_700_000_000;

/// Deterministic address for a named test account.
pub fn account(label: &str) -> Address {
    Address::derive(label)
}

/// A deployed vault with its token, market and payout rail, wired the way a
/// node deploys them.
pub struct Fixture {
    pub owner: Address,
    pub vault: Vault<SimulatedMarket>,
    pub token: RewardToken,
    pub cash: CashLedger,
}

impl Fixture {
    /// Deploy with the default vault parameters.
    ///
    /// # Errors
    ///
    /// Any deployment error.
    pub fn deploy() -> Result<Self, VaultError> {
        Self::deploy_with(|config| config, MarketConfig::default(), None)
    }

    /// Deploy with a customised vault config, market config and optional
    /// price feed.
    ///
    /// # Errors
    ///
    /// Any deployment error.
    pub fn deploy_with(
        config: impl FnOnce(VaultConfig) -> VaultConfig,
        market: MarketConfig,
        oracle: Option<FixedPriceOracle>,
    ) -> Result<Self, VaultError> {
        let owner = account("owner");
        let vault_address = account("vault");
        let token_address = account("reward-token");

        let mut token = RewardToken::new(token_address, owner, TokenMetadata::default())?;
        let market = SimulatedMarket::new(account("market"), vault_address, market, BASE_TIME);
        let vault_config = config(VaultConfig::new(vault_address, owner, token_address));
        let mut vault = Vault::new(vault_config, market)?;
        if let Some(oracle) = oracle {
            vault = vault.with_oracle(Box::new(oracle));
        }
        token.set_vault_authority(&owner, vault_address)?;

        Ok(Self {
            owner,
            vault,
            token,
            cash: CashLedger::new(),
        })
    }

    /// Accrue market interest to `now`, then deposit.
    ///
    /// # Errors
    ///
    /// Any vault error.
    pub fn deposit(&mut self, who: &str, amount: Amount, now: Timestamp) -> Result<(), VaultError> {
        self.vault.market_mut().accrue_to(now)?;
        self.vault.deposit(account(who), amount, now)
    }

    /// Accrue market interest to `now`, then withdraw. Returns the reward paid.
    ///
    /// # Errors
    ///
    /// Any vault error.
    pub fn withdraw(
        &mut self,
        who: &str,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Amount, VaultError> {
        self.vault.market_mut().accrue_to(now)?;
        self.vault
            .withdraw(account(who), amount, now, &mut self.token, &mut self.cash)
    }

    /// Reward tokens held by `who`.
    pub fn reward_balance(&self, who: &str) -> Amount {
        self.token.balance_of(&account(who))
    }

    /// Vault's position in the market.
    ///
    /// # Errors
    ///
    /// Any market error.
    pub fn market_position(&self) -> Result<Amount, VaultError> {
        use harbor_market::LendingMarket;
        Ok(self.vault.market().underlying_balance(&self.vault.address())?)
    }
}
