//! The local Harbor node: one vault, its reward token, a simulated lending
//! market, a settable price feed and the base-asset cash ledger.
//!
//! ## Deployment
//!
//! A fresh node deploys the reward token, then the vault in front of the
//! market, then makes the vault the token's mint authority. Addresses are
//! derived from fixed labels so every node agrees on them.
//!
//! ## Restart
//!
//! The vault ledger and token balances are restored from the database. The
//! simulated market keeps no durable state: it is re-seeded with exactly the
//! total principal, so interest earned before a restart is not carried over.

use std::sync::{Arc, RwLock};

use harbor_db::queries::{events, settings, vault as vault_db};
use harbor_db::DbError;
use harbor_market::{LendingMarket, MarketError, SimulatedMarket};
use harbor_oracle::{FixedPriceOracle, OracleError, PriceData, PriceOracle, StalenessGuard};
use harbor_token::{RewardToken, TokenError, TokenSnapshot};
use harbor_types::{Address, Amount, Event, Timestamp};
use harbor_vault::{CashLedger, Vault, VaultError};
use rusqlite::Connection;

use crate::clock::Clock;
use crate::config::HarborConfig;

/// Error types for node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("persisted state is inconsistent: {0}")]
    Corrupt(String),
}

impl From<TokenError> for NodeError {
    fn from(e: TokenError) -> Self {
        NodeError::Vault(e.into())
    }
}

impl From<MarketError> for NodeError {
    fn from(e: MarketError) -> Self {
        NodeError::Vault(e.into())
    }
}

impl From<OracleError> for NodeError {
    fn from(e: OracleError) -> Self {
        NodeError::Vault(e.into())
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Well-known addresses of a node's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub deployer: Address,
    pub vault: Address,
    pub token: Address,
    pub market: Address,
    pub oracle: Address,
}

impl Deployment {
    pub fn derive() -> Self {
        Self {
            deployer: Address::derive("harbor/deployer"),
            vault: Address::derive("harbor/vault"),
            token: Address::derive("harbor/reward-token"),
            market: Address::derive("harbor/lending-market"),
            oracle: Address::derive("harbor/price-feed"),
        }
    }
}

/// A settable price feed shared between the vault and the RPC layer.
#[derive(Clone)]
pub struct SharedOracle {
    address: Address,
    feed: Arc<RwLock<FixedPriceOracle>>,
}

impl SharedOracle {
    pub fn new(feed: FixedPriceOracle) -> Self {
        Self {
            address: feed.address(),
            feed: Arc::new(RwLock::new(feed)),
        }
    }

    /// Replace the price, keeping the feed's decimals.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidPrice`] for a zero price
    /// - [`OracleError::Unavailable`] if the feed lock is poisoned
    pub fn set_price(&self, value: u128, now: Timestamp) -> harbor_oracle::Result<()> {
        self.feed
            .write()
            .map_err(|_| OracleError::Unavailable("price feed lock poisoned".to_string()))?
            .set_price(value, now)
    }
}

impl PriceOracle for SharedOracle {
    fn address(&self) -> Address {
        self.address
    }

    fn latest_price(&self) -> harbor_oracle::Result<PriceData> {
        self.feed
            .read()
            .map_err(|_| OracleError::Unavailable("price feed lock poisoned".to_string()))?
            .latest_price()
    }
}

/// All components of a running node.
pub struct Harbor {
    deployment: Deployment,
    vault: Vault<SimulatedMarket>,
    token: RewardToken,
    cash: CashLedger,
    oracle: SharedOracle,
}

impl Harbor {
    /// Deploy a fresh node.
    ///
    /// # Errors
    ///
    /// - [`NodeError::Config`] for unusable configuration values
    /// - [`NodeError::Vault`] if a component rejects its construction
    pub fn deploy(config: &HarborConfig, clock: &Clock) -> Result<Self> {
        let now = clock();
        let deployment = Deployment::derive();
        let vault_config = config
            .vault_config(deployment.vault, deployment.deployer, deployment.token)
            .map_err(NodeError::Config)?;

        let mut token =
            RewardToken::new(deployment.token, deployment.deployer, config.token_metadata())?;
        let market = SimulatedMarket::new(
            deployment.market,
            deployment.vault,
            config.market_config(),
            now,
        );
        let oracle = Self::price_feed(config, &deployment, now)?;
        let vault = Vault::new(vault_config, market)
            .map_err(NodeError::Vault)?
            .with_oracle(Self::guarded(config, &oracle, clock));
        token.set_vault_authority(&deployment.deployer, deployment.vault)?;

        tracing::info!(
            vault = %deployment.vault,
            token = %deployment.token,
            market = %deployment.market,
            oracle = %deployment.oracle,
            "node: deployed"
        );
        Ok(Self {
            deployment,
            vault,
            token,
            cash: CashLedger::new(),
            oracle,
        })
    }

    /// Restore the node saved in `conn`, or deploy and save a fresh one.
    ///
    /// # Errors
    ///
    /// - [`NodeError::Corrupt`] if the saved vault and token disagree
    /// - [`NodeError::Db`] on database failure
    /// - any error from [`deploy`](Self::deploy)
    pub fn load_or_deploy(config: &HarborConfig, conn: &Connection, clock: &Clock) -> Result<Self> {
        let Some(record) = vault_db::load(conn)? else {
            let mut node = Self::deploy(config, clock)?;
            node.persist(conn, clock())?;
            return Ok(node);
        };
        let token: TokenSnapshot = settings::get_json(conn, settings::REWARD_TOKEN_KEY)?
            .ok_or_else(|| NodeError::Corrupt("vault saved without reward token".to_string()))?;
        Self::restore(config, record, token, clock)
    }

    /// Rebuild a node from saved state.
    ///
    /// # Errors
    ///
    /// - [`NodeError::Corrupt`] if the record belongs to another deployment
    /// - [`NodeError::Vault`] if the snapshot or token state is inconsistent
    pub fn restore(
        config: &HarborConfig,
        record: vault_db::VaultRecord,
        token: TokenSnapshot,
        clock: &Clock,
    ) -> Result<Self> {
        let now = clock();
        let deployment = Deployment::derive();
        if record.vault_address != deployment.vault {
            return Err(NodeError::Corrupt(format!(
                "saved vault {} is not this node's vault {}",
                record.vault_address, deployment.vault
            )));
        }

        let total_staked = record.snapshot.global.total_staked;
        let mut market = SimulatedMarket::new(
            deployment.market,
            deployment.vault,
            config.market_config(),
            now,
        );
        if total_staked > 0 {
            market.supply(total_staked)?;
        }

        let mut vault_config = config
            .vault_config(deployment.vault, deployment.deployer, deployment.token)
            .map_err(NodeError::Config)?;
        vault_config.owner = record.owner;

        let oracle = Self::price_feed(config, &deployment, now)?;
        let vault = Vault::restore(vault_config, record.snapshot, market)?
            .with_oracle(Self::guarded(config, &oracle, clock));
        let token = RewardToken::restore(deployment.token, config.token_metadata(), token)?;

        tracing::info!(
            vault = %deployment.vault,
            total_staked,
            saved_at = record.updated_at,
            "node: restored, market re-seeded with principal"
        );
        Ok(Self {
            deployment,
            vault,
            token,
            cash: CashLedger::new(),
            oracle,
        })
    }

    fn price_feed(
        config: &HarborConfig,
        deployment: &Deployment,
        now: Timestamp,
    ) -> Result<SharedOracle> {
        let price = config.initial_price().map_err(NodeError::Config)?;
        let feed = FixedPriceOracle::new(deployment.oracle, price, config.oracle.decimals, now)?;
        Ok(SharedOracle::new(feed))
    }

    fn guarded(
        config: &HarborConfig,
        oracle: &SharedOracle,
        clock: &Clock,
    ) -> Box<dyn PriceOracle + Send> {
        let clock = clock.clone();
        Box::new(StalenessGuard::with_threshold(
            oracle.clone(),
            move || clock(),
            config.oracle.staleness_secs,
        ))
    }

    /// Save the vault and token, and append every pending event, in one
    /// transaction. Returns the appended events.
    ///
    /// # Errors
    ///
    /// - [`NodeError::Db`] on database failure
    pub fn persist(&mut self, conn: &Connection, now: Timestamp) -> Result<Vec<Event>> {
        let tx = conn.unchecked_transaction().map_err(DbError::from)?;
        vault_db::write(
            &tx,
            &vault_db::VaultRecord {
                vault_address: self.vault.address(),
                owner: self.vault.owner(),
                snapshot: self.vault.snapshot(),
                updated_at: now,
            },
        )?;
        settings::set_json(&tx, settings::REWARD_TOKEN_KEY, &self.token.snapshot())?;

        let pending: Vec<Event> = self
            .vault
            .drain_events()
            .into_iter()
            .chain(self.token.drain_events())
            .map(|kind| Event {
                timestamp: now,
                kind,
            })
            .collect();
        for event in &pending {
            events::append(&tx, event)?;
        }
        tx.commit().map_err(DbError::from)?;
        Ok(pending)
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn vault(&self) -> &Vault<SimulatedMarket> {
        &self.vault
    }

    pub fn token(&self) -> &RewardToken {
        &self.token
    }

    pub fn cash(&self) -> &CashLedger {
        &self.cash
    }

    /// Bring the market's interest up to `now`.
    ///
    /// # Errors
    ///
    /// - [`NodeError::Vault`] on market overflow
    pub fn accrue(&mut self, now: Timestamp) -> Result<()> {
        self.vault.market_mut().accrue_to(now)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any [`VaultError`] from the deposit.
    pub fn deposit(&mut self, caller: Address, amount: Amount, now: Timestamp) -> Result<()> {
        self.accrue(now)?;
        self.vault.deposit(caller, amount, now)?;
        Ok(())
    }

    /// Withdraw principal and pay reward. Returns the reward minted.
    ///
    /// # Errors
    ///
    /// Any [`VaultError`] from the withdrawal.
    pub fn withdraw(&mut self, caller: Address, amount: Amount, now: Timestamp) -> Result<Amount> {
        self.accrue(now)?;
        let reward = self
            .vault
            .withdraw(caller, amount, now, &mut self.token, &mut self.cash)?;
        Ok(reward)
    }

    /// # Errors
    ///
    /// Any [`VaultError`] from the claim.
    pub fn claim_external_protocol_reward(
        &mut self,
        caller: &Address,
        recipient: Address,
        now: Timestamp,
    ) -> Result<Amount> {
        self.accrue(now)?;
        Ok(self.vault.claim_external_protocol_reward(caller, recipient)?)
    }

    /// # Errors
    ///
    /// Any [`VaultError`] from the skim.
    pub fn skim_external_interest(
        &mut self,
        caller: &Address,
        recipient: Address,
        now: Timestamp,
    ) -> Result<Amount> {
        self.accrue(now)?;
        Ok(self
            .vault
            .skim_external_interest(caller, recipient, &mut self.cash)?)
    }

    /// # Errors
    ///
    /// - [`NodeError::Vault`] if `caller` is not the vault owner
    pub fn set_reward_token(&mut self, caller: &Address, reward_token: Address) -> Result<()> {
        self.vault.set_reward_token(caller, reward_token)?;
        Ok(())
    }

    /// # Errors
    ///
    /// - [`NodeError::Vault`] if `caller` is not the token owner
    pub fn set_vault_authority(&mut self, caller: &Address, authority: Address) -> Result<()> {
        self.token.set_vault_authority(caller, authority)?;
        Ok(())
    }

    /// # Errors
    ///
    /// - [`NodeError::Vault`] if `caller` is not the vault owner
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<()> {
        self.vault.transfer_ownership(caller, new_owner)?;
        Ok(())
    }

    /// Set the feed price (development only). `value` is scaled by the
    /// feed decimals.
    ///
    /// # Errors
    ///
    /// - [`NodeError::Vault`] for a zero price
    pub fn set_price(&mut self, value: u128, now: Timestamp) -> Result<()> {
        self.oracle.set_price(value, now)?;
        Ok(())
    }

    /// Current feed reading, bypassing the staleness guard.
    ///
    /// # Errors
    ///
    /// - [`NodeError::Vault`] if the feed is unavailable
    pub fn price(&self) -> Result<PriceData> {
        Ok(self.oracle.latest_price()?)
    }
}
