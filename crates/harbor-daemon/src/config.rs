//! Configuration file management.
//!
//! `config.toml` lives in the data directory. Every section and field is
//! optional; missing values fall back to the defaults below.

use std::path::PathBuf;

use harbor_market::MarketConfig;
use harbor_token::TokenMetadata;
use harbor_types::{parse_units, Address, AnnualRate, DEFAULT_DECIMALS};
use harbor_vault::{AccrualMode, VaultConfig};
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarborConfig {
    /// Vault parameters.
    #[serde(default)]
    pub vault: VaultSection,
    /// Simulated lending market parameters.
    #[serde(default)]
    pub market: MarketSection,
    /// Price feed parameters.
    #[serde(default)]
    pub oracle: OracleSection,
    /// Reward token metadata.
    #[serde(default)]
    pub token: TokenSection,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageSection,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedSection,
}

/// Vault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSection {
    /// Reward rate in basis points per year.
    #[serde(default = "default_annual_rate_bps")]
    pub annual_rate_bps: u64,
    /// Minimum stake in whole units, e.g. "2" or "0.5".
    #[serde(default = "default_min_stake")]
    pub min_stake: String,
    /// "flat" | "price_converted".
    #[serde(default)]
    pub accrual: AccrualMode,
    /// Owner address. Empty = the deployer.
    #[serde(default)]
    pub owner: String,
}

/// Lending market configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSection {
    /// Supply interest in basis points per year.
    #[serde(default = "default_supply_apr_bps")]
    pub supply_apr_bps: u64,
    /// Protocol-reward tokens per unit supplied per year, in basis points.
    #[serde(default = "default_protocol_reward_per_year")]
    pub protocol_reward_per_year: u64,
}

/// Price feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSection {
    /// Initial price in whole quote units, e.g. "100".
    #[serde(default = "default_price")]
    pub price: String,
    /// Feed decimals.
    #[serde(default = "default_price_decimals")]
    pub decimals: u8,
    /// Prices older than this many seconds are rejected.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
}

/// Token metadata configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSection {
    #[serde(default = "default_token_name")]
    pub name: String,
    #[serde(default = "default_token_symbol")]
    pub symbol: String,
}

/// Where state lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Overrides `$HARBOR_DATA_DIR` and the per-user default.
    #[serde(default)]
    pub data_dir: String,
}

/// Daemon tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedSection {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_annual_rate_bps() -> u64 {
    100
}

fn default_min_stake() -> String {
    "2".to_string()
}

fn default_supply_apr_bps() -> u64 {
    250
}

fn default_protocol_reward_per_year() -> u64 {
    10
}

fn default_price() -> String {
    "100".to_string()
}

fn default_price_decimals() -> u8 {
    harbor_oracle::fixed::DEFAULT_DECIMALS
}

fn default_staleness_secs() -> u64 {
    harbor_oracle::STALENESS_THRESHOLD
}

fn default_token_name() -> String {
    TokenMetadata::default().name
}

fn default_token_symbol() -> String {
    TokenMetadata::default().symbol
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            annual_rate_bps: default_annual_rate_bps(),
            min_stake: default_min_stake(),
            accrual: AccrualMode::default(),
            owner: String::new(),
        }
    }
}

impl Default for MarketSection {
    fn default() -> Self {
        Self {
            supply_apr_bps: default_supply_apr_bps(),
            protocol_reward_per_year: default_protocol_reward_per_year(),
        }
    }
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            price: default_price(),
            decimals: default_price_decimals(),
            staleness_secs: default_staleness_secs(),
        }
    }
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            name: default_token_name(),
            symbol: default_token_symbol(),
        }
    }
}

impl Default for AdvancedSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl HarborConfig {
    /// Read `config.toml` from the data directory, or use defaults if there
    /// is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        let path = resolve_data_dir(None).join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Where the database, socket and config live.
    pub fn data_dir(&self) -> PathBuf {
        resolve_data_dir(Some(self.storage.data_dir.as_str()).filter(|d| !d.is_empty()))
    }

    /// Vault construction parameters for the given deployment addresses.
    ///
    /// # Errors
    ///
    /// Returns a description of the offending field.
    pub fn vault_config(
        &self,
        vault: Address,
        deployer: Address,
        reward_token: Address,
    ) -> Result<VaultConfig, String> {
        let owner = if self.vault.owner.is_empty() {
            deployer
        } else {
            self.vault
                .owner
                .parse()
                .map_err(|e| format!("vault.owner: {e}"))?
        };
        let min_stake = parse_units(&self.vault.min_stake, DEFAULT_DECIMALS)
            .map_err(|e| format!("vault.min_stake: {e}"))?;
        Ok(VaultConfig::new(vault, owner, reward_token)
            .with_rate(AnnualRate::from_bps(self.vault.annual_rate_bps))
            .with_min_stake(min_stake)
            .with_accrual(self.vault.accrual))
    }

    /// Simulated market parameters.
    pub fn market_config(&self) -> MarketConfig {
        MarketConfig {
            supply_apr: AnnualRate::from_bps(self.market.supply_apr_bps),
            protocol_reward_rate: AnnualRate::from_bps(self.market.protocol_reward_per_year),
            ..MarketConfig::default()
        }
    }

    /// Reward token metadata.
    pub fn token_metadata(&self) -> TokenMetadata {
        TokenMetadata {
            name: self.token.name.clone(),
            symbol: self.token.symbol.clone(),
            decimals: DEFAULT_DECIMALS,
        }
    }

    /// Initial feed price scaled by the feed decimals.
    ///
    /// # Errors
    ///
    /// Returns a description of the offending field.
    pub fn initial_price(&self) -> Result<u128, String> {
        parse_units(&self.oracle.price, self.oracle.decimals)
            .map_err(|e| format!("oracle.price: {e}"))
    }
}

/// Name of the config file inside the data directory.
const CONFIG_FILE: &str = "config.toml";

/// `configured`, else `$HARBOR_DATA_DIR`, else a per-user default.
fn resolve_data_dir(configured: Option<&str>) -> PathBuf {
    if let Some(dir) = configured {
        return PathBuf::from(dir);
    }
    if let Some(dir) = std::env::var_os("HARBOR_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let subdir = if cfg!(target_os = "macos") {
        "Library/Application Support/Harbor"
    } else {
        ".harbor"
    };
    home.map_or_else(|| std::env::temp_dir().join("harbor"), |h| h.join(subdir))
}
