//! Vault construction parameters.

use harbor_types::{Address, Amount, AnnualRate, UNIT};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

/// Default minimum stake: 2 whole units.
pub const DEFAULT_MIN_STAKE: Amount = 2 * UNIT;

/// How reward is denominated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualMode {
    /// Reward accrues directly in staked-asset units.
    #[default]
    Flat,
    /// Staked-asset interest is converted at the oracle price read at
    /// settlement time. That price applies to the whole elapsed interval.
    PriceConverted,
}

/// Parameters fixed when the vault is deployed.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// The vault's own address; the reward token's mint authority and the
    /// market supplier.
    pub address: Address,
    /// Initial owner.
    pub owner: Address,
    /// Initial reward token.
    pub reward_token: Address,
    /// Rate applied to staked principal.
    pub annual_rate: AnnualRate,
    /// Smallest non-zero balance an account may hold.
    #[serde_as(as = "DisplayFromStr")]
    pub min_stake: Amount,
    /// Reward denomination.
    #[serde(default)]
    pub accrual: AccrualMode,
}

impl VaultConfig {
    /// A flat-accrual config at 1% per year with [`DEFAULT_MIN_STAKE`].
    pub fn new(address: Address, owner: Address, reward_token: Address) -> Self {
        Self {
            address,
            owner,
            reward_token,
            annual_rate: AnnualRate::from_percent(1),
            min_stake: DEFAULT_MIN_STAKE,
            accrual: AccrualMode::Flat,
        }
    }

    pub fn with_rate(mut self, annual_rate: AnnualRate) -> Self {
        self.annual_rate = annual_rate;
        self
    }

    pub fn with_min_stake(mut self, min_stake: Amount) -> Self {
        self.min_stake = min_stake;
        self
    }

    pub fn with_accrual(mut self, accrual: AccrualMode) -> Self {
        self.accrual = accrual;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::new(
            Address::derive("vault"),
            Address::derive("owner"),
            Address::derive("token"),
        );
        assert_eq!(config.min_stake, 2 * UNIT);
        assert_eq!(config.accrual, AccrualMode::Flat);
        assert_eq!(config.annual_rate, AnnualRate::from_percent(1));
    }

    #[test]
    fn test_accrual_mode_serde() {
        let json = serde_json::to_string(&AccrualMode::PriceConverted).expect("serialize");
        assert_eq!(json, "\"price_converted\"");
        let mode: AccrualMode = serde_json::from_str("\"flat\"").expect("deserialize");
        assert_eq!(mode, AccrualMode::Flat);
    }
}
