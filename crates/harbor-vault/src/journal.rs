//! Compensation journal.
//!
//! Each external step a vault operation completes is recorded with its
//! inverse. If a later step fails the journal runs the inverses newest
//! first, then the caller restores its ledger snapshot.

use harbor_market::LendingMarket;
use harbor_token::RewardToken;
use harbor_types::{Address, Amount};

/// Inverse of a completed external step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Compensation {
    /// Principal was redeemed from the market; supply it back.
    Resupply(Amount),
    /// Reward was minted to `account`; burn it.
    Burn {
        /// Recipient of the mint.
        account: Address,
        /// Amount minted.
        amount: Amount,
    },
}

/// Ordered record of completed external steps.
#[derive(Debug, Default)]
pub struct Journal {
    steps: Vec<Compensation>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Compensation] {
        &self.steps
    }

    /// Run every compensation newest first. Failures are logged and the
    /// remaining steps still run. Returns the number of failed steps.
    pub fn unwind<M>(
        self,
        market: &mut M,
        mut token: Option<&mut RewardToken>,
        vault: &Address,
    ) -> usize
    where
        M: LendingMarket + ?Sized,
    {
        let mut failures = 0;
        for step in self.steps.into_iter().rev() {
            let outcome = match &step {
                Compensation::Resupply(amount) => {
                    market.supply(*amount).map_err(|e| e.to_string())
                }
                Compensation::Burn { account, amount } => match token.as_deref_mut() {
                    Some(token) => token
                        .burn(vault, *account, *amount)
                        .map_err(|e| e.to_string()),
                    None => Err("no reward token to burn from".to_string()),
                },
            };
            match outcome {
                Ok(()) => tracing::debug!(?step, "journal: compensated"),
                Err(reason) => {
                    failures += 1;
                    tracing::error!(?step, %reason, "journal: compensation failed");
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_market::{MarketConfig, MarketOp, SimulatedMarket};
    use harbor_token::TokenMetadata;

    fn fixtures() -> (SimulatedMarket, RewardToken, Address) {
        let vault = Address::derive("vault");
        let owner = Address::derive("owner");
        let market = SimulatedMarket::new(
            Address::derive("market"),
            vault,
            MarketConfig::default(),
            0,
        );
        let mut token = RewardToken::new(Address::derive("token"), owner, TokenMetadata::default())
            .expect("deploy");
        token.set_vault_authority(&owner, vault).expect("authority");
        (market, token, vault)
    }

    #[test]
    fn test_unwind_runs_newest_first() {
        let (mut market, mut token, vault) = fixtures();
        let alice = Address::derive("alice");
        market.supply(100).expect("supply");
        market.redeem(40).expect("redeem");
        token.mint(&vault, alice, 3).expect("mint");

        let mut journal = Journal::new();
        journal.record(Compensation::Resupply(40));
        journal.record(Compensation::Burn {
            account: alice,
            amount: 3,
        });
        assert_eq!(journal.unwind(&mut market, Some(&mut token), &vault), 0);

        assert_eq!(market.underlying_balance(&vault).expect("balance"), 100);
        assert_eq!(token.balance_of(&alice), 0);
        assert_eq!(token.total_supply(), 0);
    }

    #[test]
    fn test_unwind_continues_after_failure() {
        let (mut market, mut token, vault) = fixtures();
        let alice = Address::derive("alice");
        token.mint(&vault, alice, 3).expect("mint");
        market.fail_next(MarketOp::Supply);

        let mut journal = Journal::new();
        journal.record(Compensation::Resupply(40));
        journal.record(Compensation::Burn {
            account: alice,
            amount: 3,
        });
        assert_eq!(journal.unwind(&mut market, Some(&mut token), &vault), 1);
        assert_eq!(token.balance_of(&alice), 0);
    }

    #[test]
    fn test_burn_without_token_fails() {
        let (mut market, _, vault) = fixtures();
        let mut journal = Journal::new();
        journal.record(Compensation::Burn {
            account: Address::derive("alice"),
            amount: 1,
        });
        assert_eq!(journal.unwind(&mut market, None, &vault), 1);
    }
}
