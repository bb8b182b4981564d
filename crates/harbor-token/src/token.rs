//! Reward token ledger and authority gating.

use std::collections::BTreeMap;

use harbor_access::{ensure_authority, Ownable};
use harbor_types::{Address, Amount, EventKind, DEFAULT_DECIMALS};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{Result, TokenError};

/// Display metadata for the token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "devUSDC".to_string(),
            symbol: "dUSDC".to_string(),
            decimals: DEFAULT_DECIMALS,
        }
    }
}

/// Durable token state.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub owner: Address,
    pub vault_authority: Option<Address>,
    #[serde_as(as = "DisplayFromStr")]
    pub total_supply: Amount,
    #[serde_as(as = "BTreeMap<_, DisplayFromStr>")]
    pub balances: BTreeMap<Address, Amount>,
}

/// Fungible reward token. Only the vault authority may mint or burn.
#[derive(Clone, Debug)]
pub struct RewardToken {
    address: Address,
    metadata: TokenMetadata,
    access: Ownable,
    vault_authority: Option<Address>,
    balances: BTreeMap<Address, Amount>,
    total_supply: Amount,
    events: Vec<EventKind>,
}

impl RewardToken {
    /// Deploy a token at `address` owned by `owner`. No authority is set, so
    /// minting is impossible until [`set_vault_authority`](Self::set_vault_authority).
    ///
    /// # Errors
    ///
    /// - [`TokenError::AccessDenied`] if `owner` is the zero address
    pub fn new(address: Address, owner: Address, metadata: TokenMetadata) -> Result<Self> {
        Ok(Self {
            address,
            metadata,
            access: Ownable::new(owner)?,
            vault_authority: None,
            balances: BTreeMap::new(),
            total_supply: 0,
            events: Vec::new(),
        })
    }

    /// Rebuild a token from persisted state.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidSnapshot`] if the balances do not sum to the total supply
    /// - [`TokenError::AccessDenied`] if the owner is the zero address
    pub fn restore(
        address: Address,
        metadata: TokenMetadata,
        snapshot: TokenSnapshot,
    ) -> Result<Self> {
        let sum = snapshot
            .balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b));
        if sum != Some(snapshot.total_supply) {
            return Err(TokenError::InvalidSnapshot(
                "balances do not sum to total supply",
            ));
        }
        Ok(Self {
            address,
            metadata,
            access: Ownable::new(snapshot.owner)?,
            vault_authority: snapshot.vault_authority,
            balances: snapshot.balances,
            total_supply: snapshot.total_supply,
            events: Vec::new(),
        })
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        TokenSnapshot {
            owner: self.access.owner(),
            vault_authority: self.vault_authority,
            total_supply: self.total_supply,
            balances: self
                .balances
                .iter()
                .filter(|(_, balance)| **balance > 0)
                .map(|(account, balance)| (*account, *balance))
                .collect(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn vault_authority(&self) -> Option<Address> {
        self.vault_authority
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Designate the single address allowed to mint and burn.
    ///
    /// # Errors
    ///
    /// - [`TokenError::AccessDenied`] if `caller` is not the owner
    pub fn set_vault_authority(&mut self, caller: &Address, authority: Address) -> Result<()> {
        self.access.ensure_owner(caller)?;
        self.vault_authority = Some(authority);
        self.events.push(EventKind::ChangedAuthority {
            new_authority: authority,
        });
        tracing::info!(token = %self.address, %authority, "reward token: vault authority changed");
        Ok(())
    }

    /// Check that `caller` could mint `amount` to `to` right now, without
    /// changing anything.
    pub fn check_mint(&self, caller: &Address, to: &Address, amount: Amount) -> Result<()> {
        ensure_authority(self.vault_authority.as_ref(), caller)?;
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient);
        }
        self.total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        Ok(())
    }

    /// Mint `amount` new tokens to `to`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::AccessDenied`] if `caller` is not the vault authority
    /// - [`TokenError::InvalidRecipient`] if `to` is the zero address
    /// - [`TokenError::Overflow`] if total supply would overflow
    pub fn mint(&mut self, caller: &Address, to: Address, amount: Amount) -> Result<()> {
        self.check_mint(caller, &to, amount)?;
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        // Every balance is bounded by total supply, so this cannot overflow
        // once the supply check passed.
        let balance = self.balance_of(&to).saturating_add(amount);

        self.total_supply = supply;
        self.balances.insert(to, balance);
        self.events.push(EventKind::Transfer {
            from: None,
            to: Some(to),
            amount,
        });
        tracing::debug!(%to, amount, supply, "reward token: minted");
        Ok(())
    }

    /// Burn `amount` tokens held by `from`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::AccessDenied`] if `caller` is not the vault authority
    /// - [`TokenError::InsufficientBalance`] if `from` holds less than `amount`
    pub fn burn(&mut self, caller: &Address, from: Address, amount: Amount) -> Result<()> {
        ensure_authority(self.vault_authority.as_ref(), caller)?;
        let available = self.balance_of(&from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: from,
                requested: amount,
                available,
            })?;

        self.total_supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(TokenError::Overflow)?;
        self.balances.insert(from, remaining);
        self.events.push(EventKind::Transfer {
            from: Some(from),
            to: None,
            amount,
        });
        tracing::debug!(%from, amount, "reward token: burned");
        Ok(())
    }

    /// Move `amount` from `caller` to `to`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidRecipient`] if `to` is the zero address
    /// - [`TokenError::InsufficientBalance`] if `caller` holds less than `amount`
    pub fn transfer(&mut self, caller: &Address, to: Address, amount: Amount) -> Result<()> {
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient);
        }
        let available = self.balance_of(caller);
        let remaining = available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: *caller,
                requested: amount,
                available,
            })?;
        self.balances.insert(*caller, remaining);
        let credited = self.balance_of(&to).saturating_add(amount);
        self.balances.insert(to, credited);
        self.events.push(EventKind::Transfer {
            from: Some(*caller),
            to: Some(to),
            amount,
        });
        Ok(())
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<EventKind> {
        std::mem::take(&mut self.events)
    }
}
