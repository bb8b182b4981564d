//! # harbor-access
//!
//! Single-owner authorization for administrative operations.
//!
//! Access is a capability check against one stored address: the owner for
//! admin calls, or a designated authority (see [`ensure_authority`]) for
//! privileged calls such as reward-token minting.

use harbor_types::Address;
use serde::{Deserialize, Serialize};

/// Error types for access checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Caller is not the stored owner.
    #[error("caller {caller} is not the owner")]
    NotOwner {
        /// The rejected caller.
        caller: Address,
    },

    /// Caller is not the designated authority.
    #[error("caller {caller} is not the authority")]
    NotAuthority {
        /// The rejected caller.
        caller: Address,
    },

    /// The zero address cannot hold ownership or authority.
    #[error("zero address cannot be granted access")]
    ZeroAddress,
}

/// Convenience result type for access checks.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Owner capability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    /// Create an ownership record for `owner`.
    ///
    /// # Errors
    ///
    /// - [`AccessError::ZeroAddress`] if `owner` is the zero address
    pub fn new(owner: Address) -> Result<Self> {
        if owner.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        Ok(Self { owner })
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Fail unless `caller` is the owner.
    pub fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if *caller != self.owner {
            tracing::debug!(%caller, owner = %self.owner, "access: owner check failed");
            return Err(AccessError::NotOwner { caller: *caller });
        }
        Ok(())
    }

    /// Hand ownership to `new_owner`. Returns the previous owner.
    ///
    /// # Errors
    ///
    /// - [`AccessError::NotOwner`] if `caller` is not the owner
    /// - [`AccessError::ZeroAddress`] if `new_owner` is the zero address
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<Address> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        tracing::info!(%previous, %new_owner, "access: ownership transferred");
        Ok(previous)
    }
}

/// Fail unless `caller` is the configured `authority`. An unset authority
/// rejects every caller.
pub fn ensure_authority(authority: Option<&Address>, caller: &Address) -> Result<()> {
    match authority {
        Some(a) if a == caller => Ok(()),
        _ => Err(AccessError::NotAuthority { caller: *caller }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_passes_others_fail() {
        let owner = Address::derive("owner");
        let other = Address::derive("other");
        let access = Ownable::new(owner).expect("new");

        assert!(access.ensure_owner(&owner).is_ok());
        assert_eq!(
            access.ensure_owner(&other),
            Err(AccessError::NotOwner { caller: other })
        );
    }

    #[test]
    fn test_zero_owner_rejected() {
        assert_eq!(Ownable::new(Address::ZERO), Err(AccessError::ZeroAddress));
    }

    #[test]
    fn test_transfer_ownership() {
        let owner = Address::derive("owner");
        let next = Address::derive("next");
        let mut access = Ownable::new(owner).expect("new");

        assert!(access.transfer_ownership(&next, next).is_err());
        let previous = access.transfer_ownership(&owner, next).expect("transfer");
        assert_eq!(previous, owner);
        assert_eq!(access.owner(), next);
        assert!(access.ensure_owner(&owner).is_err());
        assert_eq!(
            access.transfer_ownership(&next, Address::ZERO),
            Err(AccessError::ZeroAddress)
        );
    }

    #[test]
    fn test_authority() {
        let vault = Address::derive("vault");
        let other = Address::derive("other");
        assert!(ensure_authority(Some(&vault), &vault).is_ok());
        assert!(ensure_authority(Some(&vault), &other).is_err());
        assert!(ensure_authority(None, &vault).is_err());
    }
}
