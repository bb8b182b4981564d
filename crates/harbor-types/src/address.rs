//! Account and component addresses.
//!
//! Addresses are 20-byte identifiers. Components (vault, token, market,
//! oracle) get deterministic addresses derived from a label so a node can be
//! redeployed with stable identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{Result, TypesError};

/// Address length in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Domain separation for [`Address::derive`].
const DERIVE_CONTEXT: &str = "Harbor v1 component-address";

/// A 20-byte account or component address, serialized as hex.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address. Never a valid owner, authority, or recipient.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Build an address from raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic address from a human-readable label.
    pub fn derive(label: &str) -> Self {
        let key = blake3::derive_key(DERIVE_CONTEXT, label.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&key[..ADDRESS_LEN]);
        Self(bytes)
    }

    /// Return whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits).map_err(|_| TypesError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = raw
            .try_into()
            .map_err(|_| TypesError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = TypesError;

    fn try_from(raw: &[u8]) -> Result<Self> {
        let bytes: [u8; ADDRESS_LEN] = raw
            .try_into()
            .map_err(|_| TypesError::InvalidAddress(hex::encode(raw)))?;
        Ok(Self(bytes))
    }
}
