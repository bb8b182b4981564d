//! Base-asset payout boundary.
//!
//! The vault hands principal and skimmed interest back through [`Payout`].
//! [`CashLedger`] is the in-memory implementation used by local nodes and
//! tests; it records what was paid to whom.

use std::collections::BTreeMap;

use harbor_types::{Address, Amount};

/// Error types for base-asset payouts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    /// The payout rail could not be reached.
    #[error("payout unavailable")]
    Unavailable,

    /// The recipient refused the transfer.
    #[error("payout rejected: {0}")]
    Rejected(String),

    /// Recipient balance overflow.
    #[error("payout overflow")]
    Overflow,
}

/// Moves base asset out of the vault.
pub trait Payout {
    /// Send `amount` of base asset to `to`.
    ///
    /// # Errors
    ///
    /// Any [`PayoutError`]; the vault unwinds the enclosing operation.
    fn send(&mut self, to: &Address, amount: Amount) -> Result<(), PayoutError>;
}

/// In-memory record of base asset paid out, with fault injection.
#[derive(Clone, Debug, Default)]
pub struct CashLedger {
    balances: BTreeMap<Address, Amount>,
    total_paid: Amount,
    unavailable: bool,
    reject_next: bool,
}

impl CashLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base asset received by `account` so far.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_paid(&self) -> Amount {
        self.total_paid
    }

    /// Make every send fail until toggled back.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Reject the next send once.
    pub fn reject_next(&mut self) {
        self.reject_next = true;
    }
}

impl Payout for CashLedger {
    fn send(&mut self, to: &Address, amount: Amount) -> Result<(), PayoutError> {
        if self.unavailable {
            tracing::warn!(%to, amount, "cash ledger: send while unavailable");
            return Err(PayoutError::Unavailable);
        }
        if std::mem::take(&mut self.reject_next) {
            tracing::warn!(%to, amount, "cash ledger: injected rejection");
            return Err(PayoutError::Rejected("injected failure".to_string()));
        }
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(PayoutError::Overflow)?;
        let total = self
            .total_paid
            .checked_add(amount)
            .ok_or(PayoutError::Overflow)?;
        self.balances.insert(*to, balance);
        self.total_paid = total;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_records_balance() {
        let mut cash = CashLedger::new();
        let alice = Address::derive("alice");
        cash.send(&alice, 5).expect("send");
        cash.send(&alice, 7).expect("send");
        assert_eq!(cash.balance_of(&alice), 12);
        assert_eq!(cash.total_paid(), 12);
    }

    #[test]
    fn test_reject_next_once() {
        let mut cash = CashLedger::new();
        let alice = Address::derive("alice");
        cash.reject_next();
        assert!(matches!(
            cash.send(&alice, 5),
            Err(PayoutError::Rejected(_))
        ));
        assert_eq!(cash.balance_of(&alice), 0);
        cash.send(&alice, 5).expect("second send succeeds");
    }

    #[test]
    fn test_unavailable() {
        let mut cash = CashLedger::new();
        cash.set_unavailable(true);
        assert_eq!(
            cash.send(&Address::derive("alice"), 1),
            Err(PayoutError::Unavailable)
        );
        cash.set_unavailable(false);
        assert!(cash.send(&Address::derive("alice"), 1).is_ok());
    }
}
