use crate::error::{CoreError, Result};
use crate::types::{Amount, PlayerId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Atomic fund custody consumed by the protocol.
///
/// `escrow` moves funds from an account into the shared stake pool;
/// `disburse` pays out of the pool. The caller (the registry) is the
/// serializing executor, so implementations only need per-call atomicity.
pub trait Custody: Send + Sync {
    fn escrow(&self, account: PlayerId, amount: Amount) -> Result<()>;
    fn disburse(&self, account: PlayerId, amount: Amount) -> Result<()>;
    fn balance(&self, account: PlayerId) -> Result<Amount>;
}

#[derive(Debug, Default)]
struct BankInner {
    balances: HashMap<PlayerId, Amount>,
    escrowed: Amount,
}

/// In-memory custody backend.
#[derive(Debug, Default)]
pub struct MemoryBank {
    inner: RwLock<BankInner>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the account if missing, otherwise credits it.
    pub fn open_account(&self, account: PlayerId, initial: Amount) -> Result<()> {
        let mut inner = self.inner.write();
        let balance = inner.balances.entry(account).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(initial)
            .ok_or(CoreError::AmountOverflow)?;
        Ok(())
    }

    /// Total funds currently held in escrow.
    pub fn escrowed(&self) -> Amount {
        self.inner.read().escrowed
    }

    /// Seeds the escrow pool when sessions are restored from storage.
    pub fn restore_escrow(&self, amount: Amount) {
        self.inner.write().escrowed = amount;
    }

    pub fn accounts(&self) -> Vec<(PlayerId, Amount)> {
        self.inner
            .read()
            .balances
            .iter()
            .map(|(id, balance)| (*id, *balance))
            .collect()
    }
}

impl Custody for MemoryBank {
    fn escrow(&self, account: PlayerId, amount: Amount) -> Result<()> {
        let mut inner = self.inner.write();
        let balance = *inner
            .balances
            .get(&account)
            .ok_or(CoreError::AccountNotFound(account))?;
        let remaining = balance
            .checked_sub(amount)
            .ok_or(CoreError::InsufficientFunds {
                need: amount.to_base(),
                available: balance.to_base(),
            })?;
        inner.escrowed = inner
            .escrowed
            .checked_add(amount)
            .ok_or(CoreError::AmountOverflow)?;
        inner.balances.insert(account, remaining);
        tracing::debug!("Escrowed {} from {}", amount, account);
        Ok(())
    }

    fn disburse(&self, account: PlayerId, amount: Amount) -> Result<()> {
        let mut inner = self.inner.write();
        inner.escrowed = inner
            .escrowed
            .checked_sub(amount)
            .ok_or(CoreError::EscrowUnderflow {
                pool: inner.escrowed.to_base(),
                requested: amount.to_base(),
            })?;
        let balance = inner.balances.entry(account).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or(CoreError::AmountOverflow)?;
        tracing::debug!("Disbursed {} to {}", amount, account);
        Ok(())
    }

    fn balance(&self, account: PlayerId) -> Result<Amount> {
        self.inner
            .read()
            .balances
            .get(&account)
            .copied()
            .ok_or(CoreError::AccountNotFound(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_and_disburse() {
        let bank = MemoryBank::new();
        let alice = PlayerId::new_v4();
        let bob = PlayerId::new_v4();
        bank.open_account(alice, Amount::from_base(100)).unwrap();
        bank.open_account(bob, Amount::from_base(0)).unwrap();

        bank.escrow(alice, Amount::from_base(40)).unwrap();
        assert_eq!(bank.balance(alice).unwrap(), Amount::from_base(60));
        assert_eq!(bank.escrowed(), Amount::from_base(40));

        bank.disburse(bob, Amount::from_base(40)).unwrap();
        assert_eq!(bank.balance(bob).unwrap(), Amount::from_base(40));
        assert_eq!(bank.escrowed(), Amount::ZERO);
    }

    #[test]
    fn test_escrow_rejects_overdraft() {
        let bank = MemoryBank::new();
        let alice = PlayerId::new_v4();
        bank.open_account(alice, Amount::from_base(10)).unwrap();

        let err = bank.escrow(alice, Amount::from_base(11)).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
        // balance untouched on failure
        assert_eq!(bank.balance(alice).unwrap(), Amount::from_base(10));
    }

    #[test]
    fn test_disburse_cannot_exceed_pool() {
        let bank = MemoryBank::new();
        let alice = PlayerId::new_v4();
        bank.open_account(alice, Amount::from_base(50)).unwrap();
        bank.escrow(alice, Amount::from_base(50)).unwrap();

        let err = bank.disburse(alice, Amount::from_base(51)).unwrap_err();
        assert!(matches!(err, CoreError::EscrowUnderflow { .. }));
    }

    #[test]
    fn test_unknown_account() {
        let bank = MemoryBank::new();
        let ghost = PlayerId::new_v4();
        assert!(matches!(
            bank.escrow(ghost, Amount::from_base(1)).unwrap_err(),
            CoreError::AccountNotFound(_)
        ));
    }
}
