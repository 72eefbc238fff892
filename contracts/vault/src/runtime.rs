//! Transaction Runtime
//!
//! Pairs a vault with the ledger it lives on and runs each operation as one
//! transaction: the operation works on a copy of both, and the copy replaces
//! the live state only if the operation succeeds. A failed operation leaves
//! balances, fees, hooks and events exactly as they were.

use warden_common::{
    errors::WardenResult,
    ledger::Ledger,
    types::{Address, AssetValue, Operation},
};
use warden_hooks::{Hooks, VaultHooks};

use crate::Vault;

/// A vault deployed on a ledger
#[derive(Debug, Clone)]
pub struct Chain<H: VaultHooks = Hooks> {
    pub ledger: Ledger,
    pub vault: Vault<H>,
}

impl<H: VaultHooks> Chain<H> {
    pub fn new(ledger: Ledger, vault: Vault<H>) -> Self {
        Self { ledger, vault }
    }

    /// Run `f` atomically against the vault and the ledger
    pub fn transact<T, F>(&mut self, f: F) -> WardenResult<T>
    where
        F: FnOnce(&mut Vault<H>, &mut Ledger) -> WardenResult<T>,
    {
        let mut vault = self.vault.clone();
        let mut ledger = self.ledger.clone();

        let output = f(&mut vault, &mut ledger)?;

        self.vault = vault;
        self.ledger = ledger;
        Ok(output)
    }

    /// Move block time forward
    pub fn advance(&mut self, seconds: u64) {
        self.ledger.advance(seconds);
    }

    pub fn timestamp(&self) -> u64 {
        self.ledger.timestamp()
    }

    // ============ Transactions ============

    pub fn deposit(&mut self, caller: Address, amounts: &[AssetValue]) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.deposit(ledger, caller, amounts))
    }

    pub fn withdraw(&mut self, caller: Address, amounts: &[AssetValue]) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.withdraw(ledger, caller, amounts))
    }

    pub fn set_guardian_and_fee_recipient(
        &mut self,
        caller: Address,
        guardian: Address,
        fee_recipient: Address,
    ) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.set_guardian_and_fee_recipient(ledger, caller, guardian, fee_recipient))
    }

    pub fn set_hooks(&mut self, caller: Address, hooks: H) -> WardenResult<H> {
        self.transact(|vault, ledger| vault.set_hooks(ledger, caller, hooks))
    }

    pub fn execute(&mut self, caller: Address, operation: &Operation) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.execute(ledger, caller, operation))
    }

    pub fn submit(&mut self, caller: Address, operations: &[Operation]) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.submit(ledger, caller, operations))
    }

    pub fn finalize(&mut self, caller: Address) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.finalize(ledger, caller))
    }

    pub fn pause(&mut self, caller: Address) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.pause(ledger, caller))
    }

    pub fn resume(&mut self, caller: Address) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.resume(ledger, caller))
    }

    pub fn claim(&mut self, caller: Address) -> WardenResult<()> {
        self.transact(|vault, ledger| vault.claim(ledger, caller))
    }

    // ============ Views ============

    pub fn holdings(&self) -> Vec<AssetValue> {
        self.vault.holdings(&self.ledger)
    }

    pub fn value(&self) -> WardenResult<u128> {
        self.vault.value(&self.ledger)
    }
}
