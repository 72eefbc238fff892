//! Warden Vault - Guarded Custody
//!
//! A vault holds assets for an **owner** and lets a **guardian** move them
//! only through allowlisted calls, under a rolling daily bound on value loss.
//! A **fee recipient** earns a time-weighted management fee in the fee token.
//!
//! ## Core Operations
//!
//! - **Deposit / Withdraw**: owner moves registered assets in and out
//! - **Submit**: guardian runs a batch of allowlisted calls
//! - **Execute**: owner runs any single call (escape hatch, also after finalization)
//! - **Pause / Resume**: stop guardian activity and fee accrual
//! - **Finalize**: return everything to the owner, permanently
//! - **Claim**: fee recipients collect reserved fees
//!
//! Every mutating entry point first charges fees for the time elapsed since
//! the last checkpoint. Hooks run around deposits, withdrawals, submissions
//! and finalization.
//!
//! Entry points mutate the vault and the ledger in place. Wrap them in
//! [`Chain::transact`] to get all-or-nothing semantics.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub mod fees;
pub mod guard;
pub mod runtime;
pub mod valuation;

#[cfg(test)]
mod integration_tests;

pub use fees::FeeLedger;
pub use guard::ReentrancyGuard;
pub use runtime::Chain;
pub use valuation::{Snapshot, Valuation};
pub use warden_asset_registry::{AssetRegistry, RegistryParameters};
pub use warden_hooks::{Hooks, HooksParameters, VaultHooks, VaultView};

use warden_common::{
    abi::{self, selectors},
    constants::{fees::MAX_FEE, ZERO_ADDRESS},
    errors::{WardenError, WardenResult},
    events::{operations_digest, EventLog, WardenEvent},
    ledger::Ledger,
    types::{Address, AssetValue, Operation},
};

// ============ Parameters ============

/// Deployment parameters of a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultParameters {
    /// Address the vault is deployed at
    pub address: Address,
    pub owner: Address,
    pub guardian: Address,
    pub fee_recipient: Address,
    /// Fee per second, 18 decimals
    pub fee: u128,
}

// ============ Vault State ============

/// Roles, lifecycle flags and fee accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultState {
    pub owner: Address,
    pub guardian: Address,
    pub fee_recipient: Address,
    /// Terminal once set
    pub finalized: bool,
    pub paused: bool,
    pub fees: FeeLedger,
}

/// Guarded vault, generic over its hooks
#[derive(Debug, Clone)]
pub struct Vault<H: VaultHooks = Hooks> {
    address: Address,
    state: VaultState,
    registry: AssetRegistry,
    hooks: H,
    guard: ReentrancyGuard,
    events: EventLog,
}

fn check_roles(owner: Address, guardian: Address, fee_recipient: Address) -> WardenResult<()> {
    if guardian == ZERO_ADDRESS {
        return Err(WardenError::ZeroAddress { param: "guardian" });
    }
    if fee_recipient == ZERO_ADDRESS {
        return Err(WardenError::ZeroAddress { param: "fee_recipient" });
    }
    if guardian == owner {
        return Err(WardenError::GuardianIsOwner);
    }
    if fee_recipient == owner {
        return Err(WardenError::FeeRecipientIsOwner);
    }
    Ok(())
}

impl<H: VaultHooks> Vault<H> {
    /// Validate parameters and bind the registry and hooks
    pub fn new(
        params: VaultParameters,
        registry: AssetRegistry,
        hooks: H,
        ledger: &Ledger,
    ) -> WardenResult<Self> {
        // 1. Roles
        if params.address == ZERO_ADDRESS {
            return Err(WardenError::ZeroAddress { param: "vault" });
        }
        if params.owner == ZERO_ADDRESS {
            return Err(WardenError::ZeroAddress { param: "owner" });
        }
        check_roles(params.owner, params.guardian, params.fee_recipient)?;

        // 2. Fee cap
        if params.fee > MAX_FEE {
            return Err(WardenError::FeeIsAboveMax {
                actual: params.fee,
                max: MAX_FEE,
            });
        }

        // 3. Components must be bound to this vault
        if registry.vault() != params.address {
            return Err(WardenError::VaultMismatch {
                expected: params.address,
                actual: Some(registry.vault()),
            });
        }
        if hooks.vault() != Some(params.address) {
            return Err(WardenError::VaultMismatch {
                expected: params.address,
                actual: hooks.vault(),
            });
        }

        let mut events = EventLog::new();
        events.emit(WardenEvent::VaultCreated {
            vault: params.address,
            owner: params.owner,
            guardian: params.guardian,
            fee_recipient: params.fee_recipient,
            fee: params.fee,
            timestamp: ledger.timestamp(),
        });

        Ok(Self {
            address: params.address,
            state: VaultState {
                owner: params.owner,
                guardian: params.guardian,
                fee_recipient: params.fee_recipient,
                finalized: false,
                paused: false,
                fees: FeeLedger::new(params.fee, ledger.timestamp()),
            },
            registry,
            hooks,
            guard: ReentrancyGuard::default(),
            events,
        })
    }

    // ============ Queries ============

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.state.owner
    }

    pub fn guardian(&self) -> Address {
        self.state.guardian
    }

    pub fn fee_recipient(&self) -> Address {
        self.state.fee_recipient
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn is_finalized(&self) -> bool {
        self.state.finalized
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    /// Unclaimed fees of `recipient`
    pub fn fees(&self, recipient: Address) -> u128 {
        self.state.fees.fees_of(recipient)
    }

    pub fn fee_total(&self) -> u128 {
        self.state.fees.fee_total
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Registry administration (checked against the registry owner)
    pub fn registry_mut(&mut self) -> &mut AssetRegistry {
        &mut self.registry
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Hooks administration (checked against the hooks owner)
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Balances of every registered asset, net of reserved fees
    pub fn holdings(&self, ledger: &Ledger) -> Vec<AssetValue> {
        valuation::holdings(ledger, &self.registry, self.address, self.state.fees.fee_total)
    }

    /// Current value in numeraire units. Fails on any price error.
    pub fn value(&self, ledger: &Ledger) -> WardenResult<u128> {
        let holdings = self.holdings(ledger);
        valuation::value(ledger, &self.registry, &holdings).map(|v| v.value)
    }

    // ============ Owner Operations ============

    /// Pull `amounts` from the owner. Assets must be strictly ascending.
    pub fn deposit(&mut self, ledger: &mut Ledger, caller: Address, amounts: &[AssetValue]) -> WardenResult<()> {
        self.non_reentrant(|vault| vault.deposit_inner(ledger, caller, amounts))
    }

    fn deposit_inner(&mut self, ledger: &mut Ledger, caller: Address, amounts: &[AssetValue]) -> WardenResult<()> {
        self.only_owner(caller)?;
        self.when_not_finalized()?;
        self.reserve_fees(ledger)?;
        self.check_amounts(amounts)?;

        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.before_deposit(self.address, &view, amounts)?;

        for amount in amounts {
            ledger.transfer_from(amount.asset, self.address, self.state.owner, self.address, amount.value)?;
        }

        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.after_deposit(self.address, &view, amounts)?;

        self.events.emit(WardenEvent::Deposited {
            owner: caller,
            amounts: amounts.to_vec(),
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    /// Send `amounts` to the owner. Reserved fee tokens cannot be withdrawn.
    pub fn withdraw(&mut self, ledger: &mut Ledger, caller: Address, amounts: &[AssetValue]) -> WardenResult<()> {
        self.non_reentrant(|vault| vault.withdraw_inner(ledger, caller, amounts))
    }

    fn withdraw_inner(&mut self, ledger: &mut Ledger, caller: Address, amounts: &[AssetValue]) -> WardenResult<()> {
        self.only_owner(caller)?;
        self.when_not_finalized()?;
        self.reserve_fees(ledger)?;
        self.check_amounts(amounts)?;

        let fee_token = self.registry.fee_token();
        for amount in amounts {
            let mut available = ledger.balance_of(amount.asset, self.address);
            if amount.asset == fee_token {
                available = available.saturating_sub(self.state.fees.fee_total);
            }
            if amount.value > available {
                return Err(WardenError::AmountExceedsAvailable {
                    asset: amount.asset,
                    amount: amount.value,
                    available,
                });
            }
        }

        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.before_withdraw(self.address, &view, amounts)?;

        for amount in amounts {
            ledger.transfer(amount.asset, self.address, self.state.owner, amount.value)?;
        }

        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.after_withdraw(self.address, &view, amounts)?;

        self.events.emit(WardenEvent::Withdrawn {
            owner: caller,
            amounts: amounts.to_vec(),
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    /// Replace the guardian and fee recipient. Fees are charged to the old recipient first.
    pub fn set_guardian_and_fee_recipient(
        &mut self,
        ledger: &Ledger,
        caller: Address,
        guardian: Address,
        fee_recipient: Address,
    ) -> WardenResult<()> {
        self.only_owner(caller)?;
        self.when_not_finalized()?;
        check_roles(self.state.owner, guardian, fee_recipient)?;

        self.reserve_fees(ledger)?;

        self.state.guardian = guardian;
        self.state.fee_recipient = fee_recipient;

        self.events.emit(WardenEvent::GuardianAndFeeRecipientSet {
            guardian,
            fee_recipient,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    /// Swap in new hooks. The old hooks are decommissioned and handed back.
    pub fn set_hooks(&mut self, ledger: &Ledger, caller: Address, hooks: H) -> WardenResult<H> {
        self.only_owner(caller)?;
        self.when_not_finalized()?;

        if hooks.vault() != Some(self.address) {
            return Err(WardenError::VaultMismatch {
                expected: self.address,
                actual: hooks.vault(),
            });
        }
        if hooks.address() == self.hooks.address() {
            return Err(WardenError::HooksAlreadySet { hooks: hooks.address() });
        }

        self.reserve_fees(ledger)?;

        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.decommission(self.address, &view)?;

        let old = std::mem::replace(&mut self.hooks, hooks);

        self.events.emit(WardenEvent::HooksSet {
            old_hooks: old.address(),
            new_hooks: self.hooks.address(),
            timestamp: ledger.timestamp(),
        });

        Ok(old)
    }

    /// Run one arbitrary call as the vault. Allowed after finalization.
    pub fn execute(&mut self, ledger: &mut Ledger, caller: Address, operation: &Operation) -> WardenResult<()> {
        self.non_reentrant(|vault| vault.execute_inner(ledger, caller, operation))
    }

    fn execute_inner(&mut self, ledger: &mut Ledger, caller: Address, operation: &Operation) -> WardenResult<()> {
        self.only_owner(caller)?;
        self.check_target(operation.target)?;
        self.reserve_fees(ledger)?;

        let fee_token = self.registry.fee_token();
        let balance_before = ledger.balance_of(fee_token, self.address);

        ledger
            .call(self.address, operation.target, operation.value, &operation.data)
            .map_err(|revert| WardenError::ExecutionFailed { revert })?;

        self.state
            .fees
            .check_reserved(balance_before, ledger.balance_of(fee_token, self.address))?;

        self.events.emit(WardenEvent::Executed {
            owner: caller,
            target: operation.target,
            value: operation.value,
            selector: operation.selector(),
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    /// Mark the vault finalized and return every non-reserved holding to the owner
    pub fn finalize(&mut self, ledger: &mut Ledger, caller: Address) -> WardenResult<()> {
        self.non_reentrant(|vault| vault.finalize_inner(ledger, caller))
    }

    fn finalize_inner(&mut self, ledger: &mut Ledger, caller: Address) -> WardenResult<()> {
        self.only_owner(caller)?;
        self.when_not_finalized()?;
        self.reserve_fees(ledger)?;

        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.before_finalize(self.address, &view)?;

        self.state.finalized = true;

        let withdrawn: Vec<AssetValue> = self
            .holdings(ledger)
            .into_iter()
            .filter(|holding| holding.value > 0)
            .collect();
        for holding in &withdrawn {
            ledger.transfer(holding.asset, self.address, self.state.owner, holding.value)?;
        }

        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.after_finalize(self.address, &view)?;

        self.events.emit(WardenEvent::Finalized {
            owner: caller,
            withdrawn,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    /// Stop guardian submissions and fee accrual
    pub fn pause(&mut self, ledger: &Ledger, caller: Address) -> WardenResult<()> {
        self.only_owner_or_guardian(caller)?;
        self.when_not_finalized()?;
        if self.state.paused {
            return Err(WardenError::VaultIsPaused);
        }

        self.reserve_fees(ledger)?;
        self.state.paused = true;

        self.events.emit(WardenEvent::Paused {
            by: caller,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    /// Resume operation. The paused interval is not charged.
    pub fn resume(&mut self, ledger: &Ledger, caller: Address) -> WardenResult<()> {
        self.only_owner(caller)?;
        self.when_not_finalized()?;
        if !self.state.paused {
            return Err(WardenError::VaultIsNotPaused);
        }

        self.state.fees.restart(ledger.timestamp());
        self.state.paused = false;

        self.events.emit(WardenEvent::Unpaused {
            by: caller,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    // ============ Guardian Operations ============

    /// Run a batch of allowlisted calls as the vault.
    ///
    /// A failing call aborts with its index. Native value left in the vault
    /// afterwards is wrapped; a failing wrap reports index `operations.len()`.
    pub fn submit(&mut self, ledger: &mut Ledger, caller: Address, operations: &[Operation]) -> WardenResult<()> {
        self.non_reentrant(|vault| vault.submit_inner(ledger, caller, operations))
    }

    fn submit_inner(&mut self, ledger: &mut Ledger, caller: Address, operations: &[Operation]) -> WardenResult<()> {
        // 1. Guardian only, while live
        self.only_guardian(caller)?;
        self.when_not_finalized()?;
        if self.state.paused {
            return Err(WardenError::VaultIsPaused);
        }

        self.reserve_fees(ledger)?;

        // 2. Static checks on every call
        for (index, operation) in operations.iter().enumerate() {
            self.check_submit_operation(index, operation)?;
        }

        let fee_token = self.registry.fee_token();
        let balance_before = ledger.balance_of(fee_token, self.address);

        // 3. Allowlist and value snapshot
        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.before_submit(self.address, &view, operations)?;

        // 4. Execute
        for (index, operation) in operations.iter().enumerate() {
            ledger
                .call(self.address, operation.target, operation.value, &operation.data)
                .map_err(|revert| WardenError::SubmissionFailed { index, revert })?;
        }

        let native = ledger.native_balance(self.address);
        if native > 0 {
            ledger
                .call(self.address, self.registry.wrapped_native_token(), native, &selectors::WRAP)
                .map_err(|revert| WardenError::SubmissionFailed {
                    index: operations.len(),
                    revert,
                })?;
        }

        // 5. Daily bound and allowance checks
        let view = Snapshot::new(self.address, ledger, &self.registry, self.state.fees.fee_total);
        self.hooks.after_submit(self.address, &view, operations)?;

        // 6. Reserved fees untouched
        self.state
            .fees
            .check_reserved(balance_before, ledger.balance_of(fee_token, self.address))?;

        let operation_count = u32::try_from(operations.len()).map_err(|_| WardenError::Overflow)?;
        self.events.emit(WardenEvent::Submitted {
            guardian: caller,
            operation_count,
            digest: operations_digest(operations),
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    // ============ Fee Operations ============

    /// Pay out the caller's reserved fees, bounded by the fee token balance
    pub fn claim(&mut self, ledger: &mut Ledger, caller: Address) -> WardenResult<()> {
        self.non_reentrant(|vault| vault.claim_inner(ledger, caller))
    }

    fn claim_inner(&mut self, ledger: &mut Ledger, caller: Address) -> WardenResult<()> {
        self.reserve_fees(ledger)?;

        let fee_token = self.registry.fee_token();
        let balance = ledger.balance_of(fee_token, self.address);
        let (claimed, unclaimed) = self.state.fees.claim(caller, balance)?;

        ledger.transfer(fee_token, self.address, caller, claimed)?;

        self.events.emit(WardenEvent::Claimed {
            recipient: caller,
            claimed,
            unclaimed,
            fee_total: self.state.fees.fee_total,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    /// Charge fees unless the vault is paused or finalized
    fn reserve_fees(&mut self, ledger: &Ledger) -> WardenResult<()> {
        if self.state.paused || self.state.finalized {
            return Ok(());
        }
        self.state.fees.reserve(
            ledger,
            &self.registry,
            self.address,
            self.state.fee_recipient,
            &mut self.events,
        )
    }

    // ============ Guards ============

    fn non_reentrant<T>(&mut self, f: impl FnOnce(&mut Self) -> WardenResult<T>) -> WardenResult<T> {
        self.guard.enter()?;
        let result = f(self);
        self.guard.exit();
        result
    }

    fn only_owner(&self, caller: Address) -> WardenResult<()> {
        if caller != self.state.owner {
            return Err(WardenError::CallerIsNotOwner { caller });
        }
        Ok(())
    }

    fn only_guardian(&self, caller: Address) -> WardenResult<()> {
        if caller != self.state.guardian {
            return Err(WardenError::CallerIsNotGuardian { caller });
        }
        Ok(())
    }

    fn only_owner_or_guardian(&self, caller: Address) -> WardenResult<()> {
        if caller != self.state.owner && caller != self.state.guardian {
            return Err(WardenError::CallerIsNotOwnerOrGuardian { caller });
        }
        Ok(())
    }

    fn when_not_finalized(&self) -> WardenResult<()> {
        if self.state.finalized {
            return Err(WardenError::VaultIsFinalized);
        }
        Ok(())
    }

    /// Strictly ascending, registered assets
    fn check_amounts(&self, amounts: &[AssetValue]) -> WardenResult<()> {
        for (index, amount) in amounts.iter().enumerate() {
            if index > 0 && amounts[index - 1].asset >= amount.asset {
                return Err(WardenError::AmountsOrderIsIncorrect { index });
            }
            if !self.registry.is_registered(amount.asset) {
                return Err(WardenError::AssetNotRegistered { asset: amount.asset });
            }
        }
        Ok(())
    }

    fn check_target(&self, target: Address) -> WardenResult<()> {
        if target == self.address {
            return Err(WardenError::TargetIsVault);
        }
        if target == self.hooks.address() {
            return Err(WardenError::TargetIsHooks);
        }
        Ok(())
    }

    fn check_submit_operation(&self, index: usize, operation: &Operation) -> WardenResult<()> {
        self.check_target(operation.target)?;

        let owner = Some(self.state.owner);
        match operation.selector() {
            Some(selectors::TRANSFER_FROM) if abi::address_arg(&operation.data, 0) == owner => {
                Err(WardenError::SubmitTransfersAssetFromOwner { index })
            }
            Some(selectors::VAULT_WITHDRAW) | Some(selectors::VAULT_REDEEM)
                if abi::address_arg(&operation.data, 2) == owner =>
            {
                Err(WardenError::SubmitRedeemsAssetFromOwner { index })
            }
            _ => Ok(()),
        }
    }
}
