//! Guardian Safeguards
//!
//! Hooks the vault calls around every privileged action. The default
//! implementation, [`Hooks`], enforces two policies on guardian submissions:
//!
//! - **Allowlist**: every call must target an approved (target, selector) pair
//! - **Daily bound**: the product of value ratios across all submissions in
//!   one UTC day must stay at or above `min_daily_value`
//!
//! After a submission, any approval the batch granted must already be spent.
//!
//! ## Lifecycle
//!
//! ```text
//! Active(day, multiplier) --decommission--> Decommissioned
//! ```
//!
//! Decommissioning is terminal: the bound vault is cleared, so every
//! vault-only hook fails afterwards.

use std::collections::BTreeSet;
use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use warden_common::{
    abi::{self, selectors},
    constants::{
        precision::ONE,
        safeguard::{MIN_DAILY_VALUE_LOWER_BOUND, MIN_DAILY_VALUE_UPPER_BOUND},
        time::DAY,
        ZERO_ADDRESS,
    },
    errors::{WardenError, WardenResult},
    events::{EventLog, WardenEvent},
    ledger::Ledger,
    math::mul_div,
    types::{Address, AssetValue, Operation, Selector, TargetSighash},
};

// ============ Vault Interfaces ============

/// Read-only window into the vault, handed to hooks during a call
pub trait VaultView {
    /// Vault address
    fn address(&self) -> Address;

    /// Current block timestamp
    fn timestamp(&self) -> u64;

    /// Current vault value in numeraire units
    fn value(&self) -> WardenResult<u128>;

    /// Allowance the vault has granted `spender` on `token`
    fn allowance(&self, token: Address, spender: Address) -> u128;
}

/// Hooks a vault runs around deposits, withdrawals, submissions and finalization.
///
/// Every method rejects callers other than the bound vault. Deposit,
/// withdraw and finalize hooks do nothing beyond that by default.
pub trait VaultHooks: Clone + fmt::Debug {
    /// Address the hooks are deployed at
    fn address(&self) -> Address;

    /// Bound vault, `None` once decommissioned
    fn vault(&self) -> Option<Address>;

    fn only_vault(&self, caller: Address) -> WardenResult<()> {
        match self.vault() {
            Some(vault) if vault == caller => Ok(()),
            _ => Err(WardenError::CallerIsNotVault { caller }),
        }
    }

    fn before_deposit(
        &mut self,
        caller: Address,
        _view: &dyn VaultView,
        _amounts: &[AssetValue],
    ) -> WardenResult<()> {
        self.only_vault(caller)
    }

    fn after_deposit(
        &mut self,
        caller: Address,
        _view: &dyn VaultView,
        _amounts: &[AssetValue],
    ) -> WardenResult<()> {
        self.only_vault(caller)
    }

    fn before_withdraw(
        &mut self,
        caller: Address,
        _view: &dyn VaultView,
        _amounts: &[AssetValue],
    ) -> WardenResult<()> {
        self.only_vault(caller)
    }

    fn after_withdraw(
        &mut self,
        caller: Address,
        _view: &dyn VaultView,
        _amounts: &[AssetValue],
    ) -> WardenResult<()> {
        self.only_vault(caller)
    }

    /// Runs before a guardian batch is executed
    fn before_submit(
        &mut self,
        caller: Address,
        view: &dyn VaultView,
        operations: &[Operation],
    ) -> WardenResult<()>;

    /// Runs after a guardian batch is executed
    fn after_submit(
        &mut self,
        caller: Address,
        view: &dyn VaultView,
        operations: &[Operation],
    ) -> WardenResult<()>;

    fn before_finalize(&mut self, caller: Address, _view: &dyn VaultView) -> WardenResult<()> {
        self.only_vault(caller)
    }

    fn after_finalize(&mut self, caller: Address, _view: &dyn VaultView) -> WardenResult<()> {
        self.only_vault(caller)
    }

    /// Detach from the vault. Terminal.
    fn decommission(&mut self, caller: Address, view: &dyn VaultView) -> WardenResult<()>;
}

// ============ Parameters ============

/// Deployment parameters of the safeguard hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct HooksParameters {
    /// Address the hooks are deployed at
    pub address: Address,
    /// Account that manages the allowlist
    pub owner: Address,
    /// Vault the hooks serve
    pub vault: Address,
    /// Floor on the cumulative daily multiplier, 18 decimals, in [0.5, 1.0)
    pub min_daily_value: u128,
    /// Initially allowed calls
    pub allowlist: Vec<TargetSighash>,
}

// ============ Hooks ============

/// Allowlist and daily-bound safeguards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hooks {
    address: Address,
    owner: Address,
    vault: Option<Address>,
    min_daily_value: u128,
    current_day: u64,
    cumulative_daily_multiplier: u128,
    allowlist: BTreeSet<TargetSighash>,
    /// Value snapshot between `before_submit` and `after_submit`
    before_value: u128,
    events: EventLog,
}

impl Hooks {
    /// Validate parameters against the ledger and build the hooks
    pub fn new(params: HooksParameters, ledger: &Ledger) -> WardenResult<Self> {
        if params.owner == ZERO_ADDRESS {
            return Err(WardenError::ZeroAddress { param: "owner" });
        }
        if params.vault == ZERO_ADDRESS {
            return Err(WardenError::ZeroAddress { param: "vault" });
        }
        if params.min_daily_value < MIN_DAILY_VALUE_LOWER_BOUND
            || params.min_daily_value >= MIN_DAILY_VALUE_UPPER_BOUND
        {
            return Err(WardenError::MinDailyValueOutOfBounds {
                value: params.min_daily_value,
            });
        }

        let mut hooks = Self {
            address: params.address,
            owner: params.owner,
            vault: Some(params.vault),
            min_daily_value: params.min_daily_value,
            current_day: ledger.timestamp() / DAY,
            cumulative_daily_multiplier: ONE,
            allowlist: BTreeSet::new(),
            before_value: 0,
            events: EventLog::new(),
        };

        for entry in params.allowlist {
            hooks.insert_target_sighash(ledger, entry)?;
        }

        Ok(hooks)
    }

    // ============ Queries ============

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn min_daily_value(&self) -> u128 {
        self.min_daily_value
    }

    /// UTC day index of the last multiplier update
    pub fn current_day(&self) -> u64 {
        self.current_day
    }

    /// Product of value ratios for the current day, 18 decimals
    pub fn cumulative_daily_multiplier(&self) -> u128 {
        self.cumulative_daily_multiplier
    }

    pub fn is_allowed(&self, target: Address, selector: Selector) -> bool {
        self.allowlist.contains(&TargetSighash::new(target, selector))
    }

    /// Allowlisted calls in (target, selector) order
    pub fn allowlist(&self) -> impl Iterator<Item = &TargetSighash> {
        self.allowlist.iter()
    }

    pub fn is_decommissioned(&self) -> bool {
        self.vault.is_none()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ============ Allowlist Management ============

    /// Allow calls to `selector` on `target`
    pub fn add_target_sighash(
        &mut self,
        ledger: &Ledger,
        caller: Address,
        target: Address,
        selector: Selector,
    ) -> WardenResult<()> {
        self.only_owner(caller)?;
        self.insert_target_sighash(ledger, TargetSighash::new(target, selector))
    }

    /// Revoke a previously allowed call
    pub fn remove_target_sighash(
        &mut self,
        ledger: &Ledger,
        caller: Address,
        target: Address,
        selector: Selector,
    ) -> WardenResult<()> {
        self.only_owner(caller)?;

        let entry = TargetSighash::new(target, selector);
        if !self.allowlist.remove(&entry) {
            return Err(WardenError::TargetSighashNotFound { entry });
        }

        self.events.emit(WardenEvent::TargetSighashRemoved {
            target,
            selector,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    fn insert_target_sighash(&mut self, ledger: &Ledger, entry: TargetSighash) -> WardenResult<()> {
        if !ledger.has_code(entry.target) {
            return Err(WardenError::TargetIsNotContract { target: entry.target });
        }
        if !self.allowlist.insert(entry) {
            return Err(WardenError::TargetSighashAlreadyAllowed { entry });
        }

        self.events.emit(WardenEvent::TargetSighashAdded {
            target: entry.target,
            selector: entry.selector,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    fn only_owner(&self, caller: Address) -> WardenResult<()> {
        if caller != self.owner {
            return Err(WardenError::CallerIsNotOwner { caller });
        }
        Ok(())
    }

    // ============ Daily Bound ============

    /// Fold one submission's value ratio into the daily multiplier
    fn update_multiplier(&mut self, view: &dyn VaultView) -> WardenResult<()> {
        let before = self.before_value;
        let after = view.value()?;
        let now = view.timestamp();
        let day = now / DAY;

        let multiplier = if day > self.current_day {
            mul_div(after, ONE, before)?
        } else {
            mul_div(self.cumulative_daily_multiplier, after, before)?
        };

        if multiplier < self.min_daily_value {
            return Err(WardenError::VaultValueBelowMinDailyValue {
                multiplier,
                min_daily_value: self.min_daily_value,
            });
        }

        self.cumulative_daily_multiplier = multiplier;
        self.current_day = day;

        self.events.emit(WardenEvent::MultiplierUpdated {
            day,
            multiplier,
            before_value: before,
            after_value: after,
            timestamp: now,
        });

        Ok(())
    }
}

impl VaultHooks for Hooks {
    fn address(&self) -> Address {
        self.address
    }

    fn vault(&self) -> Option<Address> {
        self.vault
    }

    fn before_submit(
        &mut self,
        caller: Address,
        view: &dyn VaultView,
        operations: &[Operation],
    ) -> WardenResult<()> {
        self.only_vault(caller)?;

        for (index, op) in operations.iter().enumerate() {
            let allowed = op
                .target_sighash()
                .is_some_and(|entry| self.allowlist.contains(&entry));
            if !allowed {
                return Err(WardenError::CallIsNotAllowed { index });
            }
        }

        self.before_value = view.value()?;
        Ok(())
    }

    fn after_submit(
        &mut self,
        caller: Address,
        view: &dyn VaultView,
        operations: &[Operation],
    ) -> WardenResult<()> {
        self.only_vault(caller)?;

        // An empty vault has no ratio to track
        if self.before_value > 0 {
            self.update_multiplier(view)?;
        }
        self.before_value = 0;

        for op in operations {
            let grants = matches!(
                op.selector(),
                Some(selectors::APPROVE) | Some(selectors::INCREASE_ALLOWANCE)
            );
            if !grants {
                continue;
            }
            let Some(spender) = abi::address_arg(&op.data, 0) else {
                continue;
            };
            let allowance = view.allowance(op.target, spender);
            if allowance > 0 {
                return Err(WardenError::AllowanceIsNotZero {
                    token: op.target,
                    spender,
                    allowance,
                });
            }
        }

        Ok(())
    }

    fn decommission(&mut self, caller: Address, view: &dyn VaultView) -> WardenResult<()> {
        self.only_vault(caller)?;

        self.vault = None;
        self.current_day = 0;
        self.cumulative_daily_multiplier = 0;

        self.events.emit(WardenEvent::HooksDecommissioned {
            vault: caller,
            timestamp: view.timestamp(),
        });

        Ok(())
    }
}

// ============ Tests ============
