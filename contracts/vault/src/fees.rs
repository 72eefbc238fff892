//! Fee Ledger
//!
//! Time-weighted management fee. On every privileged entry point the vault
//! charges `value * elapsed * fee` since the last checkpoint, paid in the fee
//! token and held back from the vault's holdings until claimed.
//!
//! ## Oracle Failures
//!
//! A valuation failure that carries information (stale or invalid price,
//! sequencer down, revert with data) skips accrual for that round and leaves
//! the checkpoint where it was, so the elapsed time is charged later. A
//! failure without any revert data aborts the calling operation.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use warden_asset_registry::AssetRegistry;
use warden_common::{
    errors::{WardenError, WardenResult},
    events::{EventLog, WardenEvent},
    ledger::Ledger,
    math::{mul_div, pow10, safe_add, safe_mul, safe_sub},
    types::Address,
};

use crate::valuation;

/// Fee accrual state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct FeeLedger {
    /// Fee per second, 18 decimals
    pub fee: u128,
    /// Timestamp of the last successful accrual
    pub last_fee_checkpoint: u64,
    /// Vault value at the last successful valuation
    pub last_value: u128,
    /// Fee token price at the last successful valuation
    pub last_fee_token_price: u128,
    /// Sum of all unclaimed fees
    pub fee_total: u128,
    /// Unclaimed fees per recipient
    pub fees: BTreeMap<Address, u128>,
}

impl FeeLedger {
    pub fn new(fee: u128, now: u64) -> Self {
        Self {
            fee,
            last_fee_checkpoint: now,
            ..Self::default()
        }
    }

    /// Unclaimed fees of `recipient`
    pub fn fees_of(&self, recipient: Address) -> u128 {
        self.fees.get(&recipient).copied().unwrap_or(0)
    }

    /// Restart accrual at `now` without charging the gap
    pub fn restart(&mut self, now: u64) {
        self.last_fee_checkpoint = now;
    }

    /// Charge fees for the time since the last checkpoint
    pub fn reserve(
        &mut self,
        ledger: &Ledger,
        registry: &AssetRegistry,
        vault: Address,
        recipient: Address,
        events: &mut EventLog,
    ) -> WardenResult<()> {
        if self.fee == 0 {
            return Ok(());
        }

        let now = ledger.timestamp();
        let elapsed = now.saturating_sub(self.last_fee_checkpoint);
        if elapsed == 0 {
            return Ok(());
        }

        let holdings = valuation::holdings(ledger, registry, vault, self.fee_total);
        let valuation = match valuation::value(ledger, registry, &holdings) {
            Ok(valuation) => valuation,
            Err(err) if err.is_silent() => return Err(err),
            Err(err) => {
                events.emit(WardenEvent::SpotPricesReverted {
                    elapsed,
                    code: err.code().to_string(),
                    timestamp: now,
                });
                return Ok(());
            }
        };

        self.last_value = valuation.value;
        self.last_fee_token_price = valuation.fee_token_price;

        if valuation.fee_token_price == 0 {
            return Ok(());
        }

        let new_fee = self.compute_fee(ledger, registry, elapsed, valuation.value, valuation.fee_token_price)?;
        if new_fee == 0 {
            return Ok(());
        }

        self.last_fee_checkpoint = now;
        let owed = self.fees.entry(recipient).or_insert(0);
        *owed = safe_add(*owed, new_fee)?;
        self.fee_total = safe_add(self.fee_total, new_fee)?;

        events.emit(WardenEvent::FeesReserved {
            recipient,
            new_fee,
            value: valuation.value,
            fee_token_price: valuation.fee_token_price,
            elapsed,
            timestamp: now,
        });

        Ok(())
    }

    /// `value * elapsed * fee / price`, moved from numeraire to fee token decimals.
    ///
    /// The decimal shift is folded into numerator or denominator so the
    /// division happens once.
    fn compute_fee(
        &self,
        ledger: &Ledger,
        registry: &AssetRegistry,
        elapsed: u64,
        value: u128,
        fee_token_price: u128,
    ) -> WardenResult<u128> {
        let numeraire_decimals = ledger.decimals(registry.numeraire_token())?;
        let fee_token_decimals = ledger.decimals(registry.fee_token())?;

        let mut numerator = self.fee;
        let mut denominator = fee_token_price;
        if fee_token_decimals >= numeraire_decimals {
            numerator = safe_mul(numerator, pow10(fee_token_decimals - numeraire_decimals)?)?;
        } else {
            denominator = safe_mul(denominator, pow10(numeraire_decimals - fee_token_decimals)?)?;
        }

        mul_div(safe_mul(value, elapsed as u128)?, numerator, denominator)
    }

    /// Take `caller`'s claim, bounded by the fee token balance.
    ///
    /// Returns (claimed, unclaimed). The caller moves the tokens.
    pub fn claim(&mut self, caller: Address, fee_token_balance: u128) -> WardenResult<(u128, u128)> {
        let owed = self.fees_of(caller);
        if owed == 0 {
            return Err(WardenError::NoClaimableFees { caller });
        }

        let claimed = owed.min(fee_token_balance);
        if claimed == 0 {
            return Err(WardenError::NoAvailableFeesForCaller { caller });
        }

        let unclaimed = owed - claimed;
        if unclaimed == 0 {
            self.fees.remove(&caller);
        } else {
            self.fees.insert(caller, unclaimed);
        }
        self.fee_total = safe_sub(self.fee_total, claimed)?;

        Ok((claimed, unclaimed))
    }

    /// Reject an action that dipped into reserved fee tokens
    pub fn check_reserved(&self, balance_before: u128, balance_after: u128) -> WardenResult<()> {
        if balance_after < self.fee_total && balance_after < balance_before {
            return Err(WardenError::CannotUseReservedFees {
                balance: balance_after,
                fee_total: self.fee_total,
            });
        }
        Ok(())
    }
}
