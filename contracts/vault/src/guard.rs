//! Reentrancy guard for vault entry points that perform external calls.
//!
//! Call targets only ever receive `&mut Ledger`, never the vault, so re-entry
//! through a call is already ruled out by the borrow structure. The flag
//! covers the entry points themselves.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use warden_common::errors::{WardenError, WardenResult};

/// In-progress flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    /// Mark a guarded call as started. Fails if one is already running.
    pub fn enter(&mut self) -> WardenResult<()> {
        if self.entered {
            return Err(WardenError::Reentrancy);
        }
        self.entered = true;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}
