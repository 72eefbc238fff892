//! Core Types for the Warden Vault
//!
//! Fundamental data structures shared by the registry, the hooks and the vault.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type alias for addresses (20 bytes, ordered byte-wise)
pub type Address = [u8; 20];

/// Type alias for function selectors (first 4 bytes of call data)
pub type Selector = [u8; 4];

/// Builds an address whose last byte is `n`. Handy for fixtures.
pub const fn address_from_low_byte(n: u8) -> Address {
    let mut addr = [0u8; 20];
    addr[19] = n;
    addr
}

// ============ Asset Types ============

/// Registry entry for a recognized asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AssetInfo {
    /// Token address
    pub asset: Address,
    /// Maximum expected interval between oracle updates (seconds)
    pub heartbeat: u64,
    /// Whether the asset is a share token priced through its underlying
    pub is_yield_bearing: bool,
    /// Price feed bound to this asset
    pub oracle: Option<Address>,
}

impl AssetInfo {
    /// Asset priced directly by an oracle
    pub fn priced(asset: Address, oracle: Address, heartbeat: u64) -> Self {
        Self {
            asset,
            heartbeat,
            is_yield_bearing: false,
            oracle: Some(oracle),
        }
    }

    /// The unit of account (no oracle)
    pub fn numeraire(asset: Address) -> Self {
        Self {
            asset,
            heartbeat: 0,
            is_yield_bearing: false,
            oracle: None,
        }
    }

    /// Share token valued through its underlying asset
    pub fn yield_bearing(asset: Address) -> Self {
        Self {
            asset,
            heartbeat: 0,
            is_yield_bearing: true,
            oracle: None,
        }
    }
}

/// Spot price of an asset in numeraire terms (18 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceReading {
    /// Asset address
    pub asset: Address,
    /// Normalized price, 18 decimals
    pub price: u128,
}

/// An (asset, amount) pair used for deposits, withdrawals and holdings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AssetValue {
    /// Asset address
    pub asset: Address,
    /// Amount in the asset's native units
    pub value: u128,
}

impl AssetValue {
    /// Create a new pair
    pub fn new(asset: Address, value: u128) -> Self {
        Self { asset, value }
    }
}

// ============ Call Types ============

/// An external call the vault is asked to perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Operation {
    /// Call target
    pub target: Address,
    /// Native value attached to the call
    pub value: u128,
    /// ABI-encoded call data
    pub data: Vec<u8>,
}

impl Operation {
    /// Create a call without native value
    pub fn new(target: Address, data: Vec<u8>) -> Self {
        Self { target, value: 0, data }
    }

    /// Selector of the call, if the payload is long enough to carry one
    pub fn selector(&self) -> Option<Selector> {
        self.data.get(..4).map(|s| [s[0], s[1], s[2], s[3]])
    }

    /// Allowlist key for this call
    pub fn target_sighash(&self) -> Option<TargetSighash> {
        self.selector().map(|selector| TargetSighash::new(self.target, selector))
    }
}

/// Allowlist key: a call target paired with a function selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TargetSighash {
    /// Call target
    pub target: Address,
    /// Function selector
    pub selector: Selector,
}

impl TargetSighash {
    /// Create a new key
    pub fn new(target: Address, selector: Selector) -> Self {
        Self { target, selector }
    }
}

/// Raw revert data returned by a failed call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Revert {
    /// Revert payload (empty for silent failures such as out-of-gas)
    pub data: Vec<u8>,
}

impl Revert {
    /// Revert without any data
    pub fn silent() -> Self {
        Self { data: Vec::new() }
    }

    /// Revert with a readable reason
    pub fn reason(reason: &str) -> Self {
        Self { data: reason.as_bytes().to_vec() }
    }

    /// True when the revert carries no information at all
    pub fn is_silent(&self) -> bool {
        self.data.is_empty()
    }

    /// Reason as text (lossy)
    pub fn reason_string(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Latest round reported by a price feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundData {
    /// Reported answer in feed decimals
    pub answer: i128,
    /// Round start timestamp
    pub started_at: u64,
    /// Last update timestamp
    pub updated_at: u64,
}
