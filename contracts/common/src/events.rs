//! Vault Events
//!
//! Events are the durable audit trail of every state-changing action.
//! Each component collects them in its own [`EventLog`]; they can be
//! serialized with borsh for storage or indexed off-chain.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Address, AssetValue, Operation, Selector};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Registry Events (0x01 - 0x0F)
    AssetAdded = 0x01,
    AssetRemoved = 0x02,

    // Hooks Events (0x10 - 0x1F)
    TargetSighashAdded = 0x10,
    TargetSighashRemoved = 0x11,
    HooksDecommissioned = 0x12,
    MultiplierUpdated = 0x13,

    // Vault Events (0x20 - 0x3F)
    VaultCreated = 0x20,
    Deposited = 0x21,
    Withdrawn = 0x22,
    GuardianAndFeeRecipientSet = 0x23,
    HooksSet = 0x24,
    Executed = 0x25,
    Submitted = 0x26,
    Finalized = 0x27,
    Paused = 0x28,
    Unpaused = 0x29,

    // Fee Events (0x40 - 0x4F)
    FeesReserved = 0x40,
    SpotPricesReverted = 0x41,
    Claimed = 0x42,
}

/// Main event enum containing all vault events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum WardenEvent {
    // ============ Registry Events ============

    /// Emitted when an asset is registered
    AssetAdded {
        asset: Address,
        timestamp: u64,
    },

    /// Emitted when an asset is removed
    AssetRemoved {
        asset: Address,
        timestamp: u64,
    },

    // ============ Hooks Events ============

    /// Emitted when a (target, selector) pair is allowlisted
    TargetSighashAdded {
        target: Address,
        selector: Selector,
        timestamp: u64,
    },

    /// Emitted when a (target, selector) pair is removed from the allowlist
    TargetSighashRemoved {
        target: Address,
        selector: Selector,
        timestamp: u64,
    },

    /// Emitted when hooks are detached from their vault
    HooksDecommissioned {
        vault: Address,
        timestamp: u64,
    },

    /// Emitted when a submission moves the daily multiplier
    MultiplierUpdated {
        day: u64,
        multiplier: u128,
        before_value: u128,
        after_value: u128,
        timestamp: u64,
    },

    // ============ Vault Events ============

    /// Emitted once at vault construction
    VaultCreated {
        vault: Address,
        owner: Address,
        guardian: Address,
        fee_recipient: Address,
        fee: u128,
        timestamp: u64,
    },

    /// Emitted on owner deposit
    Deposited {
        owner: Address,
        amounts: Vec<AssetValue>,
        timestamp: u64,
    },

    /// Emitted on owner withdrawal
    Withdrawn {
        owner: Address,
        amounts: Vec<AssetValue>,
        timestamp: u64,
    },

    /// Emitted when roles change
    GuardianAndFeeRecipientSet {
        guardian: Address,
        fee_recipient: Address,
        timestamp: u64,
    },

    /// Emitted when hooks are replaced
    HooksSet {
        old_hooks: Address,
        new_hooks: Address,
        timestamp: u64,
    },

    /// Emitted on owner escape-hatch call
    Executed {
        owner: Address,
        target: Address,
        value: u128,
        selector: Option<Selector>,
        timestamp: u64,
    },

    /// Emitted on guardian submission
    Submitted {
        guardian: Address,
        operation_count: u32,
        digest: [u8; 32],
        timestamp: u64,
    },

    /// Emitted when the vault is finalized
    Finalized {
        owner: Address,
        withdrawn: Vec<AssetValue>,
        timestamp: u64,
    },

    /// Emitted when the vault is paused
    Paused {
        by: Address,
        timestamp: u64,
    },

    /// Emitted when the vault is resumed
    Unpaused {
        by: Address,
        timestamp: u64,
    },

    // ============ Fee Events ============

    /// Emitted when fees are credited to the fee recipient
    FeesReserved {
        recipient: Address,
        new_fee: u128,
        value: u128,
        fee_token_price: u128,
        elapsed: u64,
        timestamp: u64,
    },

    /// Emitted when fee accrual is skipped because prices were unavailable
    SpotPricesReverted {
        elapsed: u64,
        code: String,
        timestamp: u64,
    },

    /// Emitted when a recipient claims fees
    Claimed {
        recipient: Address,
        claimed: u128,
        unclaimed: u128,
        fee_total: u128,
        timestamp: u64,
    },
}

impl WardenEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::AssetAdded { .. } => EventType::AssetAdded,
            Self::AssetRemoved { .. } => EventType::AssetRemoved,
            Self::TargetSighashAdded { .. } => EventType::TargetSighashAdded,
            Self::TargetSighashRemoved { .. } => EventType::TargetSighashRemoved,
            Self::HooksDecommissioned { .. } => EventType::HooksDecommissioned,
            Self::MultiplierUpdated { .. } => EventType::MultiplierUpdated,
            Self::VaultCreated { .. } => EventType::VaultCreated,
            Self::Deposited { .. } => EventType::Deposited,
            Self::Withdrawn { .. } => EventType::Withdrawn,
            Self::GuardianAndFeeRecipientSet { .. } => EventType::GuardianAndFeeRecipientSet,
            Self::HooksSet { .. } => EventType::HooksSet,
            Self::Executed { .. } => EventType::Executed,
            Self::Submitted { .. } => EventType::Submitted,
            Self::Finalized { .. } => EventType::Finalized,
            Self::Paused { .. } => EventType::Paused,
            Self::Unpaused { .. } => EventType::Unpaused,
            Self::FeesReserved { .. } => EventType::FeesReserved,
            Self::SpotPricesReverted { .. } => EventType::SpotPricesReverted,
            Self::Claimed { .. } => EventType::Claimed,
        }
    }

    /// Get the block timestamp when the event occurred
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::AssetAdded { timestamp, .. }
            | Self::AssetRemoved { timestamp, .. }
            | Self::TargetSighashAdded { timestamp, .. }
            | Self::TargetSighashRemoved { timestamp, .. }
            | Self::HooksDecommissioned { timestamp, .. }
            | Self::MultiplierUpdated { timestamp, .. }
            | Self::VaultCreated { timestamp, .. }
            | Self::Deposited { timestamp, .. }
            | Self::Withdrawn { timestamp, .. }
            | Self::GuardianAndFeeRecipientSet { timestamp, .. }
            | Self::HooksSet { timestamp, .. }
            | Self::Executed { timestamp, .. }
            | Self::Submitted { timestamp, .. }
            | Self::Finalized { timestamp, .. }
            | Self::Paused { timestamp, .. }
            | Self::Unpaused { timestamp, .. }
            | Self::FeesReserved { timestamp, .. }
            | Self::SpotPricesReverted { timestamp, .. }
            | Self::Claimed { timestamp, .. } => *timestamp,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// SHA-256 digest of a submitted batch, used to tie audit events to payloads
pub fn operations_digest(operations: &[Operation]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for op in operations {
        hasher.update(borsh::to_vec(op).unwrap_or_default());
    }
    hasher.finalize().into()
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<WardenEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: WardenEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[WardenEvent] {
        &self.events
    }

    /// Most recent event
    pub fn last(&self) -> Option<&WardenEvent> {
        self.events.last()
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&WardenEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if no events were emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
