//! Protocol Constants
//!
//! All magic numbers and configuration bounds for the Warden vault.
//! Fixed-point values use 18 decimals unless stated otherwise.

/// Fixed-point precision
pub mod precision {
    /// 1.0 in 18-decimal fixed point
    pub const ONE: u128 = 1_000_000_000_000_000_000;

    /// Decimals of every normalized price
    pub const PRICE_DECIMALS: u8 = 18;
}

/// Time-related constants (seconds)
pub mod time {
    /// One hour
    pub const HOUR: u64 = 3_600;

    /// One UTC day
    pub const DAY: u64 = 86_400;
}

/// Fee ledger configuration
pub mod fees {
    /// Maximum fee per second (18 decimals), roughly 3.15% per year
    pub const MAX_FEE: u128 = 1_000_000_000;
}

/// Oracle configuration
pub mod oracle {
    use super::time::HOUR;

    /// Extra tolerance added to every heartbeat before a price is stale
    pub const STALENESS_TOLERANCE: u64 = HOUR;

    /// Time after a sequencer restart during which prices are not trusted
    pub const SEQUENCER_GRACE_PERIOD: u64 = HOUR;

    /// Sequencer feed answer meaning "down"
    pub const SEQUENCER_DOWN: i128 = 1;

    /// Largest heartbeat an asset may declare
    pub const MAX_HEARTBEAT: u64 = super::time::DAY;
}

/// Asset registry configuration
pub mod registry {
    /// Maximum number of registered assets
    pub const MAX_ASSETS: usize = 50;
}

/// Guardian safeguard configuration
pub mod safeguard {
    use super::precision::ONE;

    /// Lowest accepted minimum daily value (50%)
    pub const MIN_DAILY_VALUE_LOWER_BOUND: u128 = ONE / 2;

    /// Minimum daily value must stay strictly below 100%
    pub const MIN_DAILY_VALUE_UPPER_BOUND: u128 = ONE;
}

/// The zero address
pub const ZERO_ADDRESS: crate::types::Address = [0u8; 20];
