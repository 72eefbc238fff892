//! Warden Common Library
//!
//! Shared types, constants, and utilities for the Warden guarded vault.
//!
//! ## Components
//!
//! - **Types**: addresses, selectors, asset descriptors, operations
//! - **Errors**: one typed error enum with stable codes and kinds
//! - **Math**: checked fixed-point arithmetic with wide intermediates
//! - **ABI**: call data encoding for the calls the vault inspects
//! - **Events**: audit events and the per-component event log
//! - **Ledger**: in-memory host holding tokens, feeds and call targets
//!
//! The registry, the safeguard hooks and the vault are separate crates that
//! all build on these definitions.

pub mod abi;
pub mod constants;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod math;
pub mod types;

// Re-exports for convenience
pub use constants::*;
pub use errors::*;
pub use events::*;
pub use ledger::{ExternalTarget, Ledger, PriceFeed, TokenKind};
pub use math::*;
pub use types::*;
