//! Error Types for the Warden Vault
//!
//! Typed errors carry enough context to tell the caller what to fix.
//! Every variant maps to a stable code and to one of four error kinds.

use crate::types::{Address, Revert, TargetSighash};

/// Result type alias for Warden operations
pub type WardenResult<T> = Result<T, WardenError>;

/// Broad error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong caller role
    Authorization,
    /// Malformed input, unknown asset, disallowed call, insufficient balance
    Validation,
    /// Price feed invalid, stale or unavailable
    Oracle,
    /// Safeguard bound, solvency or execution failure
    Invariant,
}

/// Main error enum for all Warden errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WardenError {
    // ============ Authorization Errors ============
    /// Caller is not the owner
    CallerIsNotOwner { caller: Address },

    /// Caller is not the guardian
    CallerIsNotGuardian { caller: Address },

    /// Caller is neither owner nor guardian
    CallerIsNotOwnerOrGuardian { caller: Address },

    /// Caller is not the bound vault (or the hooks are decommissioned)
    CallerIsNotVault { caller: Address },

    // ============ Lifecycle Errors ============
    /// Vault has been finalized
    VaultIsFinalized,

    /// Vault is paused
    VaultIsPaused,

    /// Vault is not paused
    VaultIsNotPaused,

    /// Nested entry into a guarded function
    Reentrancy,

    // ============ Configuration Errors ============
    /// Address must not be zero
    ZeroAddress { param: &'static str },

    /// Guardian cannot be the owner
    GuardianIsOwner,

    /// Fee recipient cannot be the owner
    FeeRecipientIsOwner,

    /// Fee above the maximum
    FeeIsAboveMax { actual: u128, max: u128 },

    /// Minimum daily value outside [0.5, 1.0)
    MinDailyValueOutOfBounds { value: u128 },

    /// Component is bound to a different vault
    VaultMismatch { expected: Address, actual: Option<Address> },

    /// New hooks are the current hooks
    HooksAlreadySet { hooks: Address },

    // ============ Registry Errors ============
    /// Too many assets
    NumberOfAssetsExceedsMaximum { max: usize },

    /// Assets not strictly sorted by address
    AssetsAreNotSorted { index: usize },

    /// Asset already registered
    AssetIsAlreadyRegistered { asset: Address },

    /// Asset not registered
    AssetNotRegistered { asset: Address },

    /// Required token missing from the asset list
    RequiredAssetNotRegistered { role: &'static str, asset: Address },

    /// Numeraire must have no oracle and must not be yield-bearing
    InvalidNumeraire { asset: Address },

    /// Asset cannot be yield-bearing in its role
    AssetIsYieldBearing { role: &'static str, asset: Address },

    /// Priced asset without an oracle
    OracleMissing { asset: Address },

    /// Yield-bearing asset with an oracle
    YieldBearingAssetHasOracle { asset: Address },

    /// Heartbeat outside (0, MAX_HEARTBEAT]
    InvalidHeartbeat { asset: Address, heartbeat: u64 },

    /// Yield-bearing asset whose underlying is unknown
    UnderlyingNotRegistered { asset: Address, underlying: Address },

    /// Yield-bearing asset wrapping another yield-bearing asset
    NestedYieldBearingAsset { asset: Address, underlying: Address },

    /// Token is not a share vault
    NotYieldBearingToken { asset: Address },

    /// Cannot remove a protected token
    CannotRemoveAsset { role: &'static str, asset: Address },

    /// Asset is the underlying of a registered yield-bearing asset
    AssetIsUnderlyingOfYieldBearing { asset: Address, yield_bearing: Address },

    // ============ Oracle Errors ============
    /// L2 sequencer is down
    SequencerDown,

    /// Sequencer came back too recently
    GracePeriodNotOver { started_at: u64, now: u64 },

    /// Oracle reported a non-positive answer
    InvalidPrice { asset: Address, answer: i128 },

    /// Oracle answer too old
    StalePrice { asset: Address, updated_at: u64, now: u64 },

    /// Oracle call reverted
    OracleReverted { oracle: Address, revert: Revert },

    /// Share conversion call reverted
    ConversionReverted { asset: Address, revert: Revert },

    // ============ Validation Errors ============
    /// Deposit/withdraw batch not strictly ascending
    AmountsOrderIsIncorrect { index: usize },

    /// Withdrawal above available balance
    AmountExceedsAvailable { asset: Address, amount: u128, available: u128 },

    /// Operation not on the allowlist
    CallIsNotAllowed { index: usize },

    /// Allowlist entry already present
    TargetSighashAlreadyAllowed { entry: TargetSighash },

    /// Allowlist entry missing
    TargetSighashNotFound { entry: TargetSighash },

    /// Allowlisted target has no code
    TargetIsNotContract { target: Address },

    /// Call targets the vault itself
    TargetIsVault,

    /// Call targets the hooks
    TargetIsHooks,

    /// Submitted call pulls tokens from the owner
    SubmitTransfersAssetFromOwner { index: usize },

    /// Submitted call redeems shares owned by the owner
    SubmitRedeemsAssetFromOwner { index: usize },

    /// Nothing to claim for caller
    NoClaimableFees { caller: Address },

    /// Fee token balance is empty
    NoAvailableFeesForCaller { caller: Address },

    /// Insufficient token balance
    InsufficientBalance { token: Address, available: u128, requested: u128 },

    /// Insufficient allowance
    InsufficientAllowance { token: Address, available: u128, requested: u128 },

    /// Unknown token
    UnknownToken { token: Address },

    /// Unknown price feed
    UnknownFeed { feed: Address },

    // ============ Invariant Errors ============
    /// Daily multiplier would drop below the floor
    VaultValueBelowMinDailyValue { multiplier: u128, min_daily_value: u128 },

    /// Approval left outstanding after a submission
    AllowanceIsNotZero { token: Address, spender: Address, allowance: u128 },

    /// Reserved fee tokens were spent
    CannotUseReservedFees { balance: u128, fee_total: u128 },

    /// Owner call reverted
    ExecutionFailed { revert: Revert },

    /// Guardian call reverted
    SubmissionFailed { index: usize, revert: Revert },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,
}

impl WardenError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::CallerIsNotOwner { .. } => "W001_NOT_OWNER",
            Self::CallerIsNotGuardian { .. } => "W002_NOT_GUARDIAN",
            Self::CallerIsNotOwnerOrGuardian { .. } => "W003_NOT_OWNER_OR_GUARDIAN",
            Self::CallerIsNotVault { .. } => "W004_NOT_VAULT",
            Self::VaultIsFinalized => "W010_FINALIZED",
            Self::VaultIsPaused => "W011_PAUSED",
            Self::VaultIsNotPaused => "W012_NOT_PAUSED",
            Self::Reentrancy => "W013_REENTRANCY",
            Self::ZeroAddress { .. } => "W020_ZERO_ADDRESS",
            Self::GuardianIsOwner => "W021_GUARDIAN_IS_OWNER",
            Self::FeeRecipientIsOwner => "W022_FEE_RECIPIENT_IS_OWNER",
            Self::FeeIsAboveMax { .. } => "W023_FEE_ABOVE_MAX",
            Self::MinDailyValueOutOfBounds { .. } => "W024_MIN_DAILY_VALUE",
            Self::VaultMismatch { .. } => "W025_VAULT_MISMATCH",
            Self::HooksAlreadySet { .. } => "W026_HOOKS_ALREADY_SET",
            Self::NumberOfAssetsExceedsMaximum { .. } => "W030_TOO_MANY_ASSETS",
            Self::AssetsAreNotSorted { .. } => "W031_ASSETS_NOT_SORTED",
            Self::AssetIsAlreadyRegistered { .. } => "W032_ASSET_REGISTERED",
            Self::AssetNotRegistered { .. } => "W033_ASSET_NOT_REGISTERED",
            Self::RequiredAssetNotRegistered { .. } => "W034_REQUIRED_ASSET_MISSING",
            Self::InvalidNumeraire { .. } => "W035_INVALID_NUMERAIRE",
            Self::AssetIsYieldBearing { .. } => "W036_ASSET_IS_YIELD_BEARING",
            Self::OracleMissing { .. } => "W037_ORACLE_MISSING",
            Self::YieldBearingAssetHasOracle { .. } => "W038_YIELD_BEARING_ORACLE",
            Self::InvalidHeartbeat { .. } => "W039_INVALID_HEARTBEAT",
            Self::UnderlyingNotRegistered { .. } => "W040_UNDERLYING_NOT_REGISTERED",
            Self::NestedYieldBearingAsset { .. } => "W041_NESTED_YIELD_BEARING",
            Self::NotYieldBearingToken { .. } => "W042_NOT_YIELD_BEARING",
            Self::CannotRemoveAsset { .. } => "W043_CANNOT_REMOVE_ASSET",
            Self::AssetIsUnderlyingOfYieldBearing { .. } => "W044_ASSET_IS_UNDERLYING",
            Self::SequencerDown => "W050_SEQUENCER_DOWN",
            Self::GracePeriodNotOver { .. } => "W051_GRACE_PERIOD",
            Self::InvalidPrice { .. } => "W052_INVALID_PRICE",
            Self::StalePrice { .. } => "W053_STALE_PRICE",
            Self::OracleReverted { .. } => "W054_ORACLE_REVERTED",
            Self::ConversionReverted { .. } => "W055_CONVERSION_REVERTED",
            Self::AmountsOrderIsIncorrect { .. } => "W060_AMOUNTS_ORDER",
            Self::AmountExceedsAvailable { .. } => "W061_EXCEEDS_AVAILABLE",
            Self::CallIsNotAllowed { .. } => "W062_CALL_NOT_ALLOWED",
            Self::TargetSighashAlreadyAllowed { .. } => "W063_SIGHASH_ALLOWED",
            Self::TargetSighashNotFound { .. } => "W064_SIGHASH_NOT_FOUND",
            Self::TargetIsNotContract { .. } => "W065_TARGET_NOT_CONTRACT",
            Self::TargetIsVault => "W066_TARGET_IS_VAULT",
            Self::TargetIsHooks => "W067_TARGET_IS_HOOKS",
            Self::SubmitTransfersAssetFromOwner { .. } => "W068_TRANSFER_FROM_OWNER",
            Self::SubmitRedeemsAssetFromOwner { .. } => "W069_REDEEM_FROM_OWNER",
            Self::NoClaimableFees { .. } => "W070_NO_CLAIMABLE_FEES",
            Self::NoAvailableFeesForCaller { .. } => "W071_NO_AVAILABLE_FEES",
            Self::InsufficientBalance { .. } => "W072_INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "W073_INSUFFICIENT_ALLOWANCE",
            Self::UnknownToken { .. } => "W074_UNKNOWN_TOKEN",
            Self::UnknownFeed { .. } => "W075_UNKNOWN_FEED",
            Self::VaultValueBelowMinDailyValue { .. } => "W080_BELOW_MIN_DAILY_VALUE",
            Self::AllowanceIsNotZero { .. } => "W081_ALLOWANCE_NOT_ZERO",
            Self::CannotUseReservedFees { .. } => "W082_RESERVED_FEES_USED",
            Self::ExecutionFailed { .. } => "W083_EXECUTION_FAILED",
            Self::SubmissionFailed { .. } => "W084_SUBMISSION_FAILED",
            Self::Overflow => "W090_OVERFLOW",
            Self::Underflow => "W091_UNDERFLOW",
            Self::DivisionByZero => "W092_DIV_ZERO",
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CallerIsNotOwner { .. }
            | Self::CallerIsNotGuardian { .. }
            | Self::CallerIsNotOwnerOrGuardian { .. }
            | Self::CallerIsNotVault { .. } => ErrorKind::Authorization,

            Self::SequencerDown
            | Self::GracePeriodNotOver { .. }
            | Self::InvalidPrice { .. }
            | Self::StalePrice { .. }
            | Self::OracleReverted { .. }
            | Self::ConversionReverted { .. } => ErrorKind::Oracle,

            Self::VaultValueBelowMinDailyValue { .. }
            | Self::AllowanceIsNotZero { .. }
            | Self::CannotUseReservedFees { .. }
            | Self::ExecutionFailed { .. }
            | Self::SubmissionFailed { .. }
            | Self::Reentrancy
            | Self::Overflow
            | Self::Underflow
            | Self::DivisionByZero => ErrorKind::Invariant,

            _ => ErrorKind::Validation,
        }
    }

    /// True when the failure carries no revert information at all.
    ///
    /// Fee accrual tolerates every valuation failure except these.
    pub fn is_silent(&self) -> bool {
        match self {
            Self::OracleReverted { revert, .. } | Self::ConversionReverted { revert, .. } => {
                revert.is_silent()
            }
            _ => false,
        }
    }

    /// Returns true if this error is recoverable by waiting or fixing input
    pub fn is_recoverable(&self) -> bool {
        match self.kind() {
            ErrorKind::Validation => true,
            ErrorKind::Oracle => !self.is_silent(),
            _ => false,
        }
    }
}
