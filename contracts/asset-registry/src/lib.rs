//! Asset Registry
//!
//! Keeps the sorted list of assets a vault may hold, binds each priced asset
//! to its feed and turns feed answers into 18-decimal spot prices quoted in
//! the numeraire.
//!
//! ## Asset Roles
//!
//! - **Numeraire**: unit of account, price fixed at 1.0, never queried
//! - **Fee token**: asset fees are paid in, always priced directly
//! - **Wrapped native**: leftover native value is wrapped into it
//! - **Yield-bearing**: share tokens valued through their underlying
//!
//! Only the registry owner may add or remove assets.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use warden_common::{
    constants::{
        oracle::{MAX_HEARTBEAT, SEQUENCER_DOWN, SEQUENCER_GRACE_PERIOD, STALENESS_TOLERANCE},
        precision::{ONE, PRICE_DECIMALS},
        registry::MAX_ASSETS,
        ZERO_ADDRESS,
    },
    errors::{WardenError, WardenResult},
    events::{EventLog, WardenEvent},
    ledger::Ledger,
    math::rescale,
    types::{Address, AssetInfo, PriceReading},
};

// ============ Parameters ============

/// Deployment parameters of a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RegistryParameters {
    /// Account allowed to add and remove assets
    pub owner: Address,
    /// Vault this registry serves
    pub vault: Address,
    /// Initial assets, strictly sorted by address
    pub assets: Vec<AssetInfo>,
    pub numeraire_token: Address,
    pub fee_token: Address,
    pub wrapped_native_token: Address,
    /// Optional L2 sequencer uptime feed
    pub sequencer: Option<Address>,
}

// ============ Registry ============

/// Registry of assets recognized by one vault
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    owner: Address,
    vault: Address,
    assets: Vec<AssetInfo>,
    numeraire_token: Address,
    fee_token: Address,
    wrapped_native_token: Address,
    sequencer: Option<Address>,
    events: EventLog,
}

impl AssetRegistry {
    /// Validate parameters against the ledger and build the registry
    pub fn new(params: RegistryParameters, ledger: &Ledger) -> WardenResult<Self> {
        if params.owner == ZERO_ADDRESS {
            return Err(WardenError::ZeroAddress { param: "owner" });
        }
        if params.vault == ZERO_ADDRESS {
            return Err(WardenError::ZeroAddress { param: "vault" });
        }
        if params.assets.len() > MAX_ASSETS {
            return Err(WardenError::NumberOfAssetsExceedsMaximum { max: MAX_ASSETS });
        }
        for i in 1..params.assets.len() {
            if params.assets[i - 1].asset >= params.assets[i].asset {
                return Err(WardenError::AssetsAreNotSorted { index: i });
            }
        }

        let registry = Self {
            owner: params.owner,
            vault: params.vault,
            assets: params.assets,
            numeraire_token: params.numeraire_token,
            fee_token: params.fee_token,
            wrapped_native_token: params.wrapped_native_token,
            sequencer: params.sequencer,
            events: EventLog::new(),
        };

        registry.check_required("numeraire", registry.numeraire_token)?;
        registry.check_required("fee token", registry.fee_token)?;
        registry.check_required("wrapped native", registry.wrapped_native_token)?;

        for info in &registry.assets {
            registry.check_asset(ledger, info)?;
        }

        Ok(registry)
    }

    // ============ Queries ============

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    /// Registered assets in ascending address order
    pub fn assets(&self) -> &[AssetInfo] {
        &self.assets
    }

    /// Lookup a registered asset
    pub fn asset(&self, asset: Address) -> Option<&AssetInfo> {
        self.position(asset).ok().map(|i| &self.assets[i])
    }

    pub fn is_registered(&self, asset: Address) -> bool {
        self.position(asset).is_ok()
    }

    pub fn numeraire_token(&self) -> Address {
        self.numeraire_token
    }

    pub fn fee_token(&self) -> Address {
        self.fee_token
    }

    pub fn wrapped_native_token(&self) -> Address {
        self.wrapped_native_token
    }

    pub fn sequencer(&self) -> Option<Address> {
        self.sequencer
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ============ Administration ============

    /// Register a new asset, keeping the list sorted
    pub fn add_asset(&mut self, ledger: &Ledger, caller: Address, info: AssetInfo) -> WardenResult<()> {
        // 1. Only owner can change the asset list
        self.only_owner(caller)?;

        // 2. Reject duplicates and overflow
        let index = match self.position(info.asset) {
            Ok(_) => return Err(WardenError::AssetIsAlreadyRegistered { asset: info.asset }),
            Err(index) => index,
        };
        if self.assets.len() >= MAX_ASSETS {
            return Err(WardenError::NumberOfAssetsExceedsMaximum { max: MAX_ASSETS });
        }

        // 3. Oracle binding and wrapping rules
        self.check_asset(ledger, &info)?;

        self.assets.insert(index, info);
        self.events.emit(WardenEvent::AssetAdded {
            asset: info.asset,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    /// Remove an asset, keeping the list sorted
    pub fn remove_asset(&mut self, ledger: &Ledger, caller: Address, asset: Address) -> WardenResult<()> {
        self.only_owner(caller)?;

        let index = self
            .position(asset)
            .map_err(|_| WardenError::AssetNotRegistered { asset })?;

        if asset == self.numeraire_token {
            return Err(WardenError::CannotRemoveAsset { role: "numeraire", asset });
        }
        if asset == self.fee_token {
            return Err(WardenError::CannotRemoveAsset { role: "fee token", asset });
        }
        if asset == self.wrapped_native_token {
            return Err(WardenError::CannotRemoveAsset { role: "wrapped native", asset });
        }

        let dependent = self
            .assets
            .iter()
            .filter(|info| info.is_yield_bearing)
            .find(|info| ledger.underlying_of(info.asset) == Some(asset));
        if let Some(info) = dependent {
            return Err(WardenError::AssetIsUnderlyingOfYieldBearing {
                asset,
                yield_bearing: info.asset,
            });
        }

        self.assets.remove(index);
        self.events.emit(WardenEvent::AssetRemoved {
            asset,
            timestamp: ledger.timestamp(),
        });

        Ok(())
    }

    // ============ Prices ============

    /// Spot prices of every directly priced asset, 18 decimals.
    ///
    /// Yield-bearing assets are omitted; they are valued through their
    /// underlying. Fails on a down sequencer, a fresh sequencer restart, a
    /// non-positive or stale answer, or a reverting feed.
    pub fn spot_prices(&self, ledger: &Ledger) -> WardenResult<Vec<PriceReading>> {
        self.check_sequencer(ledger)?;

        let now = ledger.timestamp();
        let mut prices = Vec::with_capacity(self.assets.len());

        for info in &self.assets {
            if info.is_yield_bearing {
                continue;
            }
            let price = if info.asset == self.numeraire_token {
                ONE
            } else {
                read_price(ledger, info, now)?
            };
            prices.push(PriceReading { asset: info.asset, price });
        }

        Ok(prices)
    }

    fn check_sequencer(&self, ledger: &Ledger) -> WardenResult<()> {
        let Some(sequencer) = self.sequencer else {
            return Ok(());
        };

        let round = ledger
            .latest_round_data(sequencer)
            .map_err(|revert| WardenError::OracleReverted { oracle: sequencer, revert })?;

        if round.answer == SEQUENCER_DOWN {
            return Err(WardenError::SequencerDown);
        }

        let now = ledger.timestamp();
        if now.saturating_sub(round.started_at) <= SEQUENCER_GRACE_PERIOD {
            return Err(WardenError::GracePeriodNotOver {
                started_at: round.started_at,
                now,
            });
        }

        Ok(())
    }

    // ============ Internal ============

    fn only_owner(&self, caller: Address) -> WardenResult<()> {
        if caller != self.owner {
            return Err(WardenError::CallerIsNotOwner { caller });
        }
        Ok(())
    }

    fn position(&self, asset: Address) -> Result<usize, usize> {
        self.assets.binary_search_by(|info| info.asset.cmp(&asset))
    }

    fn check_required(&self, role: &'static str, asset: Address) -> WardenResult<()> {
        let info = self
            .asset(asset)
            .ok_or(WardenError::RequiredAssetNotRegistered { role, asset })?;
        if info.is_yield_bearing {
            return Err(WardenError::AssetIsYieldBearing { role, asset });
        }
        Ok(())
    }

    fn check_asset(&self, ledger: &Ledger, info: &AssetInfo) -> WardenResult<()> {
        let asset = info.asset;

        if asset == self.numeraire_token {
            if info.oracle.is_some() || info.is_yield_bearing {
                return Err(WardenError::InvalidNumeraire { asset });
            }
            return Ok(());
        }

        if info.is_yield_bearing {
            if info.oracle.is_some() {
                return Err(WardenError::YieldBearingAssetHasOracle { asset });
            }
            let underlying = ledger
                .underlying_of(asset)
                .ok_or(WardenError::NotYieldBearingToken { asset })?;
            let underlying_info = self
                .asset(underlying)
                .ok_or(WardenError::UnderlyingNotRegistered { asset, underlying })?;
            if underlying_info.is_yield_bearing {
                return Err(WardenError::NestedYieldBearingAsset { asset, underlying });
            }
            return Ok(());
        }

        if info.oracle.is_none() {
            return Err(WardenError::OracleMissing { asset });
        }
        if info.heartbeat == 0 || info.heartbeat > MAX_HEARTBEAT {
            return Err(WardenError::InvalidHeartbeat {
                asset,
                heartbeat: info.heartbeat,
            });
        }

        Ok(())
    }
}

/// Read and normalize one feed answer
fn read_price(ledger: &Ledger, info: &AssetInfo, now: u64) -> WardenResult<u128> {
    let asset = info.asset;
    let oracle = info.oracle.ok_or(WardenError::OracleMissing { asset })?;

    let round = ledger
        .latest_round_data(oracle)
        .map_err(|revert| WardenError::OracleReverted { oracle, revert })?;

    if round.answer <= 0 {
        return Err(WardenError::InvalidPrice {
            asset,
            answer: round.answer,
        });
    }

    let deadline = round
        .updated_at
        .saturating_add(info.heartbeat)
        .saturating_add(STALENESS_TOLERANCE);
    if deadline < now {
        return Err(WardenError::StalePrice {
            asset,
            updated_at: round.updated_at,
            now,
        });
    }

    let decimals = ledger
        .feed_decimals(oracle)
        .map_err(|revert| WardenError::OracleReverted { oracle, revert })?;

    rescale(round.answer as u128, decimals, PRICE_DECIMALS)
}

// ============ Tests ============
