//! Valuation Engine
//!
//! Turns vault holdings into one scalar value in the numeraire's native
//! decimals. Yield-bearing holdings are converted to their underlying first
//! and priced with the underlying's price and decimals.

use warden_asset_registry::AssetRegistry;
use warden_common::{
    constants::precision::PRICE_DECIMALS,
    errors::{WardenError, WardenResult},
    ledger::Ledger,
    math::{asset_value, rescale, safe_add},
    types::{Address, AssetValue, PriceReading},
};
use warden_hooks::VaultView;

/// Result of one valuation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Valuation {
    /// Vault value in numeraire units
    pub value: u128,
    /// Fee token price, 18 decimals
    pub fee_token_price: u128,
}

/// Balances of every registered asset held by `vault`.
///
/// The fee token balance excludes fees reserved for recipients.
pub fn holdings(ledger: &Ledger, registry: &AssetRegistry, vault: Address, fee_total: u128) -> Vec<AssetValue> {
    registry
        .assets()
        .iter()
        .map(|info| {
            let mut balance = ledger.balance_of(info.asset, vault);
            if info.asset == registry.fee_token() {
                balance = balance.saturating_sub(fee_total);
            }
            AssetValue::new(info.asset, balance)
        })
        .collect()
}

fn price_of(prices: &[PriceReading], asset: Address) -> WardenResult<u128> {
    prices
        .binary_search_by(|reading| reading.asset.cmp(&asset))
        .map(|i| prices[i].price)
        .map_err(|_| WardenError::AssetNotRegistered { asset })
}

/// Value `holdings` at current spot prices
pub fn value(ledger: &Ledger, registry: &AssetRegistry, holdings: &[AssetValue]) -> WardenResult<Valuation> {
    // Readings come out in registry order, so they stay sorted
    let prices = registry.spot_prices(ledger)?;

    let mut total = 0u128;
    for holding in holdings {
        if holding.value == 0 {
            continue;
        }

        let info = registry
            .asset(holding.asset)
            .ok_or(WardenError::AssetNotRegistered { asset: holding.asset })?;

        let (priced_asset, amount) = if info.is_yield_bearing {
            let underlying = ledger
                .underlying_of(info.asset)
                .ok_or(WardenError::NotYieldBearingToken { asset: info.asset })?;
            let assets = ledger
                .convert_to_assets(info.asset, holding.value)
                .map_err(|revert| WardenError::ConversionReverted {
                    asset: info.asset,
                    revert,
                })?;
            (underlying, assets)
        } else {
            (info.asset, holding.value)
        };

        let price = price_of(&prices, priced_asset)?;
        let decimals = ledger.decimals(priced_asset)?;
        total = safe_add(total, asset_value(amount, price, decimals)?)?;
    }

    let numeraire_decimals = ledger.decimals(registry.numeraire_token())?;

    Ok(Valuation {
        value: rescale(total, PRICE_DECIMALS, numeraire_decimals)?,
        fee_token_price: price_of(&prices, registry.fee_token())?,
    })
}

// ============ Vault View ============

/// Borrowed view of a vault handed to hooks
pub struct Snapshot<'a> {
    pub address: Address,
    pub ledger: &'a Ledger,
    pub registry: &'a AssetRegistry,
    pub fee_total: u128,
}

impl<'a> Snapshot<'a> {
    pub fn new(address: Address, ledger: &'a Ledger, registry: &'a AssetRegistry, fee_total: u128) -> Self {
        Self {
            address,
            ledger,
            registry,
            fee_total,
        }
    }
}

impl<'a> VaultView for Snapshot<'a> {
    fn address(&self) -> Address {
        self.address
    }

    fn timestamp(&self) -> u64 {
        self.ledger.timestamp()
    }

    fn value(&self) -> WardenResult<u128> {
        let holdings = holdings(self.ledger, self.registry, self.address, self.fee_total);
        value(self.ledger, self.registry, &holdings).map(|v| v.value)
    }

    fn allowance(&self, token: Address, spender: Address) -> u128 {
        self.ledger.allowance(token, self.address, spender)
    }
}
