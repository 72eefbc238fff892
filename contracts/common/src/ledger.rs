//! In-Memory Ledger
//!
//! Host environment the vault runs against: block time, native balances,
//! fungible tokens (plain, wrapped native and share vaults), price feeds and
//! arbitrary call targets. The ledger is `Clone` so callers can snapshot it
//! and roll back a failed transaction.
//!
//! `call` is the only entry point that dispatches encoded call data. A failed
//! call leaves the ledger exactly as it was before the call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::abi::{self, selectors};
use crate::constants::precision::ONE;
use crate::errors::{WardenError, WardenResult};
use crate::math::{mul_div, mul_div_up, safe_add, safe_sub};
use crate::types::{Address, Revert, RoundData, Selector};

/// Contract deployed at an address that is neither a token nor a feed.
///
/// Implementations receive the ledger mutably and may move tokens, issue
/// nested calls or fail with revert data.
pub trait ExternalTarget {
    fn call(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        value: u128,
        data: &[u8],
    ) -> Result<Vec<u8>, Revert>;
}

/// Token flavour
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Plain fungible token
    Plain,
    /// Token minted one-for-one against the native currency
    WrappedNative,
    /// Share vault over an underlying token
    YieldBearing {
        underlying: Address,
        /// Underlying units per share unit, 18 decimals
        assets_per_share: u128,
        /// Forced failure of `convert_to_assets`
        convert_revert: Option<Revert>,
    },
}

#[derive(Debug, Clone)]
struct TokenState {
    decimals: u8,
    kind: TokenKind,
    total_supply: u128,
    balances: BTreeMap<Address, u128>,
    allowances: BTreeMap<(Address, Address), u128>,
}

impl TokenState {
    fn new(decimals: u8, kind: TokenKind) -> Self {
        Self {
            decimals,
            kind,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }
}

/// Price feed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFeed {
    pub decimals: u8,
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    /// Forced failure of `latest_round_data`
    pub revert: Option<Revert>,
}

/// In-memory chain state
#[derive(Clone, Default)]
pub struct Ledger {
    timestamp: u64,
    native: BTreeMap<Address, u128>,
    tokens: BTreeMap<Address, TokenState>,
    feeds: BTreeMap<Address, PriceFeed>,
    targets: BTreeMap<Address, Arc<dyn ExternalTarget>>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("timestamp", &self.timestamp)
            .field("native", &self.native)
            .field("tokens", &self.tokens)
            .field("feeds", &self.feeds)
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn revert_of(err: WardenError) -> Revert {
    Revert::reason(err.code())
}

impl Ledger {
    /// Create an empty ledger at `timestamp`
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    // ============ Time ============

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn advance(&mut self, seconds: u64) {
        self.timestamp = self.timestamp.saturating_add(seconds);
    }

    // ============ Token Setup ============

    /// Deploy a plain token
    pub fn create_token(&mut self, token: Address, decimals: u8) {
        self.tokens.insert(token, TokenState::new(decimals, TokenKind::Plain));
    }

    /// Deploy the wrapped native token (18 decimals)
    pub fn create_wrapped_native(&mut self, token: Address) {
        self.tokens.insert(token, TokenState::new(18, TokenKind::WrappedNative));
    }

    /// Deploy a share vault over `underlying` at a 1:1 rate
    pub fn create_yield_bearing(
        &mut self,
        token: Address,
        underlying: Address,
        decimals: u8,
    ) -> WardenResult<()> {
        if !self.tokens.contains_key(&underlying) {
            return Err(WardenError::UnknownToken { token: underlying });
        }
        let kind = TokenKind::YieldBearing {
            underlying,
            assets_per_share: ONE,
            convert_revert: None,
        };
        self.tokens.insert(token, TokenState::new(decimals, kind));
        Ok(())
    }

    /// Set the share conversion rate (underlying units per share unit, 18 decimals)
    pub fn set_share_rate(&mut self, token: Address, rate: u128) -> WardenResult<()> {
        match self.token_mut(token)?.kind {
            TokenKind::YieldBearing { ref mut assets_per_share, .. } => {
                *assets_per_share = rate;
                Ok(())
            }
            _ => Err(WardenError::NotYieldBearingToken { asset: token }),
        }
    }

    /// Force `convert_to_assets` to fail (or clear the failure)
    pub fn set_conversion_revert(&mut self, token: Address, revert: Option<Revert>) -> WardenResult<()> {
        match self.token_mut(token)?.kind {
            TokenKind::YieldBearing { ref mut convert_revert, .. } => {
                *convert_revert = revert;
                Ok(())
            }
            _ => Err(WardenError::NotYieldBearingToken { asset: token }),
        }
    }

    // ============ Token Queries ============

    pub fn balance_of(&self, token: Address, holder: Address) -> u128 {
        self.tokens
            .get(&token)
            .and_then(|t| t.balances.get(&holder).copied())
            .unwrap_or(0)
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> u128 {
        self.tokens
            .get(&token)
            .and_then(|t| t.allowances.get(&(owner, spender)).copied())
            .unwrap_or(0)
    }

    pub fn total_supply(&self, token: Address) -> u128 {
        self.tokens.get(&token).map(|t| t.total_supply).unwrap_or(0)
    }

    pub fn decimals(&self, token: Address) -> WardenResult<u8> {
        self.token(token).map(|t| t.decimals)
    }

    pub fn token_kind(&self, token: Address) -> Option<&TokenKind> {
        self.tokens.get(&token).map(|t| &t.kind)
    }

    /// Underlying of a share vault, `None` for other tokens
    pub fn underlying_of(&self, token: Address) -> Option<Address> {
        match self.token_kind(token) {
            Some(TokenKind::YieldBearing { underlying, .. }) => Some(*underlying),
            _ => None,
        }
    }

    /// Underlying units redeemable for `shares`
    pub fn convert_to_assets(&self, token: Address, shares: u128) -> Result<u128, Revert> {
        match self.token_kind(token) {
            Some(TokenKind::YieldBearing {
                assets_per_share,
                convert_revert,
                ..
            }) => {
                if let Some(revert) = convert_revert {
                    return Err(revert.clone());
                }
                mul_div(shares, *assets_per_share, ONE).map_err(revert_of)
            }
            _ => Err(Revert::silent()),
        }
    }

    // ============ Token Mutations ============

    pub fn mint(&mut self, token: Address, to: Address, amount: u128) -> WardenResult<()> {
        let state = self.token_mut(token)?;
        state.total_supply = safe_add(state.total_supply, amount)?;
        let balance = state.balances.entry(to).or_insert(0);
        *balance = safe_add(*balance, amount)?;
        Ok(())
    }

    fn burn(&mut self, token: Address, from: Address, amount: u128) -> WardenResult<()> {
        let state = self.token_mut(token)?;
        let balance = state.balances.get(&from).copied().unwrap_or(0);
        if balance < amount {
            return Err(WardenError::InsufficientBalance {
                token,
                available: balance,
                requested: amount,
            });
        }
        state.balances.insert(from, balance - amount);
        state.total_supply = safe_sub(state.total_supply, amount)?;
        Ok(())
    }

    pub fn approve(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> WardenResult<()> {
        self.token_mut(token)?.allowances.insert((owner, spender), amount);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> WardenResult<()> {
        let state = self.token_mut(token)?;
        let from_balance = state.balances.get(&from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(WardenError::InsufficientBalance {
                token,
                available: from_balance,
                requested: amount,
            });
        }
        state.balances.insert(from, from_balance - amount);
        let to_balance = state.balances.entry(to).or_insert(0);
        *to_balance = safe_add(*to_balance, amount)?;
        Ok(())
    }

    /// Move tokens on behalf of `from`, spending `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> WardenResult<()> {
        self.spend_allowance(token, from, spender, amount)?;
        self.transfer(token, from, to, amount)
    }

    fn spend_allowance(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> WardenResult<()> {
        let current = self.allowance(token, owner, spender);
        if current == u128::MAX {
            return Ok(());
        }
        if current < amount {
            return Err(WardenError::InsufficientAllowance {
                token,
                available: current,
                requested: amount,
            });
        }
        self.approve(token, owner, spender, current - amount)
    }

    fn token(&self, token: Address) -> WardenResult<&TokenState> {
        self.tokens.get(&token).ok_or(WardenError::UnknownToken { token })
    }

    fn token_mut(&mut self, token: Address) -> WardenResult<&mut TokenState> {
        self.tokens.get_mut(&token).ok_or(WardenError::UnknownToken { token })
    }

    // ============ Native Currency ============

    pub fn native_balance(&self, holder: Address) -> u128 {
        self.native.get(&holder).copied().unwrap_or(0)
    }

    pub fn credit_native(&mut self, holder: Address, amount: u128) -> WardenResult<()> {
        let balance = self.native.entry(holder).or_insert(0);
        *balance = safe_add(*balance, amount)?;
        Ok(())
    }

    fn move_native(&mut self, from: Address, to: Address, amount: u128) -> WardenResult<()> {
        let available = self.native_balance(from);
        if available < amount {
            return Err(WardenError::InsufficientBalance {
                token: [0u8; 20],
                available,
                requested: amount,
            });
        }
        self.native.insert(from, available - amount);
        self.credit_native(to, amount)
    }

    // ============ Price Feeds ============

    /// Deploy a feed reporting with `decimals`
    pub fn create_feed(&mut self, feed: Address, decimals: u8) {
        self.feeds.insert(
            feed,
            PriceFeed {
                decimals,
                answer: 0,
                started_at: self.timestamp,
                updated_at: self.timestamp,
                revert: None,
            },
        );
    }

    /// Publish a fresh answer at the current time
    pub fn set_price(&mut self, feed: Address, answer: i128) -> WardenResult<()> {
        let now = self.timestamp;
        self.set_round(feed, answer, now, now)
    }

    pub fn set_round(
        &mut self,
        feed: Address,
        answer: i128,
        started_at: u64,
        updated_at: u64,
    ) -> WardenResult<()> {
        let state = self.feeds.get_mut(&feed).ok_or(WardenError::UnknownFeed { feed })?;
        state.answer = answer;
        state.started_at = started_at;
        state.updated_at = updated_at;
        Ok(())
    }

    /// Force the feed to fail (or clear the failure)
    pub fn set_feed_revert(&mut self, feed: Address, revert: Option<Revert>) -> WardenResult<()> {
        self.feeds
            .get_mut(&feed)
            .ok_or(WardenError::UnknownFeed { feed })?
            .revert = revert;
        Ok(())
    }

    /// Report sequencer status: answer 0 is up, 1 is down, `since` is the round start
    pub fn set_sequencer(&mut self, feed: Address, up: bool, since: u64) -> WardenResult<()> {
        let now = self.timestamp;
        self.set_round(feed, if up { 0 } else { 1 }, since, now)
    }

    pub fn latest_round_data(&self, feed: Address) -> Result<RoundData, Revert> {
        let state = self.feeds.get(&feed).ok_or_else(Revert::silent)?;
        if let Some(revert) = &state.revert {
            return Err(revert.clone());
        }
        Ok(RoundData {
            answer: state.answer,
            started_at: state.started_at,
            updated_at: state.updated_at,
        })
    }

    pub fn feed_decimals(&self, feed: Address) -> Result<u8, Revert> {
        self.feeds.get(&feed).map(|f| f.decimals).ok_or_else(Revert::silent)
    }

    // ============ Contracts ============

    /// Install a contract at `address`
    pub fn deploy_target(&mut self, address: Address, target: Arc<dyn ExternalTarget>) {
        self.targets.insert(address, target);
    }

    /// Whether `address` holds code
    pub fn has_code(&self, address: Address) -> bool {
        self.tokens.contains_key(&address)
            || self.feeds.contains_key(&address)
            || self.targets.contains_key(&address)
    }

    /// Perform a call from `from` to `target` carrying `value` native units
    pub fn call(
        &mut self,
        from: Address,
        target: Address,
        value: u128,
        data: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        let snapshot = self.clone();
        let result = self.dispatch(from, target, value, data);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    fn dispatch(
        &mut self,
        from: Address,
        target: Address,
        value: u128,
        data: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        if value > 0 {
            self.move_native(from, target, value).map_err(revert_of)?;
        }

        if let Some(handler) = self.targets.get(&target).cloned() {
            return handler.call(self, from, value, data);
        }

        if self.feeds.contains_key(&target) {
            return Err(Revert::silent());
        }

        let kind = match self.tokens.get(&target) {
            Some(state) => state.kind.clone(),
            // No code: the call succeeds and does nothing
            None => return Ok(Vec::new()),
        };

        let selector: Selector = match data.get(..4) {
            Some(s) => [s[0], s[1], s[2], s[3]],
            None => return Err(Revert::silent()),
        };

        if value > 0 && !(kind == TokenKind::WrappedNative && selector == selectors::WRAP) {
            return Err(Revert::reason("non-payable"));
        }

        match selector {
            selectors::TRANSFER => {
                let to = address(data, 0)?;
                let amount = uint(data, 1)?;
                self.transfer(target, from, to, amount).map_err(revert_of)?;
                Ok(abi::encode_bool(true))
            }
            selectors::TRANSFER_FROM => {
                let owner = address(data, 0)?;
                let to = address(data, 1)?;
                let amount = uint(data, 2)?;
                self.transfer_from(target, from, owner, to, amount).map_err(revert_of)?;
                Ok(abi::encode_bool(true))
            }
            selectors::APPROVE => {
                let spender = address(data, 0)?;
                let amount = uint(data, 1)?;
                self.approve(target, from, spender, amount).map_err(revert_of)?;
                Ok(abi::encode_bool(true))
            }
            selectors::INCREASE_ALLOWANCE => {
                let spender = address(data, 0)?;
                let added = uint(data, 1)?;
                let current = self.allowance(target, from, spender);
                let updated = safe_add(current, added).map_err(revert_of)?;
                self.approve(target, from, spender, updated).map_err(revert_of)?;
                Ok(abi::encode_bool(true))
            }
            selectors::DECREASE_ALLOWANCE => {
                let spender = address(data, 0)?;
                let removed = uint(data, 1)?;
                let current = self.allowance(target, from, spender);
                let updated = safe_sub(current, removed).map_err(revert_of)?;
                self.approve(target, from, spender, updated).map_err(revert_of)?;
                Ok(abi::encode_bool(true))
            }
            _ => match kind {
                TokenKind::WrappedNative => self.dispatch_wrapped(from, target, value, selector, data),
                TokenKind::YieldBearing {
                    underlying,
                    assets_per_share,
                    ..
                } => self.dispatch_shares(from, target, underlying, assets_per_share, selector, data),
                TokenKind::Plain => Err(Revert::silent()),
            },
        }
    }

    fn dispatch_wrapped(
        &mut self,
        from: Address,
        token: Address,
        value: u128,
        selector: Selector,
        data: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        match selector {
            selectors::WRAP => {
                self.mint(token, from, value).map_err(revert_of)?;
                Ok(Vec::new())
            }
            selectors::UNWRAP => {
                let amount = uint(data, 0)?;
                self.burn(token, from, amount).map_err(revert_of)?;
                self.move_native(token, from, amount).map_err(revert_of)?;
                Ok(Vec::new())
            }
            _ => Err(Revert::silent()),
        }
    }

    fn dispatch_shares(
        &mut self,
        from: Address,
        token: Address,
        underlying: Address,
        rate: u128,
        selector: Selector,
        data: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        match selector {
            selectors::VAULT_DEPOSIT => {
                let assets = uint(data, 0)?;
                let receiver = address(data, 1)?;
                let shares = mul_div(assets, ONE, rate).map_err(revert_of)?;
                self.transfer_from(underlying, token, from, token, assets)
                    .map_err(revert_of)?;
                self.mint(token, receiver, shares).map_err(revert_of)?;
                Ok(abi::encode_uint(shares))
            }
            selectors::VAULT_WITHDRAW => {
                let assets = uint(data, 0)?;
                let receiver = address(data, 1)?;
                let owner = address(data, 2)?;
                let shares = mul_div_up(assets, ONE, rate).map_err(revert_of)?;
                self.exit_shares(from, token, underlying, owner, receiver, shares, assets)?;
                Ok(abi::encode_uint(shares))
            }
            selectors::VAULT_REDEEM => {
                let shares = uint(data, 0)?;
                let receiver = address(data, 1)?;
                let owner = address(data, 2)?;
                let assets = mul_div(shares, rate, ONE).map_err(revert_of)?;
                self.exit_shares(from, token, underlying, owner, receiver, shares, assets)?;
                Ok(abi::encode_uint(assets))
            }
            _ => Err(Revert::silent()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn exit_shares(
        &mut self,
        caller: Address,
        token: Address,
        underlying: Address,
        owner: Address,
        receiver: Address,
        shares: u128,
        assets: u128,
    ) -> Result<(), Revert> {
        if caller != owner {
            self.spend_allowance(token, owner, caller, shares).map_err(revert_of)?;
        }
        self.burn(token, owner, shares).map_err(revert_of)?;
        self.transfer(underlying, token, receiver, assets).map_err(revert_of)
    }
}

fn address(data: &[u8], index: usize) -> Result<Address, Revert> {
    abi::address_arg(data, index).ok_or_else(|| Revert::reason("bad calldata"))
}

fn uint(data: &[u8], index: usize) -> Result<u128, Revert> {
    abi::uint_arg(data, index).ok_or_else(|| Revert::reason("bad calldata"))
}
