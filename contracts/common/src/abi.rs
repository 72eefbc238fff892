//! Call Data Codec
//!
//! Minimal ABI encoding used by operations: a 4-byte selector followed by
//! 32-byte big-endian words. Addresses sit in the low 20 bytes of a word and
//! amounts in the low 16 bytes.

use crate::types::{Address, Selector};

/// Size of one argument word
pub const WORD: usize = 32;

/// Well-known selectors
pub mod selectors {
    use crate::types::Selector;

    /// `transfer(address,uint256)`
    pub const TRANSFER: Selector = [0xa9, 0x05, 0x9c, 0xbb];
    /// `transferFrom(address,address,uint256)`
    pub const TRANSFER_FROM: Selector = [0x23, 0xb8, 0x72, 0xdd];
    /// `approve(address,uint256)`
    pub const APPROVE: Selector = [0x09, 0x5e, 0xa7, 0xb3];
    /// `increaseAllowance(address,uint256)`
    pub const INCREASE_ALLOWANCE: Selector = [0x39, 0x50, 0x93, 0x51];
    /// `decreaseAllowance(address,uint256)`
    pub const DECREASE_ALLOWANCE: Selector = [0xa4, 0x57, 0xc2, 0xd7];
    /// `deposit(uint256,address)` on a share vault
    pub const VAULT_DEPOSIT: Selector = [0x6e, 0x55, 0x3f, 0x65];
    /// `withdraw(uint256,address,address)` on a share vault
    pub const VAULT_WITHDRAW: Selector = [0xb4, 0x60, 0xaf, 0x94];
    /// `redeem(uint256,address,address)` on a share vault
    pub const VAULT_REDEEM: Selector = [0xba, 0x08, 0x76, 0x52];
    /// `deposit()` on the wrapped native token
    pub const WRAP: Selector = [0xd0, 0xe3, 0x0d, 0xb0];
    /// `withdraw(uint256)` on the wrapped native token
    pub const UNWRAP: Selector = [0x2e, 0x1a, 0x7d, 0x4d];
}

/// Argument of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Address argument
    Address(Address),
    /// Unsigned amount argument
    Uint(u128),
}

/// Encode a call
pub fn encode_call(selector: Selector, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD);
    data.extend_from_slice(&selector);
    for arg in args {
        let mut word = [0u8; WORD];
        match arg {
            Token::Address(addr) => word[12..].copy_from_slice(addr),
            Token::Uint(value) => word[16..].copy_from_slice(&value.to_be_bytes()),
        }
        data.extend_from_slice(&word);
    }
    data
}

fn word(data: &[u8], index: usize) -> Option<&[u8]> {
    let start = 4 + index * WORD;
    data.get(start..start + WORD)
}

/// Decode the address argument at `index`
pub fn address_arg(data: &[u8], index: usize) -> Option<Address> {
    let w = word(data, index)?;
    if w[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&w[12..]);
    Some(addr)
}

/// Decode the amount argument at `index` (None when it exceeds u128)
pub fn uint_arg(data: &[u8], index: usize) -> Option<u128> {
    let w = word(data, index)?;
    if w[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&w[16..]);
    Some(u128::from_be_bytes(bytes))
}

/// Encode a single amount as return data
pub fn encode_uint(value: u128) -> Vec<u8> {
    let mut word = vec![0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encode a boolean as return data
pub fn encode_bool(value: bool) -> Vec<u8> {
    encode_uint(value as u128)
}

// ============ Call Builders ============

/// `transfer(to, amount)`
pub fn transfer(to: Address, amount: u128) -> Vec<u8> {
    encode_call(selectors::TRANSFER, &[Token::Address(to), Token::Uint(amount)])
}

/// `transferFrom(from, to, amount)`
pub fn transfer_from(from: Address, to: Address, amount: u128) -> Vec<u8> {
    encode_call(
        selectors::TRANSFER_FROM,
        &[Token::Address(from), Token::Address(to), Token::Uint(amount)],
    )
}

/// `approve(spender, amount)`
pub fn approve(spender: Address, amount: u128) -> Vec<u8> {
    encode_call(selectors::APPROVE, &[Token::Address(spender), Token::Uint(amount)])
}

/// `increaseAllowance(spender, added)`
pub fn increase_allowance(spender: Address, added: u128) -> Vec<u8> {
    encode_call(selectors::INCREASE_ALLOWANCE, &[Token::Address(spender), Token::Uint(added)])
}

/// `redeem(shares, receiver, owner)`
pub fn redeem(shares: u128, receiver: Address, owner: Address) -> Vec<u8> {
    encode_call(
        selectors::VAULT_REDEEM,
        &[Token::Uint(shares), Token::Address(receiver), Token::Address(owner)],
    )
}

/// `withdraw(assets, receiver, owner)` on a share vault
pub fn vault_withdraw(assets: u128, receiver: Address, owner: Address) -> Vec<u8> {
    encode_call(
        selectors::VAULT_WITHDRAW,
        &[Token::Uint(assets), Token::Address(receiver), Token::Address(owner)],
    )
}

/// `deposit(assets, receiver)` on a share vault
pub fn vault_deposit(assets: u128, receiver: Address) -> Vec<u8> {
    encode_call(selectors::VAULT_DEPOSIT, &[Token::Uint(assets), Token::Address(receiver)])
}
