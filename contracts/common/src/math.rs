//! Mathematical Utilities for the Warden Vault
//!
//! Checked fixed-point arithmetic. Every multiply-then-divide goes through
//! a 256-bit intermediate so that `balance * price` never overflows before
//! the division brings it back into range.

use crate::errors::{WardenError, WardenResult};

const LOW_MASK: u128 = u64::MAX as u128;

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> WardenResult<u128> {
    a.checked_add(b).ok_or(WardenError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> WardenResult<u128> {
    a.checked_sub(b).ok_or(WardenError::Underflow)
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: u128, b: u128) -> WardenResult<u128> {
    a.checked_mul(b).ok_or(WardenError::Overflow)
}

/// 10^exp, failing past 10^38
pub fn pow10(exp: u8) -> WardenResult<u128> {
    10u128.checked_pow(exp as u32).ok_or(WardenError::Overflow)
}

/// Full 256-bit product of two u128 values as (high, low)
fn full_mul(a: u128, b: u128) -> (u128, u128) {
    let (a_hi, a_lo) = (a >> 64, a & LOW_MASK);
    let (b_hi, b_lo) = (b >> 64, b & LOW_MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    // Fits: at most 3 * (2^64 - 1)
    let mid = (ll >> 64) + (lh & LOW_MASK) + (hl & LOW_MASK);
    let lo = (ll & LOW_MASK) | (mid << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// Divide a 256-bit value by `d`, returning (quotient, remainder).
/// Requires `hi < d` so the quotient fits in 128 bits.
fn div_wide(hi: u128, lo: u128, d: u128) -> (u128, u128) {
    let mut rem = hi;
    let mut quot = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quot |= 1u128 << i;
        }
    }
    (quot, rem)
}

/// floor(a * b / denominator)
pub fn mul_div(a: u128, b: u128, denominator: u128) -> WardenResult<u128> {
    if denominator == 0 {
        return Err(WardenError::DivisionByZero);
    }
    let (hi, lo) = full_mul(a, b);
    if hi == 0 {
        return Ok(lo / denominator);
    }
    if hi >= denominator {
        return Err(WardenError::Overflow);
    }
    Ok(div_wide(hi, lo, denominator).0)
}

/// ceil(a * b / denominator)
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> WardenResult<u128> {
    if denominator == 0 {
        return Err(WardenError::DivisionByZero);
    }
    let (hi, lo) = full_mul(a, b);
    let (quot, rem) = if hi == 0 {
        (lo / denominator, lo % denominator)
    } else if hi >= denominator {
        return Err(WardenError::Overflow);
    } else {
        div_wide(hi, lo, denominator)
    };
    if rem > 0 {
        safe_add(quot, 1)
    } else {
        Ok(quot)
    }
}

/// Move `amount` from `from` decimals to `to` decimals (rounding down)
pub fn rescale(amount: u128, from: u8, to: u8) -> WardenResult<u128> {
    if from == to {
        Ok(amount)
    } else if from > to {
        Ok(amount / pow10(from - to)?)
    } else {
        safe_mul(amount, pow10(to - from)?)
    }
}

/// Value of `balance` units of an asset with `decimals` at an 18-decimal price.
///
/// Result is in 18 decimals of the numeraire.
pub fn asset_value(balance: u128, price: u128, decimals: u8) -> WardenResult<u128> {
    mul_div(balance, price, pow10(decimals)?)
}
