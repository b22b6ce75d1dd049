//! Liquidity sizing for a concentrated-liquidity range.
//!
//! Intermediates are carried in 512 bits so the products of two Q64.96 values
//! and a full 256-bit amount cannot overflow.

use ethers::types::{U256, U512};

use crate::amm::tick_math::q96;
use crate::prelude::Result;
use crate::Error;

const HAIRCUT_NUMERATOR: u64 = 999;
const HAIRCUT_DENOMINATOR: u64 = 1000;

fn ordered(sqrt_price_a_x96: U256, sqrt_price_b_x96: U256) -> Result<(U256, U256)> {
    if sqrt_price_a_x96 == sqrt_price_b_x96 {
        return Err(Error::InvalidRange(format!(
            "price bounds are equal ({sqrt_price_a_x96})"
        )));
    }
    if sqrt_price_a_x96 > sqrt_price_b_x96 {
        Ok((sqrt_price_b_x96, sqrt_price_a_x96))
    } else {
        Ok((sqrt_price_a_x96, sqrt_price_b_x96))
    }
}

fn narrow(value: U512, context: &'static str) -> Result<U256> {
    U256::try_from(value).map_err(|_| Error::ArithmeticOverflow(context))
}

/// `amount0 * (sqrtA * sqrtB / Q96) / (sqrtB - sqrtA)`
pub fn liquidity_for_amount0(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    amount0: U256,
) -> Result<U256> {
    let (lower, upper) = ordered(sqrt_price_a_x96, sqrt_price_b_x96)?;
    let intermediate = lower.full_mul(upper) / U512::from(q96());
    let numerator = U512::from(amount0)
        .checked_mul(intermediate)
        .ok_or(Error::ArithmeticOverflow("liquidity_for_amount0"))?;
    narrow(numerator / U512::from(upper - lower), "liquidity_for_amount0")
}

/// `amount1 * Q96 / (sqrtB - sqrtA)`
pub fn liquidity_for_amount1(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    amount1: U256,
) -> Result<U256> {
    let (lower, upper) = ordered(sqrt_price_a_x96, sqrt_price_b_x96)?;
    let numerator = amount1.full_mul(q96());
    narrow(numerator / U512::from(upper - lower), "liquidity_for_amount1")
}

/// Shave 0.1% off a computed liquidity so the on-chain re-derivation of the
/// required amount never exceeds what was offered.
pub fn apply_haircut(liquidity: U256) -> U256 {
    let scaled = liquidity.full_mul(U256::from(HAIRCUT_NUMERATOR)) / U512::from(HAIRCUT_DENOMINATOR);
    // scaled < liquidity, so it always fits
    U256::try_from(scaled).unwrap_or(liquidity)
}
