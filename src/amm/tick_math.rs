//! Price, tick and Q64.96 sqrt-price conversions.
//!
//! Floating point is confined to the human-facing price <-> tick mapping.
//! [`tick_to_sqrt_price_x96`] is the exact integer ladder used on chain, so a
//! tick that has been rounded never passes through a float again.

use ethers::types::U256;

use crate::prelude::Result;
use crate::Error;

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

/// Number of fractional bits in a Q64.96 value
pub const RESOLUTION: usize = 96;

/// `sqrt(1.0001^-2^i) * 2^128` for bit `i` of the absolute tick, i >= 1
const SQRT_RATIO_LADDER: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

const SQRT_RATIO_BIT0: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

/// 2^96
pub fn q96() -> U256 {
    U256::one() << RESOLUTION
}

fn check_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::InvalidPrice(price));
    }
    Ok(())
}

/// `floor(sqrt(price) * 2^96)`
pub fn price_to_sqrt_price_x96(price: f64) -> Result<U256> {
    check_price(price)?;
    let scaled = price.sqrt() * 2f64.powi(RESOLUTION as i32);
    f64_to_u256(scaled).ok_or(Error::InvalidPrice(price))
}

/// `floor(log(price) / log(1.0001))`
pub fn price_to_tick(price: f64) -> Result<i32> {
    check_price(price)?;
    let tick = (price.ln() / 1.0001f64.ln()).floor();
    if !tick.is_finite() || tick < i32::MIN as f64 || tick > i32::MAX as f64 {
        return Err(Error::InvalidPrice(price));
    }
    Ok(tick as i32)
}

/// Round `tick` to the nearest multiple of `spacing`, halves away from zero.
///
/// The result is not clamped to [`MIN_TICK`, `MAX_TICK`].
pub fn nearest_usable_tick(tick: i32, spacing: i32) -> Result<i32> {
    if spacing <= 0 {
        return Err(Error::InvalidRange(format!(
            "tick spacing must be positive, got {spacing}"
        )));
    }
    let (tick, spacing) = (i64::from(tick), i64::from(spacing));
    let mut quotient = tick / spacing;
    let remainder = tick % spacing;
    if 2 * remainder.abs() >= spacing {
        quotient += remainder.signum();
    }
    i32::try_from(quotient * spacing)
        .map_err(|_| Error::InvalidRange(format!("rounded tick for {tick} overflows i32")))
}

/// Exact Q64.96 sqrt price at `tick`, rounded up like the on-chain library.
pub fn tick_to_sqrt_price_x96(tick: i32) -> Result<U256> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(Error::InvalidRange(format!(
            "tick {tick} outside [{MIN_TICK}, {MAX_TICK}]"
        )));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(SQRT_RATIO_BIT0)
    } else {
        U256::one() << 128
    };
    for (mask, factor) in SQRT_RATIO_LADDER {
        if abs_tick & mask != 0 {
            ratio = (ratio * U256::from(factor)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up
    let round_up = if (ratio & U256::from(u32::MAX)).is_zero() {
        U256::zero()
    } else {
        U256::one()
    };
    Ok((ratio >> 32) + round_up)
}

/// Human price for a Q64.96 sqrt price. Lossy.
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256) -> f64 {
    let sqrt_price = u256_to_f64(sqrt_price_x96) / 2f64.powi(RESOLUTION as i32);
    sqrt_price * sqrt_price
}

/// Truncating conversion; `None` for negative, non-finite or > 256-bit values.
fn f64_to_u256(value: f64) -> Option<U256> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value < 1.0 {
        return Some(U256::zero());
    }
    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32 - 1075;
    let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
    if exponent >= 0 {
        if exponent > 256 - 53 {
            return None;
        }
        Some(U256::from(mantissa) << exponent as usize)
    } else {
        Some(U256::from(mantissa >> exponent.unsigned_abs()))
    }
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * 2f64.powi(64) + *limb as f64)
}
