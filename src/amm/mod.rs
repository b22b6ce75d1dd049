//! Concentrated-liquidity math for single-sided positions.
//!
//! Pure functions, no state. Amounts, sqrt prices and liquidity are 256-bit
//! integers; only [`tick_math::price_to_tick`] and
//! [`tick_math::price_to_sqrt_price_x96`] touch floating point.

pub mod liquidity;
pub mod position;
pub mod tick_math;

pub use liquidity::{apply_haircut, liquidity_for_amount0, liquidity_for_amount1};
pub use position::{
    derive_single_sided_range, plan_single_sided_position, LiquidityPosition, PoolKey,
    PositionSide, PriceBand, SingleSidedRangeParams, TickRange,
};
pub use tick_math::{
    nearest_usable_tick, price_to_sqrt_price_x96, price_to_tick, sqrt_price_x96_to_price,
    tick_to_sqrt_price_x96, MAX_TICK, MIN_TICK,
};
