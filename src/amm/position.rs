use ethers::abi::{self, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use log::info;
use serde::Serialize;

use crate::amm::liquidity::{apply_haircut, liquidity_for_amount0, liquidity_for_amount1};
use crate::amm::tick_math::{
    nearest_usable_tick, price_to_tick, tick_to_sqrt_price_x96, MAX_TICK, MIN_TICK,
};
use crate::prelude::Result;
use crate::Error;

const MAX_FEE: u32 = 0xff_ffff;

/// Which of the pool's two currencies a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionSide {
    Currency0,
    Currency1,
}

/// Identifies a pool. Currencies are always stored in ascending address order
/// regardless of the order they were supplied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolKey {
    pub currency0: Address,
    pub currency1: Address,
    /// Fee in hundredths of a bip (10000 = 1%)
    pub fee: u32,
    pub tick_spacing: i32,
    pub hooks: Option<Address>,
}

impl PoolKey {
    pub fn new(
        token_a: Address,
        token_b: Address,
        fee: u32,
        tick_spacing: i32,
        hooks: Option<Address>,
    ) -> Result<Self> {
        if token_a == token_b {
            return Err(Error::InvalidPoolKey(format!(
                "both currencies are {token_a:?}"
            )));
        }
        if fee > MAX_FEE {
            return Err(Error::InvalidPoolKey(format!("fee {fee} does not fit in uint24")));
        }
        if tick_spacing <= 0 {
            return Err(Error::InvalidPoolKey(format!(
                "tick spacing must be positive, got {tick_spacing}"
            )));
        }
        let (currency0, currency1) = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        Ok(Self {
            currency0,
            currency1,
            fee,
            tick_spacing,
            hooks,
        })
    }

    pub fn side_of(&self, token: Address) -> Option<PositionSide> {
        if token == self.currency0 {
            Some(PositionSide::Currency0)
        } else if token == self.currency1 {
            Some(PositionSide::Currency1)
        } else {
            None
        }
    }

    /// `keccak256(abi.encode(currency0, currency1, fee, tickSpacing, hooks))`
    pub fn pool_id(&self) -> H256 {
        let encoded = abi::encode(&[
            Token::Address(self.currency0),
            Token::Address(self.currency1),
            Token::Uint(U256::from(self.fee)),
            Token::Int(U256::from(self.tick_spacing.unsigned_abs())),
            Token::Address(self.hooks.unwrap_or_else(Address::zero)),
        ]);
        H256::from(keccak256(encoded))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickRange {
    pub tick_lower: i32,
    pub tick_upper: i32,
}

impl TickRange {
    pub fn new(tick_lower: i32, tick_upper: i32, tick_spacing: i32) -> Result<Self> {
        if tick_spacing <= 0 {
            return Err(Error::InvalidRange(format!(
                "tick spacing must be positive, got {tick_spacing}"
            )));
        }
        if tick_lower % tick_spacing != 0 || tick_upper % tick_spacing != 0 {
            return Err(Error::InvalidRange(format!(
                "ticks {tick_lower}..{tick_upper} are not multiples of {tick_spacing}"
            )));
        }
        if tick_lower >= tick_upper {
            return Err(Error::InvalidRange(format!(
                "tick_lower {tick_lower} is not below tick_upper {tick_upper}"
            )));
        }
        Ok(Self {
            tick_lower,
            tick_upper,
        })
    }
}

/// Target price band in quote units per base token (e.g. USDC per token)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBand {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleSidedRangeParams {
    pub band: PriceBand,
    /// `quote_decimals - base_decimals`; e.g. -12 for a USDC quote on an 18
    /// decimal token
    pub decimals_adjustment: i32,
    /// Pool side of the token being deposited
    pub side: PositionSide,
    pub tick_spacing: i32,
    pub current_tick: i32,
}

/// Turn a human price band into a usable tick range that only needs the
/// deposited token.
///
/// For a currency0 deposit the lower tick is pushed strictly above the
/// current tick; for a currency1 deposit the upper tick is pushed strictly
/// below it. A clamp that collapses the range is an error.
pub fn derive_single_sided_range(params: &SingleSidedRangeParams) -> Result<TickRange> {
    let spacing = params.tick_spacing;
    let (pool_lower, pool_upper) = match params.side {
        // pool price = quote / base
        PositionSide::Currency0 => {
            let scale = 10f64.powi(params.decimals_adjustment);
            (params.band.lower * scale, params.band.upper * scale)
        }
        // pool price = base / quote
        PositionSide::Currency1 => {
            let scale = 10f64.powi(-params.decimals_adjustment);
            ((1.0 / params.band.upper) * scale, (1.0 / params.band.lower) * scale)
        }
    };

    let mut tick_lower = nearest_usable_tick(price_to_tick(pool_lower)?, spacing)?;
    let mut tick_upper = nearest_usable_tick(price_to_tick(pool_upper)?, spacing)?;
    if tick_lower > tick_upper {
        std::mem::swap(&mut tick_lower, &mut tick_upper);
    }

    let current_tick = params.current_tick;
    if !(MIN_TICK..=MAX_TICK).contains(&current_tick) {
        return Err(Error::InvalidRange(format!(
            "current tick {current_tick} outside [{MIN_TICK}, {MAX_TICK}]"
        )));
    }
    match params.side {
        PositionSide::Currency0 if tick_lower <= current_tick => {
            tick_lower = nearest_usable_tick(current_tick + spacing, spacing)?;
            info!("Adjusted tickLower to {tick_lower} to keep the deposit single-sided");
        }
        PositionSide::Currency1 if tick_upper >= current_tick => {
            tick_upper = nearest_usable_tick(current_tick - spacing, spacing)?;
            info!("Adjusted tickUpper to {tick_upper} to keep the deposit single-sided");
        }
        _ => {}
    }

    TickRange::new(tick_lower, tick_upper, spacing)
}

/// Sized single-sided position. The side not being deposited has a zero cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityPosition {
    pub pool_key: PoolKey,
    pub range: TickRange,
    pub side: PositionSide,
    pub liquidity: u128,
    pub amount0_max: U256,
    pub amount1_max: U256,
}

impl LiquidityPosition {
    pub fn single_sided(
        pool_key: PoolKey,
        range: TickRange,
        side: PositionSide,
        amount: U256,
    ) -> Result<Self> {
        let range = TickRange::new(range.tick_lower, range.tick_upper, pool_key.tick_spacing)?;
        let sqrt_lower = tick_to_sqrt_price_x96(range.tick_lower)?;
        let sqrt_upper = tick_to_sqrt_price_x96(range.tick_upper)?;

        let (raw, amount0_max, amount1_max) = match side {
            PositionSide::Currency0 => (
                liquidity_for_amount0(sqrt_lower, sqrt_upper, amount)?,
                amount,
                U256::zero(),
            ),
            PositionSide::Currency1 => (
                liquidity_for_amount1(sqrt_lower, sqrt_upper, amount)?,
                U256::zero(),
                amount,
            ),
        };

        let liquidity = apply_haircut(raw);
        if liquidity.bits() > 128 {
            return Err(Error::ArithmeticOverflow("position liquidity exceeds uint128"));
        }

        Ok(Self {
            pool_key,
            range,
            side,
            liquidity: liquidity.as_u128(),
            amount0_max,
            amount1_max,
        })
    }
}

/// Derive the range for `token` in `pool_key` and size a deposit of `amount`.
pub fn plan_single_sided_position(
    pool_key: PoolKey,
    token: Address,
    band: PriceBand,
    decimals_adjustment: i32,
    current_tick: i32,
    amount: U256,
) -> Result<LiquidityPosition> {
    let side = pool_key.side_of(token).ok_or_else(|| {
        Error::InvalidPoolKey(format!("{token:?} is not a currency of this pool"))
    })?;
    let range = derive_single_sided_range(&SingleSidedRangeParams {
        band,
        decimals_adjustment,
        side,
        tick_spacing: pool_key.tick_spacing,
        current_tick,
    })?;
    LiquidityPosition::single_sided(pool_key, range, side, amount)
}
