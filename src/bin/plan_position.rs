//! Offline planner for a single-sided token/USDC position.
//!
//! Usage: plan_position <token address> <current tick> [amount in whole tokens]

use custody_lp::consts::{usdc_address, USDC_DECIMALS};
use custody_lp::prelude::Result;
use custody_lp::{plan_single_sided_position, Error, LiquidityPosition, PoolKey, PriceBand};
use ethers::types::{Address, U256};
use log::info;
use serde_json::json;

/// 1.00% fee tier and its tick spacing
const FEE: u32 = 10_000;
const TICK_SPACING: i32 = 200;

const TOKEN_DECIMALS: u8 = 18;
const DEFAULT_AMOUNT: u64 = 200_000;

/// USDC per token
const PRICE_LOWER: f64 = 0.01;
const PRICE_UPPER: f64 = 10.0;

fn parse_args() -> Result<(Address, i32, U256)> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        return Err(Error::Config(
            "usage: plan_position <token address> <current tick> [amount]".to_string(),
        ));
    }
    let token = custody_lp::consts::parse_address(&args[0])?;
    let current_tick = args[1]
        .parse::<i32>()
        .map_err(|e| Error::Config(format!("invalid current tick {:?}: {e}", args[1])))?;
    let whole_tokens = match args.get(2) {
        Some(amount) => amount
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("invalid amount {amount:?}: {e}")))?,
        None => DEFAULT_AMOUNT,
    };
    let amount = U256::from(whole_tokens) * U256::exp10(TOKEN_DECIMALS as usize);
    Ok((token, current_tick, amount))
}

fn run() -> Result<LiquidityPosition> {
    let (token, current_tick, amount) = parse_args()?;
    let pool_key = PoolKey::new(token, usdc_address()?, FEE, TICK_SPACING, None)?;
    info!("Pool ID: {:?}", pool_key.pool_id());

    plan_single_sided_position(
        pool_key,
        token,
        PriceBand {
            lower: PRICE_LOWER,
            upper: PRICE_UPPER,
        },
        i32::from(USDC_DECIMALS) - i32::from(TOKEN_DECIMALS),
        current_tick,
        amount,
    )
}

fn main() {
    env_logger::init();

    let position = match run() {
        Ok(position) => position,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = json!({
        "poolId": format!("{:?}", position.pool_key.pool_id()),
        "poolKey": position.pool_key,
        "priceRange": {
            "lower": PRICE_LOWER,
            "upper": PRICE_UPPER,
            "unit": "USDC per token",
        },
        "tickLower": position.range.tick_lower,
        "tickUpper": position.range.tick_upper,
        "liquidity": position.liquidity.to_string(),
        "amount0Max": position.amount0_max.to_string(),
        "amount1Max": position.amount1_max.to_string(),
        "side": position.side,
    });
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string()));
}
