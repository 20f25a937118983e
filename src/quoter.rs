//! # Offline Quote Engine
//!
//! Reproduces the AMM's exact-input swap behavior locally over a cached
//! pool snapshot: fee on input, then a tick walk in the swap direction
//! that consumes range liquidity and steps the √price until the input is
//! exhausted. Pure functions over the snapshot; no network calls.
//!
//! All arithmetic is arbitrary-precision decimal. Intermediate results are
//! renormalized to a fixed working precision so outputs are deterministic
//! and digit growth stays bounded.

use bigdecimal::{BigDecimal, One, Zero};
use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::errors::QuoteError;
use crate::types::{PoolSnapshot, QuoteOutcome, TokenKey};

/// Tick bounds of the concentrated-liquidity price space.
pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

/// Working precision, in significant digits, applied after each step.
const PRECISION: u64 = 50;

static ONE_0001: Lazy<BigDecimal> = Lazy::new(|| BigDecimal::from_str("1.0001").unwrap());

/// √price at the lower tick bound; the hard limit for token0→token1 swaps.
pub static MIN_SQRT_PRICE: Lazy<BigDecimal> = Lazy::new(|| sqrt_price_at_tick(MIN_TICK));
/// √price at the upper tick bound; the hard limit for token1→token0 swaps.
pub static MAX_SQRT_PRICE: Lazy<BigDecimal> = Lazy::new(|| sqrt_price_at_tick(MAX_TICK));

/// `1.0001^(tick/2)`, the √price of the marginal price at `tick`.
pub fn sqrt_price_at_tick(tick: i32) -> BigDecimal {
    let magnitude = pow_decimal(&ONE_0001, tick.unsigned_abs());
    let root = magnitude
        .sqrt()
        .expect("1.0001^|tick| is positive")
        .with_prec(PRECISION);
    if tick < 0 {
        (BigDecimal::one() / &root).with_prec(PRECISION)
    } else {
        root
    }
}

/// Exponentiation by squaring with renormalization per step.
fn pow_decimal(base: &BigDecimal, mut exp: u32) -> BigDecimal {
    let mut result = BigDecimal::one();
    let mut acc = base.clone();
    while exp > 0 {
        if exp & 1 == 1 {
            result = (&result * &acc).with_prec(PRECISION);
        }
        acc = (&acc * &acc).with_prec(PRECISION);
        exp >>= 1;
    }
    result
}

/// Amount of token0 moved across the √price range `[lower, upper]` at
/// liquidity `l`: `l·(upper − lower)/(lower·upper)`.
fn amount0_delta(a: &BigDecimal, b: &BigDecimal, l: &BigDecimal) -> BigDecimal {
    let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
    ((l * (upper - lower)) / (lower * upper)).with_prec(PRECISION)
}

/// Amount of token1 moved across the √price range: `l·(upper − lower)`.
fn amount1_delta(a: &BigDecimal, b: &BigDecimal, l: &BigDecimal) -> BigDecimal {
    let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
    (l * (upper - lower)).with_prec(PRECISION)
}

/// New √price after adding `amount` of token0: `l·p/(l + amount·p)`.
fn next_sqrt_price_from_amount0_in(
    p: &BigDecimal,
    l: &BigDecimal,
    amount: &BigDecimal,
) -> BigDecimal {
    ((l * p) / (l + amount * p)).with_prec(PRECISION)
}

/// New √price after adding `amount` of token1: `p + amount/l`.
fn next_sqrt_price_from_amount1_in(
    p: &BigDecimal,
    l: &BigDecimal,
    amount: &BigDecimal,
) -> BigDecimal {
    (p + (amount / l)).with_prec(PRECISION)
}

/// One swap step inside a single tick range. Returns
/// `(input consumed, output produced, new √price, range exhausted)`.
fn compute_swap_step(
    sqrt_price: &BigDecimal,
    sqrt_price_target: &BigDecimal,
    liquidity: &BigDecimal,
    amount_remaining: &BigDecimal,
    zero_for_one: bool,
) -> (BigDecimal, BigDecimal, BigDecimal, bool) {
    if zero_for_one {
        let max_in = amount0_delta(sqrt_price_target, sqrt_price, liquidity);
        if amount_remaining >= &max_in {
            let out = amount1_delta(sqrt_price_target, sqrt_price, liquidity);
            (max_in, out, sqrt_price_target.clone(), true)
        } else {
            let new_price = next_sqrt_price_from_amount0_in(sqrt_price, liquidity, amount_remaining);
            let out = amount1_delta(&new_price, sqrt_price, liquidity);
            (amount_remaining.clone(), out, new_price, false)
        }
    } else {
        let max_in = amount1_delta(sqrt_price, sqrt_price_target, liquidity);
        if amount_remaining >= &max_in {
            let out = amount0_delta(sqrt_price, sqrt_price_target, liquidity);
            (max_in, out, sqrt_price_target.clone(), true)
        } else {
            let new_price = next_sqrt_price_from_amount1_in(sqrt_price, liquidity, amount_remaining);
            let out = amount0_delta(sqrt_price, &new_price, liquidity);
            (amount_remaining.clone(), out, new_price, false)
        }
    }
}

/// Initialized ticks resolved to their √prices and net liquidity, in tick
/// order. Resolved once per quote so the walk is pure lookups.
fn initialized_ticks(snapshot: &PoolSnapshot) -> Vec<(i32, BigDecimal, BigDecimal)> {
    snapshot
        .ticks
        .iter()
        .filter(|(_, info)| info.liquidity_gross > BigDecimal::zero())
        .map(|(&tick, info)| (tick, sqrt_price_at_tick(tick), info.liquidity_net.clone()))
        .collect()
}

/// Computes the outcome of an exact-input swap of `amount_in` of
/// `token_in` against `snapshot`. Deterministic: identical inputs yield
/// identical outputs.
pub fn quote_exact_input(
    snapshot: &PoolSnapshot,
    token_in: &TokenKey,
    amount_in: &BigDecimal,
) -> Result<QuoteOutcome, QuoteError> {
    if !snapshot.contains(token_in) {
        return Err(QuoteError::TokenNotInPool(
            token_in.to_string(),
            snapshot.token0.to_string(),
            snapshot.token1.to_string(),
        ));
    }
    if snapshot.sqrt_price <= BigDecimal::zero() {
        return Err(QuoteError::InvalidSnapshot(format!(
            "pool {} has non-positive sqrt price",
            snapshot.key()
        )));
    }

    let current_sqrt_price = snapshot.sqrt_price.clone();
    if amount_in <= &BigDecimal::zero() {
        return Ok(QuoteOutcome {
            amount_in: amount_in.clone(),
            amount_out: BigDecimal::zero(),
            new_sqrt_price: current_sqrt_price.clone(),
            current_sqrt_price,
            price_impact_pct: BigDecimal::zero(),
        });
    }

    let zero_for_one = token_in == &snapshot.token0;
    let fee_fraction =
        BigDecimal::from(1_000_000u32 - snapshot.fee) / BigDecimal::from(1_000_000u32);
    let mut amount_remaining = (amount_in * fee_fraction).with_prec(PRECISION);

    let mut liquidity = snapshot.liquidity.clone();
    if liquidity <= BigDecimal::zero() {
        return Err(QuoteError::ZeroLiquidity(snapshot.key().to_string()));
    }

    let ticks = initialized_ticks(snapshot);
    let mut sqrt_price = current_sqrt_price.clone();
    let mut amount_out = BigDecimal::zero();
    let price_limit: &BigDecimal = if zero_for_one { &MIN_SQRT_PRICE } else { &MAX_SQRT_PRICE };

    while amount_remaining > BigDecimal::zero() {
        if liquidity <= BigDecimal::zero() {
            return Err(QuoteError::InsufficientLiquidity {
                pool: snapshot.key().to_string(),
                amount: amount_in.to_string(),
            });
        }

        // Next initialized tick boundary in the swap direction, by √price
        // comparison against the walk's current position.
        let next_tick = if zero_for_one {
            ticks
                .iter()
                .rev()
                .find(|(_, tick_price, _)| tick_price < &sqrt_price)
        } else {
            ticks.iter().find(|(_, tick_price, _)| tick_price > &sqrt_price)
        };

        let target = match next_tick {
            Some((_, tick_price, _)) => {
                if zero_for_one {
                    tick_price.max(price_limit)
                } else {
                    tick_price.min(price_limit)
                }
            }
            None => price_limit,
        };

        let (step_in, step_out, new_price, range_exhausted) = compute_swap_step(
            &sqrt_price,
            target,
            &liquidity,
            &amount_remaining,
            zero_for_one,
        );

        amount_remaining = (&amount_remaining - &step_in).with_prec(PRECISION);
        amount_out = (&amount_out + &step_out).with_prec(PRECISION);
        sqrt_price = new_price;

        if range_exhausted {
            match next_tick {
                Some((_, tick_price, net)) if tick_price == target => {
                    // Crossing the boundary activates or retires the net
                    // liquidity parked at the tick.
                    liquidity = if zero_for_one {
                        (&liquidity - net).with_prec(PRECISION)
                    } else {
                        (&liquidity + net).with_prec(PRECISION)
                    };
                }
                _ => {
                    // The global price limit, not a tick: nothing beyond
                    // it can absorb the rest of the input.
                    if amount_remaining > BigDecimal::zero() {
                        return Err(QuoteError::InsufficientLiquidity {
                            pool: snapshot.key().to_string(),
                            amount: amount_in.to_string(),
                        });
                    }
                }
            }
        }

        if step_in.is_zero() && step_out.is_zero() {
            break;
        }
    }

    let price_impact_pct = price_impact(&current_sqrt_price, &sqrt_price);

    Ok(QuoteOutcome {
        amount_in: amount_in.clone(),
        amount_out,
        current_sqrt_price,
        new_sqrt_price: sqrt_price,
        price_impact_pct,
    })
}

/// `|(new² − cur²)/cur²| × 100`.
fn price_impact(current: &BigDecimal, new: &BigDecimal) -> BigDecimal {
    let cur_sq = (current * current).with_prec(PRECISION);
    let new_sq = (new * new).with_prec(PRECISION);
    (((new_sq - &cur_sq) / cur_sq).abs() * BigDecimal::from(100)).with_prec(PRECISION)
}
