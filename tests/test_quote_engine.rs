//! Offline quote engine behavior over constructed snapshots: direction
//! handling, fee application, tick crossing, determinism, and liquidity
//! exhaustion.

mod common;

use bigdecimal::BigDecimal;
use common::{dec, key, snapshot, with_tick};
use gswap_agent::errors::QuoteError;
use gswap_agent::quoter::quote_exact_input;

#[test]
fn selling_token0_pays_out_near_spot_for_deep_pools() {
    // √price 2 → price of A in B is 4; with 1e12 liquidity the impact of
    // a 1-token trade is negligible, so out ≈ 1 × 0.997 × 4.
    let pool = snapshot("A", "B", 3000, "2", "1000000000000");
    let outcome = quote_exact_input(&pool, &key("A"), &dec("1")).unwrap();

    assert!(outcome.amount_out > dec("3.9879"));
    assert!(outcome.amount_out < dec("3.9881"));
    assert!(outcome.new_sqrt_price < outcome.current_sqrt_price);
}

#[test]
fn selling_token1_pays_out_the_inverse_price() {
    let pool = snapshot("A", "B", 3000, "2", "1000000000000");
    let outcome = quote_exact_input(&pool, &key("B"), &dec("1")).unwrap();

    // 1 × 0.997 / 4
    assert!(outcome.amount_out > dec("0.2492"));
    assert!(outcome.amount_out < dec("0.2493"));
    assert!(outcome.new_sqrt_price > outcome.current_sqrt_price);
}

#[test]
fn higher_fee_tier_pays_less() {
    let cheap = snapshot("A", "B", 500, "2", "1000000000000");
    let pricey = snapshot("A", "B", 10000, "2", "1000000000000");
    let amount = dec("5");

    let cheap_out = quote_exact_input(&cheap, &key("A"), &amount).unwrap();
    let pricey_out = quote_exact_input(&pricey, &key("A"), &amount).unwrap();
    assert!(cheap_out.amount_out > pricey_out.amount_out);
}

#[test]
fn quoting_is_deterministic() {
    let pool = with_tick(
        snapshot("A", "B", 3000, "1.05", "250000"),
        -60,
        "-12000",
        "12000",
    );
    let amount = dec("123.456789");

    let first = quote_exact_input(&pool, &key("A"), &amount).unwrap();
    let second = quote_exact_input(&pool, &key("A"), &amount).unwrap();

    assert_eq!(first.amount_out, second.amount_out);
    assert_eq!(first.new_sqrt_price, second.new_sqrt_price);
    assert_eq!(first.price_impact_pct, second.price_impact_pct);
    // Bit-identical, not merely numerically equal.
    assert_eq!(first.amount_out.to_string(), second.amount_out.to_string());
}

#[test]
fn price_impact_grows_with_trade_size() {
    let pool = snapshot("A", "B", 3000, "1", "1000000");
    let small = quote_exact_input(&pool, &key("A"), &dec("1")).unwrap();
    let large = quote_exact_input(&pool, &key("A"), &dec("10000")).unwrap();

    assert!(small.price_impact_pct > BigDecimal::from(0));
    assert!(large.price_impact_pct > small.price_impact_pct);
}

#[test]
fn crossing_a_tick_with_negative_net_adds_range_liquidity() {
    // Walking down through tick -60 where net = -500 raises the active
    // liquidity from 1000 to 1500, flattening the rest of the walk.
    let base = snapshot("A", "B", 3000, "1", "1000");
    let ticked = with_tick(base.clone(), -60, "-500", "500");
    let amount = dec("10");

    let without = quote_exact_input(&base, &key("A"), &amount).unwrap();
    let crossed = quote_exact_input(&ticked, &key("A"), &amount).unwrap();

    assert!(crossed.amount_out > without.amount_out);
    assert!(crossed.new_sqrt_price > without.new_sqrt_price);
}

#[test]
fn zero_input_is_a_zero_outcome() {
    let pool = snapshot("A", "B", 3000, "1", "1000");
    let outcome = quote_exact_input(&pool, &key("A"), &dec("0")).unwrap();
    assert_eq!(outcome.amount_out, BigDecimal::from(0));
    assert_eq!(outcome.price_impact_pct, BigDecimal::from(0));
    assert_eq!(outcome.new_sqrt_price, outcome.current_sqrt_price);
}

#[test]
fn zero_liquidity_pool_cannot_quote() {
    let pool = snapshot("A", "B", 3000, "1", "0");
    let err = quote_exact_input(&pool, &key("A"), &dec("1")).unwrap_err();
    assert!(matches!(err, QuoteError::ZeroLiquidity(_)));
}

#[test]
fn input_beyond_the_price_space_is_insufficient_liquidity() {
    let pool = snapshot("A", "B", 3000, "1", "0.000001");
    let err = quote_exact_input(
        &pool,
        &key("A"),
        &dec("1000000000000000000000000000000"),
    )
    .unwrap_err();
    assert!(matches!(err, QuoteError::InsufficientLiquidity { .. }));
}

#[test]
fn foreign_token_is_rejected() {
    let pool = snapshot("A", "B", 3000, "1", "1000");
    let err = quote_exact_input(&pool, &key("C"), &dec("1")).unwrap_err();
    assert!(matches!(err, QuoteError::TokenNotInPool(..)));
}
