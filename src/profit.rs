//! # Circular Profit Calculator
//!
//! Simulates a candidate cycle hop by hop with the offline quote engine,
//! feeding each hop's output into the next hop's input, then nets out a
//! fee overhead and ranks what remains.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use once_cell::sync::Lazy;
use smallvec::SmallVec;

use crate::errors::QuoteError;
use crate::pathfinder::CyclePath;
use crate::quoter;
use crate::types::{ArbitrageHop, ArbitrageOpportunity, PoolSnapshot};

/// Fraction of gross profit retained after the per-hop execution-fee
/// overhead. A flat 2% haircut is an approximation: the real overhead is
/// denominated in the gas token and would need a gas→base conversion
/// through the pool cache to subtract exactly.
pub static FEE_RETENTION: Lazy<BigDecimal> =
    Lazy::new(|| BigDecimal::from_str("0.98").unwrap());

/// Simulates `input_amount` of the cycle's base token around the cycle.
/// Errors propagate from the quoter (e.g. a hop without enough liquidity).
pub fn evaluate_cycle(
    cycle: &CyclePath,
    snapshots: &[Arc<PoolSnapshot>],
    input_amount: &BigDecimal,
) -> Result<ArbitrageOpportunity, QuoteError> {
    let mut amount = input_amount.clone();
    let mut price_impacts = Vec::with_capacity(cycle.hop_count());
    let mut hops: SmallVec<[ArbitrageHop; 4]> = SmallVec::new();

    for (hop, &pool_index) in cycle.pool_indices.iter().enumerate() {
        let snapshot = snapshots.get(pool_index).ok_or_else(|| {
            QuoteError::InvalidSnapshot(format!("pool index {pool_index} out of range"))
        })?;
        let token_in = &cycle.tokens[hop];
        let token_out = &cycle.tokens[hop + 1];

        let outcome = quoter::quote_exact_input(snapshot, token_in, &amount)?;
        price_impacts.push(outcome.price_impact_pct);
        hops.push(ArbitrageHop {
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            fee: snapshot.fee,
        });
        amount = outcome.amount_out;
    }

    let gross_profit = &amount - input_amount;
    let fee_adjusted_profit = if gross_profit > BigDecimal::zero() {
        (&gross_profit * &*FEE_RETENTION).with_prec(50)
    } else {
        gross_profit.clone()
    };
    let profit_pct = if input_amount.is_zero() {
        BigDecimal::zero()
    } else {
        ((&fee_adjusted_profit / input_amount) * BigDecimal::from(100)).with_prec(50)
    };

    Ok(ArbitrageOpportunity {
        tokens: cycle.tokens.clone(),
        hops,
        input_amount: input_amount.clone(),
        expected_out: amount,
        gross_profit,
        fee_adjusted_profit,
        profit_pct,
        price_impacts,
        detected_at: Utc::now(),
    })
}

/// Drops unprofitable opportunities and sorts the survivors: best profit
/// percent first, ties broken by fewer hops, then earliest detection.
pub fn rank_opportunities(
    opportunities: Vec<ArbitrageOpportunity>,
    min_profit_pct: &BigDecimal,
) -> Vec<ArbitrageOpportunity> {
    let mut survivors: Vec<ArbitrageOpportunity> = opportunities
        .into_iter()
        .filter(|o| o.fee_adjusted_profit > BigDecimal::zero() && &o.profit_pct >= min_profit_pct)
        .collect();

    survivors.sort_by(|a, b| {
        b.profit_pct
            .cmp(&a.profit_pct)
            .then_with(|| a.hop_count().cmp(&b.hop_count()))
            .then_with(|| a.detected_at.cmp(&b.detected_at))
    });
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenKey;
    use chrono::Duration;

    fn opportunity(pct: &str, hops: usize, offset_ms: i64) -> ArbitrageOpportunity {
        let gala = TokenKey::from_symbol("GALA");
        let mut tokens: SmallVec<[TokenKey; 5]> = SmallVec::new();
        tokens.push(gala.clone());
        let mut hop_list: SmallVec<[ArbitrageHop; 4]> = SmallVec::new();
        for _ in 0..hops {
            tokens.push(gala.clone());
            hop_list.push(ArbitrageHop {
                token_in: gala.clone(),
                token_out: gala.clone(),
                fee: 3000,
            });
        }
        let pct = BigDecimal::from_str(pct).unwrap();
        ArbitrageOpportunity {
            tokens,
            hops: hop_list,
            input_amount: BigDecimal::from(100),
            expected_out: BigDecimal::from(100),
            gross_profit: pct.clone(),
            fee_adjusted_profit: pct.clone(),
            profit_pct: pct,
            price_impacts: Vec::new(),
            detected_at: Utc::now() + Duration::milliseconds(offset_ms),
        }
    }

    #[test]
    fn ranking_filters_and_orders() {
        let min = BigDecimal::from(1);
        let ranked = rank_opportunities(
            vec![
                opportunity("0.5", 2, 0),
                opportunity("2.5", 3, 1),
                opportunity("-1", 2, 2),
                opportunity("4.0", 2, 3),
            ],
            &min,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].profit_pct, BigDecimal::from_str("4.0").unwrap());
        assert_eq!(ranked[1].profit_pct, BigDecimal::from_str("2.5").unwrap());
    }

    #[test]
    fn ties_prefer_fewer_hops_then_earlier_detection() {
        let min = BigDecimal::zero();
        let ranked = rank_opportunities(
            vec![
                opportunity("2", 3, 0),
                opportunity("2", 2, 1),
                opportunity("2", 2, 2),
            ],
            &min,
        );
        assert_eq!(ranked[0].hop_count(), 2);
        assert!(ranked[0].detected_at < ranked[1].detected_at);
        assert_eq!(ranked[2].hop_count(), 3);
    }

    #[test]
    fn zero_profit_is_filtered_even_with_zero_threshold() {
        let ranked = rank_opportunities(vec![opportunity("0", 2, 0)], &BigDecimal::zero());
        assert!(ranked.is_empty());
    }
}
