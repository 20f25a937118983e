//! Core typed model shared across the agent: token identity, pool
//! snapshots, trade intents and results, and arbitrage opportunities.
//!
//! All quantities are arbitrary-precision [`BigDecimal`]; floating point
//! appears only at display boundaries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::ConfigError;

/// The fee tiers a pool may carry, in parts-per-million of the input
/// amount: 500 = 0.05%, 3000 = 0.30%, 10000 = 1.00%.
pub const FEE_TIERS: [u32; 3] = [500, 3_000, 10_000];

/// Tick spacing implied by a fee tier. Unknown tiers fall back to the
/// 0.30% spacing, matching the pools the gateway actually serves.
pub fn tick_spacing(fee: u32) -> i32 {
    match fee {
        500 => 10,
        3_000 => 60,
        10_000 => 200,
        _ => 60,
    }
}

/// Fully-qualified token identity on the chain: a 4-tuple serialized as
/// `collection|category|type|additionalKey`. The symbol is the collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKey {
    pub collection: String,
    pub category: String,
    pub token_type: String,
    pub additional_key: String,
}

impl TokenKey {
    /// Expands a bare symbol with the standard fungible-token template.
    pub fn from_symbol(symbol: &str) -> Self {
        Self {
            collection: symbol.to_string(),
            category: "Unit".to_string(),
            token_type: "none".to_string(),
            additional_key: "none".to_string(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.collection
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.collection, self.category, self.token_type, self.additional_key
        )
    }
}

impl FromStr for TokenKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').collect();
        if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::InvalidTokenKey(s.to_string()));
        }
        Ok(Self {
            collection: parts[0].to_string(),
            category: parts[1].to_string(),
            token_type: parts[2].to_string(),
            additional_key: parts[3].to_string(),
        })
    }
}

impl Serialize for TokenKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Canonical cache identity of a pool: the unordered token pair (stored
/// sorted) plus the fee tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub token_a: TokenKey,
    pub token_b: TokenKey,
    pub fee: u32,
}

impl PoolKey {
    pub fn new(t0: TokenKey, t1: TokenKey, fee: u32) -> Self {
        let (token_a, token_b) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        Self { token_a, token_b, fee }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.token_a, self.token_b, self.fee)
    }
}

/// Per-tick liquidity bookkeeping, straight off the composite-pool wire
/// response with numeric strings decoded.
#[derive(Debug, Clone, Default)]
pub struct TickInfo {
    pub liquidity_net: BigDecimal,
    pub liquidity_gross: BigDecimal,
    pub fee_growth_outside0: BigDecimal,
    pub fee_growth_outside1: BigDecimal,
}

/// A point-in-time composite view of one pool: ordered sides, current
/// √price, global active liquidity, and the sparse initialized-tick map.
/// Local snapshots are hints; on-chain state is authoritative.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub token0: TokenKey,
    pub token1: TokenKey,
    pub decimals0: u8,
    pub decimals1: u8,
    pub fee: u32,
    pub sqrt_price: BigDecimal,
    pub liquidity: BigDecimal,
    pub tick_spacing: i32,
    pub ticks: BTreeMap<i32, TickInfo>,
    pub fetched_at: DateTime<Utc>,
}

impl PoolSnapshot {
    pub fn key(&self) -> PoolKey {
        PoolKey::new(self.token0.clone(), self.token1.clone(), self.fee)
    }

    pub fn contains(&self, token: &TokenKey) -> bool {
        &self.token0 == token || &self.token1 == token
    }

    /// The opposite side of the pool, if `token` is one of its sides.
    pub fn counterpart(&self, token: &TokenKey) -> Option<&TokenKey> {
        if &self.token0 == token {
            Some(&self.token1)
        } else if &self.token1 == token {
            Some(&self.token0)
        } else {
            None
        }
    }
}

/// Result of an offline exact-input quote over a snapshot.
#[derive(Debug, Clone)]
pub struct QuoteOutcome {
    pub amount_in: BigDecimal,
    pub amount_out: BigDecimal,
    pub current_sqrt_price: BigDecimal,
    pub new_sqrt_price: BigDecimal,
    pub price_impact_pct: BigDecimal,
}

/// Why a trade intent exists. Gas refills sort ahead of everything else
/// at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeReason {
    RefillGas,
    DcaToPreferred,
    SpendExcessGas,
    Arbitrage,
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeReason::RefillGas => "refill-gas",
            TradeReason::DcaToPreferred => "dca-to-preferred",
            TradeReason::SpendExcessGas => "spend-excess-gas",
            TradeReason::Arbitrage => "arbitrage",
        };
        f.write_str(s)
    }
}

/// A single derived trade: swap `amount` of `source` into `target`.
#[derive(Debug, Clone, Serialize)]
pub struct TradeIntent {
    pub source: TokenKey,
    pub target: TokenKey,
    pub amount: BigDecimal,
    pub reason: TradeReason,
}

/// Append-only record of one executed (or attempted) trade.
#[derive(Debug, Clone, Serialize)]
pub struct TradeResult {
    pub success: bool,
    pub source: TokenKey,
    pub target: TokenKey,
    pub amount_in: BigDecimal,
    pub amount_out: Option<BigDecimal>,
    pub tx_id: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TradeResult {
    pub fn failure(
        source: TokenKey,
        target: TokenKey,
        amount_in: BigDecimal,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            source,
            target,
            amount_in,
            amount_out: None,
            tx_id: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// One wallet holding, already resolved to a full token key.
#[derive(Debug, Clone, Serialize)]
pub struct TokenBalance {
    pub token: TokenKey,
    pub balance: BigDecimal,
    pub decimals: u8,
}

/// Wallet inventory partitioned around the two designated tokens. The
/// partition is disjoint and exhaustive: `others` excludes both the
/// preferred and the gas token.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSummary {
    pub preferred: BigDecimal,
    pub gas: BigDecimal,
    pub others: Vec<TokenBalance>,
    pub total_token_count: usize,
}

/// One hop of a circular route: which pool to cross and at which fee tier.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageHop {
    pub token_in: TokenKey,
    pub token_out: TokenKey,
    pub fee: u32,
}

/// A simulated circular trade that survived profitability filtering.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    /// Token sequence `t0 .. tn` with `t0 == tn`.
    pub tokens: SmallVec<[TokenKey; 5]>,
    pub hops: SmallVec<[ArbitrageHop; 4]>,
    pub input_amount: BigDecimal,
    pub expected_out: BigDecimal,
    pub gross_profit: BigDecimal,
    pub fee_adjusted_profit: BigDecimal,
    pub profit_pct: BigDecimal,
    pub price_impacts: Vec<BigDecimal>,
    pub detected_at: DateTime<Utc>,
}

impl ArbitrageOpportunity {
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Human-oriented route label, e.g. `GALA -> GUSDC -> GALA`.
    pub fn route_label(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.symbol().to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Outcome of executing an arbitrage opportunity hop by hop.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageResult {
    pub success: bool,
    pub route: String,
    pub input_amount: BigDecimal,
    pub final_amount: Option<BigDecimal>,
    pub realized_profit: Option<BigDecimal>,
    pub hops_completed: usize,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_key_round_trips_canonical_form() {
        let key: TokenKey = "GALA|Unit|none|none".parse().unwrap();
        assert_eq!(key.symbol(), "GALA");
        assert_eq!(key.to_string(), "GALA|Unit|none|none");
    }

    #[test]
    fn token_key_rejects_short_forms() {
        assert!("GALA|Unit|none".parse::<TokenKey>().is_err());
        assert!("GALA||none|none".parse::<TokenKey>().is_err());
    }

    #[test]
    fn pool_key_is_order_insensitive() {
        let a = TokenKey::from_symbol("GALA");
        let b = TokenKey::from_symbol("GUSDC");
        assert_eq!(
            PoolKey::new(a.clone(), b.clone(), 3000),
            PoolKey::new(b, a, 3000)
        );
    }

    #[test]
    fn fee_tiers_imply_spacing() {
        assert_eq!(tick_spacing(500), 10);
        assert_eq!(tick_spacing(3000), 60);
        assert_eq!(tick_spacing(10000), 200);
    }
}
