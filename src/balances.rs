//! # Balance Manager
//!
//! Reads the wallet's inventory through the transport, partitions it
//! around the preferred and gas tokens, and derives the prioritized
//! rebalancing intents: refill gas first, dollar-cost-average the rest
//! into the preferred token, then spend surplus gas.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::errors::TransportError;
use crate::transport::{RawAsset, Transport};
use crate::types::{BalanceSummary, TokenBalance, TokenKey, TradeIntent, TradeReason};

/// Intents below this amount are noise and are dropped.
pub static DUST_THRESHOLD: Lazy<BigDecimal> =
    Lazy::new(|| BigDecimal::from_str("0.000001").unwrap());

const ASSETS_PAGE_SIZE: u32 = 100;
const ASSETS_MAX_PAGES: u32 = 10;

pub struct BalanceManager {
    transport: Arc<dyn Transport>,
    config: Arc<Config>,
}

impl BalanceManager {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<Config>) -> Self {
        Self { transport, config }
    }

    /// Fetches the full inventory (paging as needed) and partitions it.
    #[instrument(skip(self))]
    pub async fn fetch_summary(&self) -> Result<BalanceSummary, TransportError> {
        let mut assets: Vec<RawAsset> = Vec::new();
        for page in 1..=ASSETS_MAX_PAGES {
            let batch = self
                .transport
                .fetch_user_assets(&self.config.wallet_address, page, ASSETS_PAGE_SIZE)
                .await?;
            let last_page = (batch.len() as u32) < ASSETS_PAGE_SIZE;
            assets.extend(batch);
            if last_page {
                break;
            }
        }

        let mut holdings: Vec<TokenBalance> = Vec::with_capacity(assets.len());
        for raw in &assets {
            match parse_asset(raw) {
                Some(balance) => holdings.push(balance),
                None => {
                    warn!(target: "balances", "Skipping asset with no resolvable symbol");
                }
            }
        }

        Ok(partition(
            holdings,
            &self.config.preferred_token,
            &self.config.gas_token,
        ))
    }

    /// Derives the rebalancing intents for one tick, in priority order.
    /// The executor still re-sorts so gas refills run first regardless of
    /// what produced the list.
    pub fn derive_intents(&self, summary: &BalanceSummary) -> Vec<TradeIntent> {
        let cfg = &self.config;
        let pct = (&cfg.trade_amount_pct / BigDecimal::from(100)).with_prec(50);
        let mut intents = Vec::new();

        if summary.gas < cfg.min_gas_balance {
            for other in &summary.others {
                let amount = (&other.balance * &pct).with_prec(50);
                push_unless_dust(
                    &mut intents,
                    other.token.clone(),
                    cfg.gas_token.clone(),
                    amount,
                    TradeReason::RefillGas,
                );
            }
        }

        for other in &summary.others {
            let amount = (&other.balance * &pct).with_prec(50);
            push_unless_dust(
                &mut intents,
                other.token.clone(),
                cfg.preferred_token.clone(),
                amount,
                TradeReason::DcaToPreferred,
            );
        }

        if !cfg.preferred_is_gas() && summary.gas > cfg.min_gas_balance {
            let surplus = &summary.gas - &cfg.min_gas_balance;
            let amount = (surplus * &pct / BigDecimal::from(2)).with_prec(50);
            push_unless_dust(
                &mut intents,
                cfg.gas_token.clone(),
                cfg.preferred_token.clone(),
                amount,
                TradeReason::SpendExcessGas,
            );
        }

        debug!(target: "balances", count = intents.len(), "Intents derived");
        intents
    }
}

fn push_unless_dust(
    intents: &mut Vec<TradeIntent>,
    source: TokenKey,
    target: TokenKey,
    amount: BigDecimal,
    reason: TradeReason,
) {
    if amount < *DUST_THRESHOLD {
        return;
    }
    if source == target {
        return;
    }
    intents.push(TradeIntent { source, target, amount, reason });
}

/// Resolves one raw asset to a typed balance. The wire shape varies:
/// nested `tokenClassKey` first, then flattened class fields, then a bare
/// symbol with the fungible template. Only a symbol-less entry fails.
pub fn parse_asset(raw: &RawAsset) -> Option<TokenBalance> {
    let token = if let Some(class) = &raw.token_class_key {
        TokenKey {
            collection: class.collection.clone(),
            category: class.category.clone().unwrap_or_else(|| "Unit".to_string()),
            token_type: class.token_type.clone().unwrap_or_else(|| "none".to_string()),
            additional_key: class.additional_key.clone().unwrap_or_else(|| "none".to_string()),
        }
    } else if let Some(collection) = &raw.collection {
        TokenKey {
            collection: collection.clone(),
            category: raw.category.clone().unwrap_or_else(|| "Unit".to_string()),
            token_type: raw.token_type.clone().unwrap_or_else(|| "none".to_string()),
            additional_key: raw.additional_key.clone().unwrap_or_else(|| "none".to_string()),
        }
    } else if let Some(symbol) = &raw.symbol {
        TokenKey::from_symbol(symbol)
    } else {
        return None;
    };

    let quantity = raw
        .quantity
        .as_deref()
        .or(raw.balance.as_deref())
        .unwrap_or("0");
    let balance = match BigDecimal::from_str(quantity.trim()) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                target: "balances",
                token = %token,
                quantity,
                error = %e,
                "Unparseable quantity, treating holding as zero"
            );
            BigDecimal::from(0)
        }
    };

    Some(TokenBalance {
        token,
        balance,
        decimals: raw.decimals.unwrap_or(8),
    })
}

/// Splits holdings around the two designated tokens. Disjoint and
/// exhaustive: every holding lands in exactly one bucket (preferred and
/// gas coincide when the keys are equal).
pub fn partition(
    holdings: Vec<TokenBalance>,
    preferred: &TokenKey,
    gas: &TokenKey,
) -> BalanceSummary {
    let total_token_count = holdings.len();
    let mut preferred_balance = BigDecimal::from(0);
    let mut gas_balance = BigDecimal::from(0);
    let mut others = Vec::new();

    for holding in holdings {
        if &holding.token == preferred {
            preferred_balance = holding.balance.clone();
            if preferred == gas {
                gas_balance = holding.balance;
            }
        } else if &holding.token == gas {
            gas_balance = holding.balance;
        } else {
            others.push(holding);
        }
    }

    BalanceSummary {
        preferred: preferred_balance,
        gas: gas_balance,
        others,
        total_token_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RawTokenClass;

    fn raw(symbol: Option<&str>, quantity: Option<&str>) -> RawAsset {
        RawAsset {
            symbol: symbol.map(str::to_string),
            quantity: quantity.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn nested_class_key_wins_over_symbol() {
        let mut asset = raw(Some("WRONG"), Some("5"));
        asset.token_class_key = Some(RawTokenClass {
            collection: "GALA".to_string(),
            category: None,
            token_type: None,
            additional_key: None,
        });
        let parsed = parse_asset(&asset).unwrap();
        assert_eq!(parsed.token, TokenKey::from_symbol("GALA"));
        assert_eq!(parsed.balance, BigDecimal::from(5));
    }

    #[test]
    fn flat_class_fields_beat_the_symbol_fallback() {
        let mut asset = raw(Some("WRONG"), Some("2"));
        asset.collection = Some("SILK".to_string());
        let parsed = parse_asset(&asset).unwrap();
        assert_eq!(parsed.token, TokenKey::from_symbol("SILK"));
    }

    #[test]
    fn symbol_fallback_expands_the_template() {
        let parsed = parse_asset(&raw(Some("GUSDC"), Some("12.5"))).unwrap();
        assert_eq!(parsed.token.to_string(), "GUSDC|Unit|none|none");
    }

    #[test]
    fn symbol_less_asset_fails_the_parse() {
        assert!(parse_asset(&raw(None, Some("3"))).is_none());
    }

    #[test]
    fn partition_is_disjoint_and_exhaustive() {
        let gala = TokenKey::from_symbol("GALA");
        let silk = TokenKey::from_symbol("SILK");
        let holdings = vec![
            TokenBalance { token: gala.clone(), balance: BigDecimal::from(10), decimals: 8 },
            TokenBalance { token: silk.clone(), balance: BigDecimal::from(4), decimals: 8 },
            TokenBalance {
                token: TokenKey::from_symbol("GUSDC"),
                balance: BigDecimal::from(7),
                decimals: 6,
            },
        ];
        let summary = partition(holdings, &silk, &gala);
        assert_eq!(summary.preferred, BigDecimal::from(4));
        assert_eq!(summary.gas, BigDecimal::from(10));
        assert_eq!(summary.others.len(), 1);
        assert_eq!(summary.total_token_count, 3);
        assert!(summary.others.iter().all(|o| o.token != silk && o.token != gala));
    }

    #[test]
    fn shared_preferred_and_gas_key_fills_both_fields() {
        let gala = TokenKey::from_symbol("GALA");
        let holdings = vec![TokenBalance {
            token: gala.clone(),
            balance: BigDecimal::from(42),
            decimals: 8,
        }];
        let summary = partition(holdings, &gala, &gala);
        assert_eq!(summary.preferred, BigDecimal::from(42));
        assert_eq!(summary.gas, BigDecimal::from(42));
        assert!(summary.others.is_empty());
    }
}
