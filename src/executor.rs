//! # Trade Router / Executor
//!
//! Direct and two-hop swap execution: fee-tier probing, online quoting,
//! slippage floor, signed submission, and the async wait for the terminal
//! notification. Failures never escape the public boundary: every path
//! returns a `TradeResult`, and everything except a cancellation lands in
//! the trade history ring.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::bundler::{BundlerChannel, TxStatus};
use crate::config::Config;
use crate::detector::HISTORY_CAP;
use crate::errors::{QuoteError, TradeError};
use crate::pool_cache::PoolCache;
use crate::registry::Registry;
use crate::transport::{SwapRequest, Transport};
use crate::types::{
    ArbitrageOpportunity, ArbitrageResult, TokenKey, TradeIntent, TradeReason, TradeResult,
    FEE_TIERS,
};

/// Output factor applied by dry-run fills.
static DRY_RUN_FILL: Lazy<BigDecimal> = Lazy::new(|| BigDecimal::from_str("0.98").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct ExecutorStats {
    pub total_trades: u64,
    pub successful_trades: u64,
    pub success_rate: f64,
    pub total_volume: BigDecimal,
    pub last_trade_time: Option<DateTime<Utc>>,
}

pub struct TradeExecutor {
    transport: Arc<dyn Transport>,
    pool_cache: Arc<PoolCache>,
    registry: Arc<Registry>,
    bundler: Arc<BundlerChannel>,
    config: Arc<Config>,
    history: RwLock<VecDeque<TradeResult>>,
}

impl TradeExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        pool_cache: Arc<PoolCache>,
        registry: Arc<Registry>,
        bundler: Arc<BundlerChannel>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            transport,
            pool_cache,
            registry,
            bundler,
            config,
            history: RwLock::new(VecDeque::new()),
        }
    }

    /// Executes one exact-input swap. With no fee tier given, probes all
    /// three tiers and uses the deepest pool.
    #[instrument(skip(self, amount), fields(swap = %format!("{source}->{target}"), amount = %amount))]
    pub async fn execute_direct(
        &self,
        source: &TokenKey,
        target: &TokenKey,
        amount: &BigDecimal,
        fee: Option<u32>,
    ) -> TradeResult {
        match self.try_direct(source, target, amount, fee).await {
            Ok(result) => {
                self.record(result.clone()).await;
                result
            }
            Err(e) if e.is_cancelled() => {
                // Stopped mid-operation: nothing is recorded; any swap
                // already submitted continues on-chain regardless.
                TradeResult::failure(source.clone(), target.clone(), amount.clone(), e.to_string())
            }
            Err(e) => {
                warn!(target: "executor", error = %e, "Direct swap failed");
                let result =
                    TradeResult::failure(source.clone(), target.clone(), amount.clone(), e.to_string());
                self.record(result.clone()).await;
                result
            }
        }
    }

    async fn try_direct(
        &self,
        source: &TokenKey,
        target: &TokenKey,
        amount: &BigDecimal,
        fee: Option<u32>,
    ) -> Result<TradeResult, TradeError> {
        let fee = match fee {
            Some(fee) => fee,
            None => self.probe_fee_tier(source, target).await?,
        };

        if !self.config.enable_trading {
            return Ok(self.dry_run_fill(source, target, amount));
        }

        let expected = self
            .transport
            .quote_exact_input(source, target, fee, amount)
            .await?;
        if expected <= BigDecimal::zero() {
            return Err(TradeError::Quote(QuoteError::InsufficientLiquidity {
                pool: format!("{source}/{target}@{fee}"),
                amount: amount.to_string(),
            }));
        }

        let min_out = ((&expected * (BigDecimal::from(100) - &self.config.max_slippage_pct))
            / BigDecimal::from(100))
        .with_prec(50);

        let request = SwapRequest {
            token_in: source.clone(),
            token_out: target.clone(),
            fee,
            amount_in: amount.normalized().to_string(),
            amount_out_minimum: min_out.normalized().to_string(),
            recipient: self.config.wallet_address.clone(),
        };

        let pending = self
            .transport
            .submit_swap(&request)
            .await
            .map_err(|e| TradeError::Submission(e.to_string()))?;
        info!(
            target: "executor",
            tx_id = %pending.tx_id,
            expected = %expected,
            min_out = %min_out,
            "Swap submitted, awaiting confirmation"
        );

        let event = self
            .bundler
            .await_transaction(&pending.tx_id, self.config.transaction_timeout())
            .await?;

        match event.status {
            TxStatus::Processed => {
                // The settlement payload rarely carries the filled amount;
                // fall back to the quoted expectation when it does not.
                let settled = event
                    .payload
                    .get("amountOut")
                    .and_then(|v| v.as_str())
                    .and_then(|v| BigDecimal::from_str(v).ok())
                    .unwrap_or(expected);
                Ok(TradeResult {
                    success: true,
                    source: source.clone(),
                    target: target.clone(),
                    amount_in: amount.clone(),
                    amount_out: Some(settled),
                    tx_id: Some(pending.tx_id),
                    error: None,
                    timestamp: Utc::now(),
                })
            }
            TxStatus::Failed => {
                let reason = event
                    .payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("transaction failed on-chain")
                    .to_string();
                Err(TradeError::Failed { tx_id: pending.tx_id, reason })
            }
        }
    }

    /// Probes the three fee tiers and picks the pool with the most
    /// liquidity. A tier counts only when pool data exists and its
    /// reported liquidity is positive.
    async fn probe_fee_tier(&self, source: &TokenKey, target: &TokenKey) -> Result<u32, TradeError> {
        let mut best: Option<(u32, BigDecimal)> = None;
        for fee in FEE_TIERS {
            match self.pool_cache.get(source, target, fee).await {
                Ok(snapshot) if snapshot.liquidity > BigDecimal::zero() => {
                    let deeper = match &best {
                        Some((_, depth)) => &snapshot.liquidity > depth,
                        None => true,
                    };
                    if deeper {
                        best = Some((fee, snapshot.liquidity.clone()));
                    }
                }
                Ok(_) => {
                    debug!(target: "executor", fee, "Tier exists but has no liquidity");
                }
                Err(e) => {
                    debug!(target: "executor", fee, error = %e, "No pool at tier");
                }
            }
        }
        best.map(|(fee, _)| fee)
            .ok_or_else(|| TradeError::NoRoute(source.to_string(), target.to_string()))
    }

    fn dry_run_fill(&self, source: &TokenKey, target: &TokenKey, amount: &BigDecimal) -> TradeResult {
        let amount_out = (amount * &*DRY_RUN_FILL).with_prec(50);
        let tx_id = format!("dry-run-{:016x}", rand::random::<u64>());
        debug!(target: "executor", tx_id = %tx_id, "Dry-run fill");
        TradeResult {
            success: true,
            source: source.clone(),
            target: target.clone(),
            amount_in: amount.clone(),
            amount_out: Some(amount_out),
            tx_id: Some(tx_id),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Direct swap with a two-hop fallback through the registry's
    /// well-known intermediates. A stranded intermediate balance (hop 1
    /// filled, hop 2 failed) is left for the next rebalance cycle.
    #[instrument(skip(self, amount), fields(swap = %format!("{source}->{target}")))]
    pub async fn execute_routed(
        &self,
        source: &TokenKey,
        target: &TokenKey,
        amount: &BigDecimal,
    ) -> TradeResult {
        let direct = self.execute_direct(source, target, amount, None).await;
        if direct.success {
            return direct;
        }

        for intermediate in self.registry.intermediates(&[source, target]) {
            debug!(
                target: "executor",
                via = %intermediate,
                "Direct route failed, trying two-hop path"
            );
            let hop1 = self.execute_direct(source, &intermediate, amount, None).await;
            if !hop1.success {
                continue;
            }
            let hop1_out = hop1
                .amount_out
                .clone()
                .unwrap_or_else(|| BigDecimal::zero());

            let hop2 = self.execute_direct(&intermediate, target, &hop1_out, None).await;
            if hop2.success {
                return TradeResult {
                    success: true,
                    source: source.clone(),
                    target: target.clone(),
                    amount_in: amount.clone(),
                    amount_out: hop2.amount_out,
                    tx_id: hop2.tx_id,
                    error: None,
                    timestamp: Utc::now(),
                };
            }

            return TradeResult::failure(
                source.clone(),
                target.clone(),
                amount.clone(),
                format!(
                    "two-hop route stalled at {}: {}",
                    intermediate.symbol(),
                    hop2.error.unwrap_or_else(|| "hop 2 failed".to_string())
                ),
            );
        }

        direct
    }

    /// Executes a detected cycle hop by hop with its chosen fee tiers,
    /// stopping at the first failed hop.
    #[instrument(skip(self, opportunity), fields(route = %opportunity.route_label()))]
    pub async fn execute_arbitrage(&self, opportunity: &ArbitrageOpportunity) -> ArbitrageResult {
        let mut amount = opportunity.input_amount.clone();

        for (index, hop) in opportunity.hops.iter().enumerate() {
            let result = self
                .execute_direct(&hop.token_in, &hop.token_out, &amount, Some(hop.fee))
                .await;
            if !result.success {
                warn!(
                    target: "executor",
                    hop = index,
                    route = %opportunity.route_label(),
                    "Arbitrage aborted mid-cycle"
                );
                return ArbitrageResult {
                    success: false,
                    route: opportunity.route_label(),
                    input_amount: opportunity.input_amount.clone(),
                    final_amount: None,
                    realized_profit: None,
                    hops_completed: index,
                    error: result.error,
                    timestamp: Utc::now(),
                };
            }
            amount = result.amount_out.unwrap_or(amount);
        }

        let realized = &amount - &opportunity.input_amount;
        info!(
            target: "executor",
            route = %opportunity.route_label(),
            realized = %realized,
            "Arbitrage cycle complete"
        );
        ArbitrageResult {
            success: true,
            route: opportunity.route_label(),
            input_amount: opportunity.input_amount.clone(),
            final_amount: Some(amount),
            realized_profit: Some(realized),
            hops_completed: opportunity.hop_count(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Runs a batch serially, gas refills first, with the configured
    /// inter-trade delay between swaps.
    pub async fn execute_batch(&self, mut intents: Vec<TradeIntent>) -> Vec<TradeResult> {
        intents.sort_by_key(|i| i.reason != TradeReason::RefillGas);

        let mut results = Vec::with_capacity(intents.len());
        for (index, intent) in intents.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.trade_delay()).await;
            }
            info!(
                target: "executor",
                reason = %intent.reason,
                swap = %format!("{} -> {}", intent.source.symbol(), intent.target.symbol()),
                amount = %intent.amount,
                "Executing intent"
            );
            results.push(
                self.execute_routed(&intent.source, &intent.target, &intent.amount)
                    .await,
            );
        }
        results
    }

    async fn record(&self, result: TradeResult) {
        let mut history = self.history.write().await;
        history.push_back(result);
        if history.len() > HISTORY_CAP {
            history.pop_front();
        }
    }

    pub async fn recent_trades(&self, limit: usize) -> Vec<TradeResult> {
        let history = self.history.read().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    pub async fn stats(&self) -> ExecutorStats {
        let history = self.history.read().await;
        let total = history.len() as u64;
        let successful = history.iter().filter(|r| r.success).count() as u64;
        let mut volume = BigDecimal::zero();
        for result in history.iter().filter(|r| r.success) {
            volume += &result.amount_in;
        }
        ExecutorStats {
            total_trades: total,
            successful_trades: successful,
            success_rate: if total == 0 { 0.0 } else { successful as f64 / total as f64 },
            total_volume: volume.with_prec(50),
            last_trade_time: history.back().map(|r| r.timestamp),
        }
    }
}
