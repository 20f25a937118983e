//! # Arbitrage Detector
//!
//! Orchestrates a scan: refresh snapshots for every candidate pool, walk
//! the cycle space from the preferred token, simulate each cycle with the
//! scan notional, and keep the profitable remainder. Detection and
//! execution histories are capped in-memory rings consulted by the status
//! surface.

use std::collections::VecDeque;
use std::sync::Arc;

use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::pathfinder::find_circular_paths;
use crate::pool_cache::PoolCache;
use crate::profit::{evaluate_cycle, rank_opportunities};
use crate::registry::Registry;
use crate::types::{ArbitrageOpportunity, ArbitrageResult, PoolSnapshot, TokenKey};

/// Ring size for both detection and execution history.
pub const HISTORY_CAP: usize = 1_000;

#[derive(Debug, Clone, Serialize)]
pub struct DetectorStats {
    pub total_detected: u64,
    pub total_executed: u64,
    pub successful_executions: u64,
    pub success_rate: f64,
    pub realized_profit_sum: BigDecimal,
    pub average_realized_profit_pct: f64,
}

pub struct ArbitrageDetector {
    registry: Arc<Registry>,
    pool_cache: Arc<PoolCache>,
    base_token: TokenKey,
    max_hops: usize,
    min_liquidity: BigDecimal,
    min_profit_pct: BigDecimal,
    scan_notional: BigDecimal,
    detected: RwLock<VecDeque<ArbitrageOpportunity>>,
    executions: RwLock<VecDeque<ArbitrageResult>>,
    total_detected: RwLock<u64>,
}

impl ArbitrageDetector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry>,
        pool_cache: Arc<PoolCache>,
        base_token: TokenKey,
        max_hops: usize,
        min_liquidity: BigDecimal,
        min_profit_pct: BigDecimal,
        scan_notional: BigDecimal,
    ) -> Self {
        Self {
            registry,
            pool_cache,
            base_token,
            max_hops,
            min_liquidity,
            min_profit_pct,
            scan_notional,
            detected: RwLock::new(VecDeque::new()),
            executions: RwLock::new(VecDeque::new()),
            total_detected: RwLock::new(0),
        }
    }

    /// One full detection pass. Per-pool fetch failures are logged and
    /// skipped; the scan proceeds with whatever state it could gather.
    #[instrument(skip(self), fields(base = %self.base_token))]
    pub async fn scan(&self) -> Vec<ArbitrageOpportunity> {
        let candidates = self.registry.pools_above_liquidity(&self.min_liquidity);
        if candidates.is_empty() {
            debug!(target: "arbitrage", "No candidate pools above the liquidity floor");
            return Vec::new();
        }

        let mut snapshots: Vec<Arc<PoolSnapshot>> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self
                .pool_cache
                .get(&candidate.token0, &candidate.token1, candidate.fee)
                .await
            {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!(
                        target: "arbitrage",
                        pool = %format!("{}/{}@{}", candidate.token0, candidate.token1, candidate.fee),
                        error = %e,
                        "Skipping pool: snapshot fetch failed"
                    );
                }
            }
        }

        let cycles = find_circular_paths(
            &self.base_token,
            &snapshots,
            self.max_hops,
            &self.min_liquidity,
        );

        let mut evaluated = Vec::with_capacity(cycles.len());
        for cycle in &cycles {
            match evaluate_cycle(cycle, &snapshots, &self.scan_notional) {
                Ok(opportunity) => evaluated.push(opportunity),
                Err(e) => {
                    debug!(target: "arbitrage", error = %e, "Cycle simulation failed");
                }
            }
        }

        let ranked = rank_opportunities(evaluated, &self.min_profit_pct);
        if !ranked.is_empty() {
            info!(
                target: "arbitrage",
                count = ranked.len(),
                best_route = %ranked[0].route_label(),
                best_pct = %ranked[0].profit_pct,
                "Profitable cycles detected"
            );
        }

        self.record_detected(&ranked).await;
        ranked
    }

    async fn record_detected(&self, opportunities: &[ArbitrageOpportunity]) {
        if opportunities.is_empty() {
            return;
        }
        let mut detected = self.detected.write().await;
        for opportunity in opportunities {
            detected.push_back(opportunity.clone());
            if detected.len() > HISTORY_CAP {
                detected.pop_front();
            }
        }
        *self.total_detected.write().await += opportunities.len() as u64;
    }

    pub async fn record_execution(&self, result: ArbitrageResult) {
        let mut executions = self.executions.write().await;
        executions.push_back(result);
        if executions.len() > HISTORY_CAP {
            executions.pop_front();
        }
    }

    pub async fn recent_opportunities(&self, limit: usize) -> Vec<ArbitrageOpportunity> {
        let detected = self.detected.read().await;
        detected.iter().rev().take(limit).cloned().collect()
    }

    pub async fn recent_executions(&self, limit: usize) -> Vec<ArbitrageResult> {
        let executions = self.executions.read().await;
        executions.iter().rev().take(limit).cloned().collect()
    }

    pub async fn stats(&self) -> DetectorStats {
        let executions = self.executions.read().await;
        let total_executed = executions.len() as u64;
        let successful = executions.iter().filter(|e| e.success).count() as u64;

        let mut realized_profit_sum = BigDecimal::zero();
        let mut pct_sum = BigDecimal::zero();
        let mut pct_count = 0u64;
        for execution in executions.iter() {
            if let Some(profit) = &execution.realized_profit {
                realized_profit_sum += profit;
                if !execution.input_amount.is_zero() {
                    pct_sum += (profit / &execution.input_amount) * BigDecimal::from(100);
                    pct_count += 1;
                }
            }
        }

        DetectorStats {
            total_detected: *self.total_detected.read().await,
            total_executed,
            successful_executions: successful,
            success_rate: if total_executed == 0 {
                0.0
            } else {
                successful as f64 / total_executed as f64
            },
            realized_profit_sum,
            average_realized_profit_pct: if pct_count == 0 {
                0.0
            } else {
                (pct_sum / BigDecimal::from(pct_count))
                    .to_f64()
                    .unwrap_or(0.0)
            },
        }
    }
}
