//! # Trading Engine
//!
//! Owns every collaborator and the two periodic loops: the balance-driven
//! rebalancer and the arbitrage scanner. Both loops tick immediately on
//! start, never overlap themselves, and stop cooperatively at their next
//! suspension point. Status is a pure read over engine state.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::balances::BalanceManager;
use crate::bundler::BundlerChannel;
use crate::config::Config;
use crate::detector::{ArbitrageDetector, DetectorStats};
use crate::errors::BotError;
use crate::executor::TradeExecutor;
use crate::pool_cache::PoolCache;
use crate::registry::Registry;
use crate::signer::LocalKeySigner;
use crate::transport::{HttpTransport, Transport};
use crate::types::{ArbitrageOpportunity, ArbitrageResult, BalanceSummary, TradeResult};

/// How many entries of each history ring the status snapshot carries.
const STATUS_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub config: Config,
    pub uptime_secs: i64,
    pub last_balance: Option<BalanceSummary>,
    pub last_balance_fetch: Option<DateTime<Utc>>,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub last_arbitrage_scan: Option<DateTime<Utc>>,
    pub trade_success_rate: f64,
    pub trade_volume: BigDecimal,
    pub recent_trades: Vec<TradeResult>,
    pub recent_opportunities: Vec<ArbitrageOpportunity>,
    pub recent_executions: Vec<ArbitrageResult>,
    pub arbitrage_stats: DetectorStats,
}

#[derive(Default)]
struct EngineState {
    cancel: Option<CancellationToken>,
    started_at: Option<DateTime<Utc>>,
    last_balance: Option<BalanceSummary>,
    last_balance_fetch: Option<DateTime<Utc>>,
    last_arbitrage_scan: Option<DateTime<Utc>>,
}

pub struct Engine {
    config: Arc<Config>,
    pool_cache: Arc<PoolCache>,
    detector: Arc<ArbitrageDetector>,
    balances: Arc<BalanceManager>,
    executor: Arc<TradeExecutor>,
    bundler: Arc<BundlerChannel>,
    state: RwLock<EngineState>,
}

impl Engine {
    /// Production wiring: local signer, HTTP transport, CSV registry.
    pub fn from_config(config: Config) -> Result<Arc<Self>, BotError> {
        let signer = Arc::new(LocalKeySigner::new(&config.private_key)?);
        let transport = Arc::new(HttpTransport::new(config.endpoints.clone(), signer)?);
        let registry = Arc::new(Registry::load_default()?);
        Ok(Self::with_transport(config, registry, transport))
    }

    /// Wiring seam used by tests and alternative transports.
    pub fn with_transport(
        config: Config,
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let pool_cache = Arc::new(PoolCache::new(transport.clone(), config.pool_cache_ttl()));
        let bundler = Arc::new(BundlerChannel::new(config.endpoints.bundler_socket_url.clone()));
        let detector = Arc::new(ArbitrageDetector::new(
            registry.clone(),
            pool_cache.clone(),
            config.preferred_token.clone(),
            config.arbitrage_max_hops,
            config.arbitrage_min_liquidity.clone(),
            config.arbitrage_min_profit_pct.clone(),
            config.arbitrage_max_trade_size.clone(),
        ));
        let balances = Arc::new(BalanceManager::new(transport.clone(), config.clone()));
        let executor = Arc::new(TradeExecutor::new(
            transport,
            pool_cache.clone(),
            registry,
            bundler.clone(),
            config.clone(),
        ));

        Arc::new(Self {
            config,
            pool_cache,
            detector,
            balances,
            executor,
            bundler,
            state: RwLock::new(EngineState::default()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.cancel.is_some()
    }

    /// Starts both loops. Idempotent: a second start while running is a
    /// logged no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut state = self.state.write().await;
        if state.cancel.is_some() {
            info!(target: "engine", "Start requested but engine is already running");
            return;
        }

        let cancel = CancellationToken::new();
        state.cancel = Some(cancel.clone());
        state.started_at = Some(Utc::now());
        drop(state);

        self.bundler.open().await;

        info!(
            target: "engine",
            preferred = %self.config.preferred_token,
            gas = %self.config.gas_token,
            dry_run = !self.config.enable_trading,
            arbitrage = self.config.enable_arbitrage,
            "Engine starting"
        );

        let engine = self.clone();
        let loop_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(engine.config.trade_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                // Cancellation lands at the tick's next suspension point;
                // an in-flight swap continues on-chain.
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = engine.rebalance_tick() => {}
                }
            }
            info!(target: "engine", "Rebalance loop stopped");
        });

        if self.config.enable_arbitrage {
            let engine = self.clone();
            let loop_cancel = cancel;
            tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval(engine.config.arbitrage_check_interval());
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = loop_cancel.cancelled() => break,
                        _ = interval.tick() => {}
                    }
                    // Cancellation lands at the tick's next suspension
                    // point; an in-flight swap continues on-chain.
                    tokio::select! {
                        _ = loop_cancel.cancelled() => break,
                        _ = engine.arbitrage_tick() => {}
                    }
                }
                info!(target: "engine", "Arbitrage loop stopped");
            });
        }
    }

    /// Cancels both loops at their next suspension point and closes the
    /// notification channel. Idempotent.
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        match state.cancel.take() {
            Some(cancel) => {
                cancel.cancel();
                state.started_at = None;
                drop(state);
                self.bundler.close().await;
                info!(target: "engine", "Engine stopped");
            }
            None => {
                info!(target: "engine", "Stop requested but engine is not running");
            }
        }
    }

    /// One rebalance pass: fetch balances, derive intents, execute, then
    /// refresh the balance view for status. A failed tick is logged and
    /// the loop carries on at the next interval.
    #[instrument(skip(self))]
    async fn rebalance_tick(&self) {
        let summary = match self.balances.fetch_summary().await {
            Ok(summary) => summary,
            Err(e) => {
                // Status keeps the last known good balance.
                warn!(target: "engine", error = %e, "Balance fetch failed, skipping tick");
                return;
            }
        };
        self.store_balance(summary.clone()).await;

        let intents = self.balances.derive_intents(&summary);
        if intents.is_empty() {
            info!(target: "engine", "No trades this tick");
            return;
        }

        let results = self.executor.execute_batch(intents).await;
        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            target: "engine",
            total = results.len(),
            succeeded,
            "Rebalance batch complete"
        );

        match self.balances.fetch_summary().await {
            Ok(refreshed) => self.store_balance(refreshed).await,
            Err(e) => warn!(target: "engine", error = %e, "Post-batch balance refresh failed"),
        }
    }

    /// One arbitrage pass: scan, execute the top survivor, sweep the
    /// snapshot cache.
    #[instrument(skip(self))]
    async fn arbitrage_tick(&self) {
        let opportunities = self.detector.scan().await;
        self.state.write().await.last_arbitrage_scan = Some(Utc::now());

        if let Some(top) = opportunities.first() {
            info!(
                target: "engine",
                route = %top.route_label(),
                expected_pct = %top.profit_pct,
                "Executing top arbitrage opportunity"
            );
            let result = self.executor.execute_arbitrage(top).await;
            self.detector.record_execution(result).await;
        }

        self.pool_cache.evict_expired();
    }

    async fn store_balance(&self, summary: BalanceSummary) {
        let mut state = self.state.write().await;
        state.last_balance = Some(summary);
        state.last_balance_fetch = Some(Utc::now());
    }

    /// Point-in-time snapshot for the control surface. Reads engine state
    /// and history rings only; never touches the transport.
    pub async fn status(&self) -> EngineStatus {
        let state = self.state.read().await;
        let trade_stats = self.executor.stats().await;
        let arbitrage_stats = self.detector.stats().await;

        EngineStatus {
            running: state.cancel.is_some(),
            config: (*self.config).clone(),
            uptime_secs: state
                .started_at
                .map(|t| (Utc::now() - t).num_seconds())
                .unwrap_or(0),
            last_balance: state.last_balance.clone(),
            last_balance_fetch: state.last_balance_fetch,
            last_trade_time: trade_stats.last_trade_time,
            last_arbitrage_scan: state.last_arbitrage_scan,
            trade_success_rate: trade_stats.success_rate,
            trade_volume: trade_stats.total_volume,
            recent_trades: self.executor.recent_trades(STATUS_HISTORY_LIMIT).await,
            recent_opportunities: self.detector.recent_opportunities(STATUS_HISTORY_LIMIT).await,
            recent_executions: self.detector.recent_executions(STATUS_HISTORY_LIMIT).await,
            arbitrage_stats,
        }
    }
}
