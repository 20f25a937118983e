//! Shared test harness: deterministic snapshot builders, a scriptable
//! in-memory transport, and config fixtures.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;

use gswap_agent::bundler::{BundlerChannel, TxEvent, TxStatus};
use gswap_agent::config::{Config, Endpoints};
use gswap_agent::errors::TransportError;
use gswap_agent::registry::{PoolCandidate, Registry, TokenInfo};
use gswap_agent::transport::{PendingSwap, RawAsset, SwapRequest, Transport};
use gswap_agent::types::{tick_spacing, PoolKey, PoolSnapshot, TickInfo, TokenKey};

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

pub fn key(symbol: &str) -> TokenKey {
    TokenKey::from_symbol(symbol)
}

/// Pool snapshot with canonical side ordering and an empty tick map.
pub fn snapshot(sym0: &str, sym1: &str, fee: u32, sqrt_price: &str, liquidity: &str) -> PoolSnapshot {
    let (t0, t1) = {
        let a = key(sym0);
        let b = key(sym1);
        if a <= b { (a, b) } else { (b, a) }
    };
    PoolSnapshot {
        token0: t0,
        token1: t1,
        decimals0: 8,
        decimals1: 8,
        fee,
        sqrt_price: dec(sqrt_price),
        liquidity: dec(liquidity),
        tick_spacing: tick_spacing(fee),
        ticks: BTreeMap::new(),
        fetched_at: Utc::now(),
    }
}

/// Adds an initialized tick to a snapshot.
pub fn with_tick(mut snapshot: PoolSnapshot, tick: i32, net: &str, gross: &str) -> PoolSnapshot {
    snapshot.ticks.insert(
        tick,
        TickInfo {
            liquidity_net: dec(net),
            liquidity_gross: dec(gross),
            fee_growth_outside0: BigDecimal::from(0),
            fee_growth_outside1: BigDecimal::from(0),
        },
    );
    snapshot
}

/// Dry-run config fixture with instant batches and a dead socket.
pub fn test_config() -> Config {
    Config {
        preferred_token: key("GALA"),
        preferred_token_name: "$GALA".to_string(),
        gas_token: key("GALA"),
        min_gas_balance: BigDecimal::from(100),
        trade_interval_ms: 60_000,
        max_slippage_pct: BigDecimal::from(5),
        trade_amount_pct: BigDecimal::from(10),
        enable_arbitrage: false,
        arbitrage_check_interval_ms: 120_000,
        arbitrage_min_profit_pct: dec("1.0"),
        arbitrage_max_trade_size: BigDecimal::from(100),
        arbitrage_max_hops: 3,
        arbitrage_min_liquidity: BigDecimal::from(1000),
        pool_cache_ttl_ms: 60_000,
        wallet_address: "client|tester".to_string(),
        private_key: "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
            .to_string(),
        enable_trading: false,
        transaction_timeout_ms: 2_000,
        port: 0,
        trade_delay_ms: 0,
        endpoints: Endpoints {
            bundler_socket_url: "ws://127.0.0.1:9".to_string(),
            ..Endpoints::default()
        },
    }
}

pub fn registry_with_pools(pools: Vec<(&str, &str, u32, &str)>) -> Registry {
    let symbols = ["GALA", "GUSDC", "GUSDT", "GWETH", "GWBTC", "SILK", "A", "B", "C", "D"];
    let tokens = symbols
        .iter()
        .map(|s| TokenInfo {
            symbol: s.to_string(),
            key: key(s),
            decimals: 8,
            description: String::new(),
        })
        .collect();
    let candidates = pools
        .into_iter()
        .map(|(a, b, fee, liq)| PoolCandidate {
            token0: key(a),
            token1: key(b),
            fee,
            observed_liquidity: dec(liq),
        })
        .collect();
    Registry::from_parts(tokens, candidates)
}

/// Raw asset in the bare-symbol wire shape.
pub fn asset(symbol: &str, quantity: &str) -> RawAsset {
    serde_json::from_value(serde_json::json!({
        "symbol": symbol,
        "quantity": quantity,
        "decimals": 8,
    }))
    .unwrap()
}

/// Scriptable in-memory transport. Pools and quotes are looked up from
/// maps; submissions are recorded and auto-confirmed through an attached
/// bundler channel.
pub struct MockTransport {
    pools: Mutex<HashMap<PoolKey, PoolSnapshot>>,
    quotes: Mutex<HashMap<(TokenKey, TokenKey, u32), BigDecimal>>,
    assets: Mutex<Vec<RawAsset>>,
    pub submissions: Mutex<Vec<SwapRequest>>,
    pub pool_fetches: AtomicUsize,
    pub asset_fetches: AtomicUsize,
    tx_counter: AtomicUsize,
    bundler: Mutex<Option<Arc<BundlerChannel>>>,
    confirm_as: Mutex<TxStatus>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockTransport")
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            quotes: Mutex::new(HashMap::new()),
            assets: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            pool_fetches: AtomicUsize::new(0),
            asset_fetches: AtomicUsize::new(0),
            tx_counter: AtomicUsize::new(0),
            bundler: Mutex::new(None),
            confirm_as: Mutex::new(TxStatus::Processed),
        }
    }

    pub fn add_pool(&self, snapshot: PoolSnapshot) {
        self.pools.lock().unwrap().insert(snapshot.key(), snapshot);
    }

    pub fn add_quote(&self, from: &str, to: &str, fee: u32, amount_out: &str) {
        self.quotes
            .lock()
            .unwrap()
            .insert((key(from), key(to), fee), dec(amount_out));
    }

    pub fn set_assets(&self, assets: Vec<RawAsset>) {
        *self.assets.lock().unwrap() = assets;
    }

    /// Terminal outcomes for submissions are pushed through this channel.
    pub fn attach_bundler(&self, bundler: Arc<BundlerChannel>) {
        *self.bundler.lock().unwrap() = Some(bundler);
    }

    pub fn confirm_as(&self, status: TxStatus) {
        *self.confirm_as.lock().unwrap() = status;
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_composite_pool(
        &self,
        token_a: &TokenKey,
        token_b: &TokenKey,
        fee: u32,
    ) -> Result<PoolSnapshot, TransportError> {
        self.pool_fetches.fetch_add(1, Ordering::SeqCst);
        let pool_key = PoolKey::new(token_a.clone(), token_b.clone(), fee);
        self.pools
            .lock()
            .unwrap()
            .get(&pool_key)
            .cloned()
            .ok_or(TransportError::MissingData {
                endpoint: format!("GetCompositePool {pool_key}"),
            })
    }

    async fn quote_exact_input(
        &self,
        token_in: &TokenKey,
        token_out: &TokenKey,
        fee: u32,
        _amount_in: &BigDecimal,
    ) -> Result<BigDecimal, TransportError> {
        self.quotes
            .lock()
            .unwrap()
            .get(&(token_in.clone(), token_out.clone(), fee))
            .cloned()
            .ok_or(TransportError::MissingData {
                endpoint: format!("QuoteExactAmount {token_in}->{token_out}@{fee}"),
            })
    }

    async fn fetch_user_assets(
        &self,
        _address: &str,
        page: u32,
        _page_size: u32,
    ) -> Result<Vec<RawAsset>, TransportError> {
        self.asset_fetches.fetch_add(1, Ordering::SeqCst);
        if page > 1 {
            return Ok(Vec::new());
        }
        Ok(self.assets.lock().unwrap().clone())
    }

    async fn submit_swap(&self, request: &SwapRequest) -> Result<PendingSwap, TransportError> {
        self.submissions.lock().unwrap().push(request.clone());
        let tx_id = format!("mock-tx-{}", self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1);
        if let Some(bundler) = self.bundler.lock().unwrap().as_ref() {
            bundler.deliver(TxEvent {
                tx_id: tx_id.clone(),
                status: *self.confirm_as.lock().unwrap(),
                payload: serde_json::Value::Null,
            });
        }
        Ok(PendingSwap { tx_id })
    }
}
