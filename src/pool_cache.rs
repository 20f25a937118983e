//! # Pool Snapshot Cache
//!
//! TTL cache of composite pool snapshots keyed by the canonical pool key.
//! Entries are evicted lazily on access and by the explicit sweep the
//! arbitrage loop runs each tick. Concurrent `get`s for the same key
//! coalesce into a single gateway fetch; distinct keys fetch in parallel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::errors::TransportError;
use crate::transport::Transport;
use crate::types::{PoolKey, PoolSnapshot, TokenKey};

#[derive(Clone)]
struct CacheEntry {
    snapshot: Arc<PoolSnapshot>,
    expires_at: Instant,
}

pub struct PoolCache {
    transport: Arc<dyn Transport>,
    ttl: Duration,
    entries: DashMap<PoolKey, CacheEntry>,
    // One async mutex per key serializes fetches for that key only. The
    // map is bounded by the registry's pool count.
    inflight: DashMap<PoolKey, Arc<Mutex<()>>>,
}

impl PoolCache {
    pub fn new(transport: Arc<dyn Transport>, ttl: Duration) -> Self {
        Self {
            transport,
            ttl,
            entries: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    /// Live snapshot for the pool, fetching through the gateway when the
    /// cached entry is absent or expired.
    #[instrument(skip(self), fields(pool = %format!("{token_a}/{token_b}@{fee}")))]
    pub async fn get(
        &self,
        token_a: &TokenKey,
        token_b: &TokenKey,
        fee: u32,
    ) -> Result<Arc<PoolSnapshot>, TransportError> {
        let key = PoolKey::new(token_a.clone(), token_b.clone(), fee);

        if let Some(entry) = self.live_entry(&key) {
            return Ok(entry);
        }

        let flight = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = flight.lock().await;

        // Another caller may have completed the fetch while this one
        // waited on the flight lock.
        if let Some(entry) = self.live_entry(&key) {
            return Ok(entry);
        }

        let snapshot = Arc::new(
            self.transport
                .fetch_composite_pool(token_a, token_b, fee)
                .await?,
        );
        self.entries.insert(
            key.clone(),
            CacheEntry {
                snapshot: snapshot.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        debug!(target: "pool_cache", pool = %key, ttl = ?self.ttl, "Snapshot cached");
        Ok(snapshot)
    }

    fn live_entry(&self, key: &PoolKey) -> Option<Arc<PoolSnapshot>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.snapshot.clone());
            }
        }
        // Lazy eviction of the expired entry.
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// All currently live snapshots, in canonical key order so dependent
    /// scans are deterministic.
    pub fn snapshot_all(&self) -> Vec<Arc<PoolSnapshot>> {
        let now = Instant::now();
        let mut live: Vec<(String, Arc<PoolSnapshot>)> = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| (entry.key().to_string(), entry.snapshot.clone()))
            .collect();
        live.sort_by(|a, b| a.0.cmp(&b.0));
        live.into_iter().map(|(_, s)| s).collect()
    }

    /// Explicit sweep; returns how many entries were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!(target: "pool_cache", dropped, "Expired snapshots evicted");
        }
        dropped
    }

    pub fn evict_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
