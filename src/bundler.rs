//! # Transaction Notification Channel
//!
//! A single multiplexed socket delivers terminal swap outcomes keyed by
//! transaction id. The engine owns one `BundlerChannel`; the executor
//! registers a waiter per submission and resolves it when the matching
//! event arrives. Events that land before their waiter registers are
//! stashed briefly so the submission/notification race cannot drop an
//! outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::TradeError;

/// How long an unclaimed event stays in the stash before the sweep drops
/// it. Anything older has no submission still waiting on it.
const UNCLAIMED_EVENT_TTL: Duration = Duration::from_secs(120);

const RECONNECT_BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Processed,
    Failed,
}

/// Terminal outcome of one submitted transaction.
#[derive(Debug, Clone)]
pub struct TxEvent {
    pub tx_id: String,
    pub status: TxStatus,
    pub payload: serde_json::Value,
}

/// Owned notification-channel collaborator with an explicit lifecycle and
/// a typed waiter registry keyed by transaction id.
#[derive(Debug)]
pub struct BundlerChannel {
    socket_url: String,
    waiters: Arc<DashMap<String, oneshot::Sender<TxEvent>>>,
    unclaimed: Arc<DashMap<String, (TxEvent, Instant)>>,
    connected: Arc<AtomicBool>,
    lifecycle: Mutex<Option<CancellationToken>>,
}

impl BundlerChannel {
    pub fn new(socket_url: impl Into<String>) -> Self {
        Self {
            socket_url: socket_url.into(),
            waiters: Arc::new(DashMap::new()),
            unclaimed: Arc::new(DashMap::new()),
            connected: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Starts the consumer task. Idempotent: a second `open` while running
    /// is a no-op.
    pub async fn open(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            debug!(target: "bundler", "Notification channel already open");
            return;
        }
        let cancel = CancellationToken::new();
        *lifecycle = Some(cancel.clone());

        let url = self.socket_url.clone();
        let waiters = self.waiters.clone();
        let unclaimed = self.unclaimed.clone();
        let connected = self.connected.clone();
        tokio::spawn(async move {
            consume(url, waiters, unclaimed, connected, cancel).await;
        });
    }

    /// Stops the consumer task and drops every outstanding waiter; their
    /// awaits resolve as cancelled.
    pub async fn close(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Some(cancel) = lifecycle.take() {
            cancel.cancel();
        }
        self.waiters.clear();
        self.unclaimed.clear();
        self.connected.store(false, Ordering::Release);
        info!(target: "bundler", "Notification channel closed");
    }

    /// Awaits the terminal event for `tx_id`, up to `timeout`. A timeout
    /// resolves locally as failed; the on-chain state stays unknown.
    pub async fn await_transaction(
        &self,
        tx_id: &str,
        timeout: Duration,
    ) -> Result<TxEvent, TradeError> {
        if let Some((_, (event, _))) = self.unclaimed.remove(tx_id) {
            return Ok(event);
        }

        let (tx, rx) = oneshot::channel();
        self.waiters.insert(tx_id.to_string(), tx);

        // The event may have raced in between the stash check and the
        // waiter insert; re-check before blocking.
        if let Some((_, (event, _))) = self.unclaimed.remove(tx_id) {
            self.waiters.remove(tx_id);
            return Ok(event);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(TradeError::Cancelled),
            Err(_) => {
                self.waiters.remove(tx_id);
                Err(TradeError::Timeout(tx_id.to_string(), timeout.as_millis() as u64))
            }
        }
    }

    /// Test/support entry: routes one event exactly as the socket consumer
    /// would.
    pub fn deliver(&self, event: TxEvent) {
        route_event(&self.waiters, &self.unclaimed, event);
    }
}

fn route_event(
    waiters: &DashMap<String, oneshot::Sender<TxEvent>>,
    unclaimed: &DashMap<String, (TxEvent, Instant)>,
    event: TxEvent,
) {
    if let Some((_, waiter)) = waiters.remove(&event.tx_id) {
        let tx_id = event.tx_id.clone();
        if waiter.send(event).is_err() {
            debug!(target: "bundler", tx_id = %tx_id, "Waiter gone before delivery");
        }
        return;
    }

    let now = Instant::now();
    unclaimed.retain(|_, (_, stored)| now.duration_since(*stored) < UNCLAIMED_EVENT_TTL);
    unclaimed.insert(event.tx_id.clone(), (event, now));
}

fn parse_frame(text: &str) -> Option<TxEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let tx_id = value
        .get("transactionId")
        .or_else(|| value.get("id"))
        .and_then(|v| v.as_str())?
        .to_string();
    let status = match value.get("status").and_then(|v| v.as_str())? {
        "PROCESSED" => TxStatus::Processed,
        "FAILED" => TxStatus::Failed,
        // Interim states are not terminal outcomes.
        _ => return None,
    };
    let payload = value.get("data").cloned().unwrap_or(serde_json::Value::Null);
    Some(TxEvent { tx_id, status, payload })
}

async fn consume(
    url: String,
    waiters: Arc<DashMap<String, oneshot::Sender<TxEvent>>>,
    unclaimed: Arc<DashMap<String, (TxEvent, Instant)>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut backoff = RECONNECT_BACKOFF_INITIAL;
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let stream = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connect_async(url.as_str()) => result,
        };

        let (mut ws, _) = match stream {
            Ok(pair) => pair,
            Err(e) => {
                warn!(target: "bundler", error = %e, retry_in = ?backoff, "Socket connect failed");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(RECONNECT_BACKOFF_MAX);
                continue;
            }
        };

        info!(target: "bundler", url = %url, "Notification socket connected");
        connected.store(true, Ordering::Release);
        backoff = RECONNECT_BACKOFF_INITIAL;

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    connected.store(false, Ordering::Release);
                    return;
                }
                msg = ws.next() => msg,
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_frame(&text) {
                        debug!(
                            target: "bundler",
                            tx_id = %event.tx_id,
                            status = ?event.status,
                            "Terminal transaction event"
                        );
                        route_event(&waiters, &unclaimed, event);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    warn!(target: "bundler", "Notification socket disconnected, reconnecting");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(target: "bundler", error = %e, "Notification socket error, reconnecting");
                    break;
                }
            }
        }

        connected.store(false, Ordering::Release);
    }
}
