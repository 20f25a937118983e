//! # Centralized Error Handling
//!
//! One typed error enum per failure domain, lifted into a top-level
//! [`BotError`] for the binary boundary. Messages carry enough context to
//! debug a failed tick from the log alone; none of them ever include key
//! material.

use thiserror::Error;

/// The top-level error type, encapsulating all failures within the agent.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),
    #[error("Trade error: {0}")]
    Trade(#[from] TradeError),
    #[error("Infrastructure setup error: {0}")]
    Infrastructure(String),
}

/// Startup-only failures. Fatal: the process exits 1 (invalid value) or 2
/// (missing required secret) without starting any loop.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("Malformed line {line} in {file}: expected at least {expected} fields, got {got}")]
    MalformedCsv {
        file: String,
        line: usize,
        expected: usize,
        got: usize,
    },
    #[error("Invalid token key '{0}': expected collection|category|type|additionalKey")]
    InvalidTokenKey(String),
}

/// HTTP or socket failures against the gateway, backend, or bundler.
/// Per-call: the enclosing loop retries on its next tick.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("Response from {endpoint} is missing the Data field")]
    MissingData { endpoint: String },
    #[error("Failed to parse response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
    #[error("Notification socket error: {0}")]
    Socket(String),
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Offline quoting failures over a pool snapshot.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Token {0} is not a side of pool {1}/{2}")]
    TokenNotInPool(String, String, String),
    #[error("Insufficient liquidity in pool {pool} to absorb input of {amount}")]
    InsufficientLiquidity { pool: String, amount: String },
    #[error("Pool {0} has zero active liquidity")]
    ZeroLiquidity(String),
    #[error("Invalid snapshot state: {0}")]
    InvalidSnapshot(String),
}

/// Execution-path failures. Each one fails a single intent; the batch and
/// the enclosing loop continue.
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("No pool or path found for {0} -> {1}")]
    NoRoute(String, String),
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Swap submission rejected: {0}")]
    Submission(String),
    #[error("Transaction {0} did not complete within {1} ms")]
    Timeout(String, u64),
    #[error("Transaction {tx_id} failed on-chain: {reason}")]
    Failed { tx_id: String, reason: String },
    #[error("Engine stopped mid-operation")]
    Cancelled,
}

impl TradeError {
    /// Cancellations are not recorded to history; everything else is.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TradeError::Cancelled)
    }
}
