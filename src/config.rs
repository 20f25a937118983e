//! # Environment-Driven Configuration
//!
//! All tunables load once from the process environment at startup and are
//! immutable afterwards. The struct serializes for the `/api/config` echo;
//! the private key is never serialized and never logged.

use std::str::FromStr;
use std::time::Duration;

use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::errors::ConfigError;
use crate::types::TokenKey;

/// Fixed delay inserted between trades of one batch to stay under the
/// bundler's rate limits.
pub const DEFAULT_TRADE_DELAY_MS: u64 = 5_000;

/// Gateway, bundler, and backend endpoints. Defaults are the vendor's
/// production URLs; each is overridable independently.
#[derive(Debug, Clone, Serialize)]
pub struct Endpoints {
    pub gateway_base_url: String,
    pub dex_contract_base_path: String,
    pub bundler_base_url: String,
    pub bundle_base_path: String,
    pub dex_backend_base_url: String,
    pub bundler_socket_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gateway_base_url: "https://gateway-mainnet.galachain.com".to_string(),
            dex_contract_base_path: "/api/asset/dexv3-contract".to_string(),
            bundler_base_url: "https://bundle-backend-prod1.defi.gala.com".to_string(),
            bundle_base_path: "/bundle".to_string(),
            dex_backend_base_url: "https://dex-backend-prod1.defi.gala.com".to_string(),
            bundler_socket_url: "wss://bundle-backend-prod1.defi.gala.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Token the agent accumulates.
    pub preferred_token: TokenKey,
    /// Display label for the preferred token.
    pub preferred_token_name: String,
    /// Token used to pay transaction fees.
    pub gas_token: TokenKey,
    /// Floor on the gas-token balance; below it rebalancing refills first.
    pub min_gas_balance: BigDecimal,
    pub trade_interval_ms: u64,
    /// Maximum tolerated undershoot of a quoted output, in percent.
    pub max_slippage_pct: BigDecimal,
    /// Percentage of a holding converted per rebalance intent.
    pub trade_amount_pct: BigDecimal,
    pub enable_arbitrage: bool,
    pub arbitrage_check_interval_ms: u64,
    pub arbitrage_min_profit_pct: BigDecimal,
    /// Notional (in the preferred token) simulated and traded per cycle.
    pub arbitrage_max_trade_size: BigDecimal,
    pub arbitrage_max_hops: usize,
    pub arbitrage_min_liquidity: BigDecimal,
    pub pool_cache_ttl_ms: u64,
    pub wallet_address: String,
    /// Signing key; excluded from every serialization and log line.
    #[serde(skip_serializing)]
    pub private_key: String,
    /// `false` = dry-run: no submissions, synthetic results.
    pub enable_trading: bool,
    pub transaction_timeout_ms: u64,
    pub port: u16,
    pub trade_delay_ms: u64,
    pub endpoints: Endpoints,
}

impl Config {
    /// Loads and validates every option from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let preferred_token: TokenKey =
            env_or("PREFERRED_TOKEN_KEY", "GALA|Unit|none|none").parse()?;
        let gas_token: TokenKey = env_or("GALA_TOKEN_KEY", "GALA|Unit|none|none").parse()?;

        let wallet_address =
            non_empty_env("WALLET_ADDRESS").ok_or(ConfigError::MissingSecret("WALLET_ADDRESS"))?;
        let private_key = non_empty_env("GALACHAIN_PRIVATE_KEY")
            .ok_or(ConfigError::MissingSecret("GALACHAIN_PRIVATE_KEY"))?;

        let arbitrage_max_hops: usize = parse_env("ARBITRAGE_MAX_HOPS", 3)?;
        if !(2..=4).contains(&arbitrage_max_hops) {
            return Err(ConfigError::InvalidValue {
                name: "ARBITRAGE_MAX_HOPS",
                reason: format!("{arbitrage_max_hops} is outside 2..=4"),
            });
        }

        let max_slippage_pct: BigDecimal = parse_decimal_env("MAX_SLIPPAGE", "5")?;
        if max_slippage_pct < BigDecimal::from(0) || max_slippage_pct > BigDecimal::from(100) {
            return Err(ConfigError::InvalidValue {
                name: "MAX_SLIPPAGE",
                reason: format!("{max_slippage_pct} is outside 0..=100"),
            });
        }

        let endpoints = Endpoints {
            gateway_base_url: env_or("GSWAP_GATEWAY_BASE_URL", &Endpoints::default().gateway_base_url),
            dex_contract_base_path: env_or(
                "GSWAP_DEX_CONTRACT_BASE_PATH",
                &Endpoints::default().dex_contract_base_path,
            ),
            bundler_base_url: env_or("GSWAP_BUNDLER_BASE_URL", &Endpoints::default().bundler_base_url),
            bundle_base_path: env_or("GSWAP_BUNDLE_BASE_PATH", &Endpoints::default().bundle_base_path),
            dex_backend_base_url: env_or(
                "GSWAP_DEX_BACKEND_BASE_URL",
                &Endpoints::default().dex_backend_base_url,
            ),
            bundler_socket_url: env_or(
                "GSWAP_BUNDLER_SOCKET_URL",
                &Endpoints::default().bundler_socket_url,
            ),
        };

        Ok(Self {
            preferred_token,
            preferred_token_name: env_or("PREFERRED_TOKEN_NAME", "$GALA"),
            gas_token,
            min_gas_balance: parse_decimal_env("MINIMUM_GALA_BALANCE", "100")?,
            trade_interval_ms: parse_env("TRADE_INTERVAL_MS", 60_000)?,
            max_slippage_pct,
            trade_amount_pct: parse_decimal_env("TRADE_AMOUNT_PERCENTAGE", "10")?,
            enable_arbitrage: parse_bool_env("ENABLE_ARBITRAGE", false)?,
            arbitrage_check_interval_ms: parse_env("ARBITRAGE_CHECK_INTERVAL_MS", 120_000)?,
            arbitrage_min_profit_pct: parse_decimal_env("ARBITRAGE_MIN_PROFIT_PERCENT", "1.0")?,
            arbitrage_max_trade_size: parse_decimal_env("ARBITRAGE_MAX_TRADE_SIZE", "100")?,
            arbitrage_max_hops,
            arbitrage_min_liquidity: parse_decimal_env("ARBITRAGE_MIN_LIQUIDITY", "1000")?,
            pool_cache_ttl_ms: parse_env("ARBITRAGE_POOL_CACHE_TTL", 60_000)?,
            wallet_address,
            private_key,
            enable_trading: parse_bool_env("ENABLE_TRADING", false)?,
            transaction_timeout_ms: parse_env("TRANSACTION_TIMEOUT_MS", 600_000)?,
            port: parse_env("PORT", 3000)?,
            trade_delay_ms: DEFAULT_TRADE_DELAY_MS,
            endpoints,
        })
    }

    pub fn trade_interval(&self) -> Duration {
        Duration::from_millis(self.trade_interval_ms)
    }

    pub fn arbitrage_check_interval(&self) -> Duration {
        Duration::from_millis(self.arbitrage_check_interval_ms)
    }

    pub fn pool_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.pool_cache_ttl_ms)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn trade_delay(&self) -> Duration {
        Duration::from_millis(self.trade_delay_ms)
    }

    /// True when the accumulation target is also the fee token; the
    /// spend-excess-gas rule is disabled in that case.
    pub fn preferred_is_gas(&self) -> bool {
        self.preferred_token == self.gas_token
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_env(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
            name,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

fn parse_decimal_env(name: &'static str, default: &str) -> Result<BigDecimal, ConfigError> {
    let raw = env_or(name, default);
    BigDecimal::from_str(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        name,
        reason: format!("'{raw}': {e}"),
    })
}

fn parse_bool_env(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match non_empty_env(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                name,
                reason: format!("'{other}' is not a boolean"),
            }),
        },
    }
}
