//! # Gateway / Bundler HTTP Transport
//!
//! One HTTP client for every chain-facing call: composite pool state,
//! exact-input quotes, wallet inventory, and signed swap submission. The
//! engine owns a single instance and hands it to the balance manager and
//! executor by reference; the offline quote engine never touches it.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::Endpoints;
use crate::errors::TransportError;
use crate::signer::PayloadSigner;
use crate::types::{tick_spacing, PoolSnapshot, TickInfo, TokenKey, FEE_TIERS};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Exact-input swap submission, as handed to the bundler after signing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub token_in: TokenKey,
    pub token_out: TokenKey,
    pub fee: u32,
    pub amount_in: String,
    pub amount_out_minimum: String,
    pub recipient: String,
}

/// Handle for a submitted swap; the terminal outcome arrives later on the
/// notification channel under this id.
#[derive(Debug, Clone)]
pub struct PendingSwap {
    pub tx_id: String,
}

/// One wallet holding as the backend reports it. The shape is
/// heterogeneous: some entries nest a `tokenClassKey`, others flatten the
/// class fields, the oldest only carry a symbol.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAsset {
    pub symbol: Option<String>,
    pub quantity: Option<String>,
    pub balance: Option<String>,
    pub decimals: Option<u8>,
    pub token_class_key: Option<RawTokenClass>,
    pub collection: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub token_type: Option<String>,
    pub additional_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenClass {
    pub collection: String,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub token_type: Option<String>,
    pub additional_key: Option<String>,
}

/// Chain-facing operations the rest of the agent depends on. Tests
/// substitute an in-memory implementation.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Fetches the composite state of one pool (√price, liquidity, ticks).
    async fn fetch_composite_pool(
        &self,
        token_a: &TokenKey,
        token_b: &TokenKey,
        fee: u32,
    ) -> Result<PoolSnapshot, TransportError>;

    /// Asks the gateway for an exact-input quote; returns the expected
    /// output amount.
    async fn quote_exact_input(
        &self,
        token_in: &TokenKey,
        token_out: &TokenKey,
        fee: u32,
        amount_in: &BigDecimal,
    ) -> Result<BigDecimal, TransportError>;

    /// One page of the wallet's asset inventory.
    async fn fetch_user_assets(
        &self,
        address: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawAsset>, TransportError>;

    /// Signs and submits a swap; returns the pending transaction handle.
    async fn submit_swap(&self, request: &SwapRequest) -> Result<PendingSwap, TransportError>;
}

/// Production transport over the vendor gateway, backend, and bundler.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    endpoints: Endpoints,
    signer: Arc<dyn PayloadSigner>,
}

impl HttpTransport {
    pub fn new(endpoints: Endpoints, signer: Arc<dyn PayloadSigner>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("gswap-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Socket(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoints, signer })
    }

    fn dex_url(&self, method: &str) -> String {
        format!(
            "{}{}/{}",
            self.endpoints.gateway_base_url, self.endpoints.dex_contract_base_path, method
        )
    }

    async fn post_json<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .post(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|source| TransportError::Http { endpoint: endpoint.to_string(), source })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| TransportError::Http { endpoint: endpoint.to_string(), source })?;

        if !status.is_success() {
            return Err(TransportError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: truncate(&text, 512),
            });
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Malformed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenClassDto<'a> {
    collection: &'a str,
    category: &'a str,
    #[serde(rename = "type")]
    token_type: &'a str,
    additional_key: &'a str,
}

impl<'a> From<&'a TokenKey> for TokenClassDto<'a> {
    fn from(key: &'a TokenKey) -> Self {
        Self {
            collection: &key.collection,
            category: &key.category,
            token_type: &key.token_type,
            additional_key: &key.additional_key,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompositePoolWire {
    token0: RawTokenClass,
    token1: RawTokenClass,
    #[serde(default)]
    token0_decimals: Option<u8>,
    #[serde(default)]
    token1_decimals: Option<u8>,
    fee: u32,
    sqrt_price: String,
    liquidity: String,
    #[serde(default)]
    tick_data: BTreeMap<String, TickWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickWire {
    liquidity_net: String,
    liquidity_gross: String,
    #[serde(default)]
    fee_growth_outside0: Option<String>,
    #[serde(default)]
    fee_growth_outside1: Option<String>,
}

fn class_to_key(class: &RawTokenClass) -> TokenKey {
    TokenKey {
        collection: class.collection.clone(),
        category: class.category.clone().unwrap_or_else(|| "Unit".to_string()),
        token_type: class.token_type.clone().unwrap_or_else(|| "none".to_string()),
        additional_key: class.additional_key.clone().unwrap_or_else(|| "none".to_string()),
    }
}

fn decimal_field(
    endpoint: &str,
    name: &str,
    raw: &str,
) -> Result<BigDecimal, TransportError> {
    BigDecimal::from_str(raw.trim()).map_err(|e| TransportError::Malformed {
        endpoint: endpoint.to_string(),
        reason: format!("{name} '{raw}': {e}"),
    })
}

/// Decodes the wire composite-pool shape into the internal snapshot,
/// converting every numeric string to a decimal and validating the
/// snapshot invariants.
fn parse_composite_pool(
    endpoint: &str,
    wire: CompositePoolWire,
) -> Result<PoolSnapshot, TransportError> {
    let token0 = class_to_key(&wire.token0);
    let token1 = class_to_key(&wire.token1);
    if token0 == token1 {
        return Err(TransportError::Malformed {
            endpoint: endpoint.to_string(),
            reason: format!("pool sides are identical: {token0}"),
        });
    }
    if !FEE_TIERS.contains(&wire.fee) {
        return Err(TransportError::Malformed {
            endpoint: endpoint.to_string(),
            reason: format!("fee {} is not one of {:?}", wire.fee, FEE_TIERS),
        });
    }

    let spacing = tick_spacing(wire.fee);
    let mut ticks = BTreeMap::new();
    for (raw_tick, tick) in wire.tick_data {
        let index: i32 = raw_tick.trim().parse().map_err(|e| TransportError::Malformed {
            endpoint: endpoint.to_string(),
            reason: format!("tick index '{raw_tick}': {e}"),
        })?;
        if index % spacing != 0 {
            return Err(TransportError::Malformed {
                endpoint: endpoint.to_string(),
                reason: format!("tick {index} is not a multiple of spacing {spacing}"),
            });
        }
        ticks.insert(
            index,
            TickInfo {
                liquidity_net: decimal_field(endpoint, "liquidityNet", &tick.liquidity_net)?,
                liquidity_gross: decimal_field(endpoint, "liquidityGross", &tick.liquidity_gross)?,
                fee_growth_outside0: tick
                    .fee_growth_outside0
                    .as_deref()
                    .map(|v| decimal_field(endpoint, "feeGrowthOutside0", v))
                    .transpose()?
                    .unwrap_or_default(),
                fee_growth_outside1: tick
                    .fee_growth_outside1
                    .as_deref()
                    .map(|v| decimal_field(endpoint, "feeGrowthOutside1", v))
                    .transpose()?
                    .unwrap_or_default(),
            },
        );
    }

    Ok(PoolSnapshot {
        decimals0: wire.token0_decimals.unwrap_or(8),
        decimals1: wire.token1_decimals.unwrap_or(8),
        token0,
        token1,
        fee: wire.fee,
        sqrt_price: decimal_field(endpoint, "sqrtPrice", &wire.sqrt_price)?,
        liquidity: decimal_field(endpoint, "liquidity", &wire.liquidity)?,
        tick_spacing: spacing,
        ticks,
        fetched_at: Utc::now(),
    })
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self), fields(pool = %format!("{token_a}/{token_b}@{fee}")))]
    async fn fetch_composite_pool(
        &self,
        token_a: &TokenKey,
        token_b: &TokenKey,
        fee: u32,
    ) -> Result<PoolSnapshot, TransportError> {
        // The gateway expects the sides in canonical order.
        let (t0, t1) = if token_a <= token_b { (token_a, token_b) } else { (token_b, token_a) };
        let endpoint = self.dex_url("GetCompositePool");
        let body = serde_json::json!({
            "token0": TokenClassDto::from(t0),
            "token1": TokenClassDto::from(t1),
            "fee": fee,
        });

        let reply = self.post_json(&endpoint, &body).await?;
        let data = reply
            .get("Data")
            .cloned()
            .ok_or_else(|| TransportError::MissingData { endpoint: endpoint.clone() })?;
        let wire: CompositePoolWire =
            serde_json::from_value(data).map_err(|e| TransportError::Malformed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        let snapshot = parse_composite_pool(&endpoint, wire)?;
        debug!(
            target: "transport",
            pool = %snapshot.key(),
            ticks = snapshot.ticks.len(),
            "Composite pool fetched"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self, amount_in), fields(swap = %format!("{token_in}->{token_out}@{fee}")))]
    async fn quote_exact_input(
        &self,
        token_in: &TokenKey,
        token_out: &TokenKey,
        fee: u32,
        amount_in: &BigDecimal,
    ) -> Result<BigDecimal, TransportError> {
        let endpoint = self.dex_url("QuoteExactAmount");
        let body = serde_json::json!({
            "tokenIn": TokenClassDto::from(token_in),
            "tokenOut": TokenClassDto::from(token_out),
            "fee": fee,
            "amountIn": amount_in.normalized().to_string(),
        });

        let reply = self.post_json(&endpoint, &body).await?;
        let data = reply
            .get("Data")
            .ok_or_else(|| TransportError::MissingData { endpoint: endpoint.clone() })?;
        let amount_out = data
            .get("amountOut")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TransportError::Malformed {
                endpoint: endpoint.clone(),
                reason: "Data.amountOut missing or not a string".to_string(),
            })?;
        decimal_field(&endpoint, "amountOut", amount_out)
    }

    #[instrument(skip(self))]
    async fn fetch_user_assets(
        &self,
        address: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawAsset>, TransportError> {
        let endpoint = format!(
            "{}/user/assets?address={}&page={}&limit={}",
            self.endpoints.dex_backend_base_url, address, page, page_size
        );
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| TransportError::Http { endpoint: endpoint.clone(), source })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| TransportError::Http { endpoint: endpoint.clone(), source })?;
        if !status.is_success() {
            return Err(TransportError::Status {
                endpoint,
                status: status.as_u16(),
                body: truncate(&text, 512),
            });
        }

        let reply: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| TransportError::Malformed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        let tokens = reply
            .get("data")
            .and_then(|d| d.get("token"))
            .cloned()
            .ok_or_else(|| TransportError::MissingData { endpoint: endpoint.clone() })?;
        serde_json::from_value(tokens).map_err(|e| TransportError::Malformed {
            endpoint,
            reason: e.to_string(),
        })
    }

    #[instrument(skip(self, request), fields(swap = %format!("{}->{}", request.token_in, request.token_out)))]
    async fn submit_swap(&self, request: &SwapRequest) -> Result<PendingSwap, TransportError> {
        let endpoint = format!(
            "{}{}",
            self.endpoints.bundler_base_url, self.endpoints.bundle_base_path
        );

        let payload = serde_json::to_string(request).map_err(|e| TransportError::Malformed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        let signature = self.signer.sign(payload.as_bytes())?;
        let body = serde_json::json!({
            "method": "Swap",
            "payload": request,
            "signature": signature,
            "user": request.recipient,
        });

        let reply = self.post_json(&endpoint, &body).await?;
        if let Some(err) = reply.get("error").and_then(|e| e.as_str()) {
            return Err(TransportError::Status {
                endpoint,
                status: 200,
                body: err.to_string(),
            });
        }
        let tx_id = reply
            .get("data")
            .and_then(|d| d.as_str().map(str::to_string).or_else(|| {
                d.get("transactionId").and_then(|t| t.as_str()).map(str::to_string)
            }))
            .ok_or_else(|| TransportError::MissingData { endpoint })?;
        Ok(PendingSwap { tx_id })
    }
}
