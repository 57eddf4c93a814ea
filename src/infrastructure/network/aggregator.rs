// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Swap quotes and calldata from the KyberSwap aggregator.
//!
//! All knowledge of the aggregator wire format stays in this module; callers only
//! see [`Quote`] and [`SwapCallData`].

use crate::common::parsing::{parse_address_hex, parse_u256_amount, strip_0x};
use crate::common::retry::{RetryPolicy, retry_async};
use crate::domain::chain::Chain;
use crate::domain::constants::{
    DEFAULT_AGGREGATOR_CLIENT_ID, KYBERSWAP_API_BASE, NATIVE_SENTINEL, QUOTE_HTTP_TIMEOUT,
    QUOTE_MAX_ATTEMPTS, QUOTE_RETRY_INITIAL_DELAY, QUOTE_STALENESS, RETRY_MAX_DELAY,
    SWAP_DEADLINE_SECS,
};
use crate::domain::error::AppError;
use crate::domain::quote::{Quote, QuoteRequest, SwapCallData};
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[async_trait]
pub trait QuoteService: Send + Sync {
    async fn get_quote(&self, chain: Chain, request: &QuoteRequest) -> Result<Quote, AppError>;

    /// Rejects stale quotes with `QuoteExpired` before touching the network.
    async fn build_swap_call_data(
        &self,
        chain: Chain,
        quote: &Quote,
        min_amount_out: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<SwapCallData, AppError>;
}

#[derive(Debug, Clone)]
pub struct KyberSwapConfig {
    pub base_url: String,
    pub client_id: String,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    pub quote_ttl: Duration,
    pub deadline_secs: u64,
}

impl Default for KyberSwapConfig {
    fn default() -> Self {
        Self {
            base_url: KYBERSWAP_API_BASE.to_string(),
            client_id: DEFAULT_AGGREGATOR_CLIENT_ID.to_string(),
            retry: RetryPolicy::new(
                QUOTE_MAX_ATTEMPTS,
                QUOTE_RETRY_INITIAL_DELAY,
                RETRY_MAX_DELAY,
            ),
            http_timeout: QUOTE_HTTP_TIMEOUT,
            quote_ttl: QUOTE_STALENESS,
            deadline_secs: SWAP_DEADLINE_SECS,
        }
    }
}

impl KyberSwapConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_quote_ttl(mut self, ttl: Duration) -> Self {
        self.quote_ttl = ttl;
        self
    }
}

#[derive(Debug)]
enum CallFailure {
    Retryable(String),
    NoRoute(String),
    Unauthorized(String),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutesData {
    route_summary: Option<serde_json::Value>,
    router_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildData {
    data: String,
    router_address: String,
    amount_out: String,
    #[serde(default)]
    gas: Option<String>,
    #[serde(default)]
    transaction_value: Option<String>,
}

pub struct KyberSwapClient {
    http: reqwest::Client,
    config: KyberSwapConfig,
}

impl KyberSwapClient {
    pub fn new(config: KyberSwapConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build aggregator HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, chain: Chain, suffix: &str) -> String {
        format!(
            "{}/{}/api/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            chain.aggregator_slug(),
            suffix
        )
    }

    /// The aggregator only understands the `0xEeee…` placeholder for native coins.
    fn wire_token(chain: Chain, token: Address) -> String {
        let token = if chain.is_native(token) {
            NATIVE_SENTINEL
        } else {
            token
        };
        format!("{token:#x}")
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CallFailure> {
        let response = request
            .header("x-client-id", &self.config.client_id)
            .header("source", &self.config.client_id)
            .send()
            .await
            .map_err(|e| CallFailure::Retryable(format!("transport: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(CallFailure::Retryable(format!("HTTP {status}")));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CallFailure::Unauthorized(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CallFailure::Retryable(format!("body: {e}")))?;
        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(env) => env,
            Err(_) if status.is_client_error() => {
                return Err(CallFailure::NoRoute(format!("HTTP {status}")));
            }
            Err(e) => return Err(CallFailure::Retryable(format!("decode: {e}"))),
        };

        let message = envelope.message.unwrap_or_default();
        if envelope.code != 0 || status.is_client_error() {
            return Err(CallFailure::NoRoute(format!(
                "{message} (code {})",
                envelope.code
            )));
        }
        envelope
            .data
            .ok_or_else(|| CallFailure::NoRoute(format!("empty response: {message}")))
    }

    async fn with_retry<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CallFailure>>,
    {
        let result = retry_async(
            &self.config.retry,
            |e: &CallFailure| matches!(e, CallFailure::Retryable(_)),
            |attempt| {
                if attempt > 1 {
                    tracing::debug!(target: "quote", what, attempt, "Retrying aggregator call");
                }
                op()
            },
        )
        .await;
        result.map_err(|failure| match failure {
            CallFailure::Retryable(reason) => {
                tracing::warn!(target: "quote", what, error = %reason, "Aggregator unavailable");
                AppError::QuoteServiceUnavailable(format!("{what}: {reason}"))
            }
            CallFailure::NoRoute(reason) => AppError::NoRoute(reason),
            CallFailure::Unauthorized(reason) => AppError::Config(format!(
                "aggregator refused client id '{}' on {what}: {reason}",
                self.config.client_id
            )),
        })
    }
}

#[async_trait]
impl QuoteService for KyberSwapClient {
    async fn get_quote(&self, chain: Chain, request: &QuoteRequest) -> Result<Quote, AppError> {
        if request.amount_in.is_zero() {
            return Err(AppError::Validation {
                field: "amount_in".into(),
                message: "cannot quote a zero amount".into(),
            });
        }
        let url = self.endpoint(chain, "routes");
        let token_in = Self::wire_token(chain, request.token_in);
        let token_out = Self::wire_token(chain, request.token_out);
        let amount_in = request.amount_in.to_string();

        let data: RoutesData = self
            .with_retry("routes", || {
                self.call(self.http.get(&url).query(&[
                    ("tokenIn", token_in.as_str()),
                    ("tokenOut", token_out.as_str()),
                    ("amountIn", amount_in.as_str()),
                ]))
            })
            .await?;

        let summary = data
            .route_summary
            .ok_or_else(|| AppError::NoRoute("response carried no route summary".into()))?;
        let amount_out = summary
            .get("amountOut")
            .and_then(|v| v.as_str())
            .and_then(parse_u256_amount)
            .filter(|v| !v.is_zero())
            .ok_or_else(|| AppError::NoRoute("route summary has no usable amountOut".into()))?;
        let router = data
            .router_address
            .as_deref()
            .and_then(parse_address_hex)
            .ok_or_else(|| AppError::NoRoute("route has no router address".into()))?;

        tracing::debug!(
            target: "quote",
            chain = %chain,
            token_in = %token_in,
            token_out = %token_out,
            amount_in = %request.amount_in,
            amount_out = %amount_out,
            "Quote received"
        );
        Ok(Quote::new(
            request,
            amount_out,
            router,
            summary,
            self.config.quote_ttl,
        ))
    }

    async fn build_swap_call_data(
        &self,
        chain: Chain,
        quote: &Quote,
        min_amount_out: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<SwapCallData, AppError> {
        quote.ensure_fresh()?;

        let deadline = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            + self.config.deadline_secs;
        let payload = json!({
            "routeSummary": quote.route,
            "sender": format!("{sender:#x}"),
            "recipient": format!("{recipient:#x}"),
            "slippageTolerance": quote.slippage_bps,
            "deadline": deadline,
            "enableGasEstimation": false,
        });
        let url = self.endpoint(chain, "route/build");

        let built: BuildData = self
            .with_retry("route/build", || self.call(self.http.post(&url).json(&payload)))
            .await?;

        let data = hex::decode(strip_0x(&built.data))
            .map(Bytes::from)
            .map_err(|e| AppError::NoRoute(format!("build returned invalid calldata: {e}")))?;
        let router = parse_address_hex(&built.router_address)
            .ok_or_else(|| AppError::NoRoute("build returned invalid router".into()))?;
        let amount_out = parse_u256_amount(&built.amount_out)
            .ok_or_else(|| AppError::NoRoute("build returned invalid amountOut".into()))?;
        if amount_out < min_amount_out {
            return Err(AppError::NoRoute(format!(
                "built amountOut {amount_out} below minimum {min_amount_out}"
            )));
        }
        let value = built
            .transaction_value
            .as_deref()
            .and_then(parse_u256_amount)
            .unwrap_or_default();
        let gas_hint = built.gas.as_deref().and_then(|g| g.trim().parse::<u64>().ok());

        Ok(SwapCallData {
            router,
            data,
            value,
            gas_hint,
            amount_out,
        })
    }
}
