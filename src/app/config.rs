// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::parsing::{parse_address_hex, split_list};
use crate::common::retry::RetryPolicy;
use crate::domain::chain::{Chain, ChainTarget, GasTier};
use crate::domain::constants;
use crate::domain::error::AppError;
use crate::network::aggregator::KyberSwapConfig;
use crate::network::chain_client::ClientOptions;
use crate::network::endpoint_pool::HealthPolicy;
use crate::network::provider::build_rpc_urls;
use crate::services::approval::ApprovalMode;
use crate::services::orchestrator::OrchestratorConfig;
use crate::services::pipeline::ConfirmationPolicy;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub dry_run: bool,

    // Network
    #[serde(deserialize_with = "deserialize_from_str")]
    pub chain: Chain,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub rpc_endpoints: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub extra_api_keys: Vec<String>,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    #[serde(default = "default_rpc_max_attempts")]
    pub rpc_max_attempts: usize,
    #[serde(default = "default_endpoint_degraded_after")]
    pub endpoint_degraded_after: u32,
    #[serde(default = "default_endpoint_dead_after")]
    pub endpoint_dead_after: u32,
    #[serde(default = "default_endpoint_cooldown_secs")]
    pub endpoint_cooldown_secs: u64,

    // Gas & confirmation
    #[serde(default, deserialize_with = "deserialize_from_str")]
    pub gas_tier: GasTier,
    #[serde(default = "default_gas_limit_margin_bps")]
    pub gas_limit_margin_bps: u64,
    #[serde(default = "default_confirmation_timeout_seconds")]
    pub confirmation_timeout_seconds: u64,
    #[serde(default = "default_confirmation_extensions")]
    pub confirmation_extensions: u32,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,

    // Swaps
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_aggregator_url")]
    pub aggregator_url: String,
    #[serde(default = "default_aggregator_client_id")]
    pub aggregator_client_id: String,
    #[serde(default = "default_quote_max_attempts")]
    pub quote_max_attempts: usize,
    #[serde(default = "default_quote_staleness_secs")]
    pub quote_staleness_secs: u64,
    #[serde(default = "default_max_requotes")]
    pub max_requotes: u32,
    /// Overrides the aggregator router that receives token approvals.
    #[serde(default)]
    pub router_address: Option<String>,
    #[serde(default, deserialize_with = "deserialize_from_str")]
    pub approval_mode: ApprovalMode,

    // Batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_wallets_path")]
    pub wallets_path: String,
    #[serde(default = "default_tokens_path")]
    pub tokens_path: String,
    #[serde(default = "default_receivers_path")]
    pub receivers_path: String,
}

fn default_rpc_timeout_ms() -> u64 {
    constants::RPC_CALL_TIMEOUT.as_millis() as u64
}
fn default_rpc_max_attempts() -> usize {
    constants::RPC_MAX_ATTEMPTS
}
fn default_endpoint_degraded_after() -> u32 {
    constants::ENDPOINT_DEGRADED_AFTER
}
fn default_endpoint_dead_after() -> u32 {
    constants::ENDPOINT_DEAD_AFTER
}
fn default_endpoint_cooldown_secs() -> u64 {
    constants::ENDPOINT_COOLDOWN.as_secs()
}
fn default_gas_limit_margin_bps() -> u64 {
    constants::DEFAULT_GAS_LIMIT_MARGIN_BPS
}
fn default_confirmation_timeout_seconds() -> u64 {
    constants::CONFIRMATION_TIMEOUT.as_secs()
}
fn default_confirmation_extensions() -> u32 {
    constants::CONFIRMATION_EXTENSIONS
}
fn default_receipt_poll_ms() -> u64 {
    constants::RECEIPT_POLL_INTERVAL.as_millis() as u64
}
fn default_slippage_bps() -> u32 {
    constants::DEFAULT_SLIPPAGE_BPS
}
fn default_aggregator_url() -> String {
    constants::KYBERSWAP_API_BASE.to_string()
}
fn default_aggregator_client_id() -> String {
    constants::DEFAULT_AGGREGATOR_CLIENT_ID.to_string()
}
fn default_quote_max_attempts() -> usize {
    constants::QUOTE_MAX_ATTEMPTS
}
fn default_quote_staleness_secs() -> u64 {
    constants::QUOTE_STALENESS.as_secs()
}
fn default_max_requotes() -> u32 {
    constants::MAX_REQUOTES
}
fn default_concurrency() -> usize {
    4
}
fn default_wallets_path() -> String {
    "resources/wallets.txt".to_string()
}
fn default_tokens_path() -> String {
    "resources/tokens.txt".to_string()
}
fn default_receivers_path() -> String {
    "resources/receivers.txt".to_string()
}

/// Closed enums (chain, gas tier, approval mode) are parsed through `FromStr` so
/// env values and file values share one case-insensitive parser.
fn deserialize_from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};
    use std::fmt;

    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of strings or a comma-separated string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(split_list(v))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(elem) = seq.next_element::<String>()? {
                let trimmed = elem.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Ok(out)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(ListVisitor)
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

impl GlobalSettings {
    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    /// Layers: config file (explicit path, else optional `config.*`), then
    /// environment and `.env`.
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(Path::new(path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        builder = builder.add_source(Environment::default());

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        tracing::debug!(
            target: "config",
            chain = %settings.chain,
            endpoints = settings.rpc_endpoints.len(),
            api_keys = settings.extra_api_keys.len(),
            concurrency = settings.concurrency,
            "Settings loaded"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<(), AppError> {
            if ok { Ok(()) } else { Err(AppError::Config(msg())) }
        }

        check(
            (1..=constants::MAX_SLIPPAGE_BPS).contains(&self.slippage_bps),
            || {
                format!(
                    "SLIPPAGE_BPS {} out of range 1..={}",
                    self.slippage_bps,
                    constants::MAX_SLIPPAGE_BPS
                )
            },
        )?;
        check(self.concurrency >= 1, || "CONCURRENCY must be at least 1".into())?;
        check(self.confirmation_timeout_seconds > 0, || {
            "CONFIRMATION_TIMEOUT_SECONDS must be positive".into()
        })?;
        check(self.receipt_poll_ms > 0, || "RECEIPT_POLL_MS must be positive".into())?;
        check(self.rpc_timeout_ms > 0, || "RPC_TIMEOUT_MS must be positive".into())?;
        check(self.rpc_max_attempts >= 1, || {
            "RPC_MAX_ATTEMPTS must be at least 1".into()
        })?;
        check(self.quote_max_attempts >= 1, || {
            "QUOTE_MAX_ATTEMPTS must be at least 1".into()
        })?;
        check(self.quote_staleness_secs > 0, || {
            "QUOTE_STALENESS_SECS must be positive".into()
        })?;
        check(
            self.endpoint_degraded_after >= 1
                && self.endpoint_dead_after > self.endpoint_degraded_after,
            || {
                format!(
                    "Endpoint thresholds must satisfy 1 <= degraded_after ({}) < dead_after ({})",
                    self.endpoint_degraded_after, self.endpoint_dead_after
                )
            },
        )?;

        let aggregator = Url::parse(&self.aggregator_url)
            .map_err(|e| AppError::Config(format!("Invalid AGGREGATOR_URL: {e}")))?;
        check(matches!(aggregator.scheme(), "http" | "https"), || {
            format!("AGGREGATOR_URL must be http(s), got {}", aggregator.scheme())
        })?;
        check(!self.aggregator_client_id.trim().is_empty(), || {
            "AGGREGATOR_CLIENT_ID must not be empty".into()
        })?;
        self.router_address()?;
        Ok(())
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }

    /// Configured URLs plus one keyed provider URL per API key.
    pub fn endpoints(&self) -> Result<Vec<Url>, AppError> {
        build_rpc_urls(self.chain, &self.rpc_endpoints, &self.extra_api_keys)
    }

    pub fn chain_target(&self) -> Result<ChainTarget, AppError> {
        Ok(ChainTarget::new(self.chain, self.endpoints()?, self.gas_tier))
    }

    pub fn router_address(&self) -> Result<Address, AppError> {
        match self.router_address.as_deref().map(str::trim) {
            None | Some("") => Ok(constants::KYBERSWAP_ROUTER),
            Some(raw) => parse_address_hex(raw).ok_or_else(|| {
                AppError::Config(format!("Invalid ROUTER_ADDRESS '{raw}'"))
            }),
        }
    }

    pub fn health_policy(&self) -> HealthPolicy {
        HealthPolicy {
            degraded_after: self.endpoint_degraded_after,
            dead_after: self.endpoint_dead_after,
            cooldown: Duration::from_secs(self.endpoint_cooldown_secs),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            retry: RetryPolicy::new(
                self.rpc_max_attempts,
                constants::RPC_RETRY_INITIAL_DELAY,
                constants::RETRY_MAX_DELAY,
            ),
            call_timeout: millis(self.rpc_timeout_ms),
            receipt_poll: millis(self.receipt_poll_ms),
        }
    }

    pub fn aggregator_config(&self) -> KyberSwapConfig {
        KyberSwapConfig::default()
            .with_base_url(self.aggregator_url.trim())
            .with_client_id(self.aggregator_client_id.trim())
            .with_retry(RetryPolicy::new(
                self.quote_max_attempts,
                constants::QUOTE_RETRY_INITIAL_DELAY,
                constants::RETRY_MAX_DELAY,
            ))
            .with_quote_ttl(Duration::from_secs(self.quote_staleness_secs))
    }

    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, AppError> {
        Ok(OrchestratorConfig {
            concurrency: self.concurrency,
            slippage_bps: self.slippage_bps,
            max_requotes: self.max_requotes,
            approval_mode: self.approval_mode,
            spender: self.router_address()?,
            gas_limit_margin_bps: self.gas_limit_margin_bps,
            confirmation: ConfirmationPolicy {
                timeout: Duration::from_secs(self.confirmation_timeout_seconds),
                extensions: self.confirmation_extensions,
            },
            dry_run: self.dry_run,
        })
    }
}
