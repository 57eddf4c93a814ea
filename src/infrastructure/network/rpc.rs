// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::data::erc20::ERC20;
use crate::data::token_manager::TokenInfo;
use crate::domain::constants::{
    BASE_FEE_BUMP_PER_MILLE, DEFAULT_PRIORITY_FEE_WEI, FEE_HISTORY_BLOCKS, FEE_HISTORY_PERCENTILES,
};
use crate::network::endpoint_pool::Endpoint;
use crate::network::provider::{ConnectionFactory, HttpProvider};
use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::BlockNumberOrTag;
use alloy::rpc::types::eth::{FeeHistory, TransactionRequest};
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcFailureKind {
    /// Connection refused, DNS failure: the payload never left this process.
    Unreachable,
    /// Explicit rate-limit rejection (HTTP 429, -32005).
    RateLimited,
    Timeout,
    /// 5xx, empty or garbled responses.
    ServerError,
    /// The node answered and refused the request (revert, bad params).
    Rejected,
}

/// Failure of one call against one endpoint.
#[derive(Debug, Clone)]
pub struct RpcFailure {
    pub kind: RpcFailureKind,
    pub message: String,
}

impl RpcFailure {
    pub fn new(kind: RpcFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind != RpcFailureKind::Rejected
    }

    /// True when the endpoint provably never received the request payload.
    pub fn never_reached_network(&self) -> bool {
        matches!(
            self.kind,
            RpcFailureKind::Unreachable | RpcFailureKind::RateLimited
        )
    }

    pub fn is_already_known(&self) -> bool {
        let msg = self.message.to_ascii_lowercase();
        msg.contains("already known") || msg.contains("known transaction")
    }

    pub fn from_transport(err: &TransportError) -> Self {
        match err {
            RpcError::ErrorResp(payload) => {
                let message = payload.message.to_string();
                let kind = if payload.code == 429
                    || payload.code == -32005
                    || is_rate_limit_message(&message)
                {
                    RpcFailureKind::RateLimited
                } else if is_timeout_message(&message) {
                    RpcFailureKind::Timeout
                } else if payload.code == -32603 || is_server_side_message(&message) {
                    RpcFailureKind::ServerError
                } else {
                    RpcFailureKind::Rejected
                };
                Self::new(kind, format!("{} (code {})", message, payload.code))
            }
            RpcError::Transport(TransportErrorKind::HttpError(http)) => {
                let kind = match http.status {
                    429 => RpcFailureKind::RateLimited,
                    500..=599 => RpcFailureKind::ServerError,
                    _ => RpcFailureKind::Rejected,
                };
                Self::new(kind, format!("HTTP {}", http.status))
            }
            RpcError::Transport(inner) => {
                let message = inner.to_string();
                Self::new(classify_transport_message(&message), message)
            }
            RpcError::DeserError { text, .. } if is_rate_limit_message(text) => {
                Self::new(RpcFailureKind::RateLimited, err.to_string())
            }
            RpcError::NullResp | RpcError::DeserError { .. } => {
                Self::new(RpcFailureKind::ServerError, err.to_string())
            }
            _ => Self::new(RpcFailureKind::Rejected, err.to_string()),
        }
    }

    pub fn from_contract(err: &alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(inner) => Self::from_transport(inner),
            other => Self::new(RpcFailureKind::Rejected, other.to_string()),
        }
    }
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Throttling phrases used by public nodes and hosted providers. Plain
/// "exceeded" is not one: nodes use it for gas and size rejections.
fn is_rate_limit_message(msg: &str) -> bool {
    const PHRASES: [&str; 8] = [
        "rate limit",
        "ratelimit",
        "too many requests",
        "429",
        "-32005",
        "request limit",
        "rate exceeded",
        "compute units per second",
    ];
    let msg = msg.to_ascii_lowercase();
    PHRASES.iter().any(|p| msg.contains(p))
}

fn is_timeout_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("timed out") || msg.contains("timeout")
}

fn is_server_side_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("header not found")
        || msg.contains("internal error")
        || msg.contains("unavailable")
        || msg.contains("overloaded")
}

fn classify_transport_message(msg: &str) -> RpcFailureKind {
    let lower = msg.to_ascii_lowercase();
    if lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("resolve")
        || lower.contains("tcp connect")
        || lower.contains("client error (connect)")
    {
        RpcFailureKind::Unreachable
    } else if is_timeout_message(&lower) {
        RpcFailureKind::Timeout
    } else {
        RpcFailureKind::ServerError
    }
}

/// Fee inputs sampled from the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveFeeData {
    /// Expected base fee of the next block; `None` on chains without EIP-1559.
    pub next_base_fee: Option<u128>,
    /// Average priority fee at the 10th, 50th and 90th percentile.
    pub priority_fees: [u128; 3],
    pub gas_price: Option<u128>,
}

impl LiveFeeData {
    pub fn from_history(history: &FeeHistory) -> Option<Self> {
        let latest_base_fee = history
            .latest_block_base_fee()
            .or_else(|| history.base_fee_per_gas.iter().rev().nth(1).copied())
            .filter(|fee| *fee > 0)?;

        let raw_next_base = history.next_block_base_fee().unwrap_or(latest_base_fee);
        // Some nodes return zero for the pending block.
        let next_base_fee = if raw_next_base == 0 {
            latest_base_fee.saturating_mul(BASE_FEE_BUMP_PER_MILLE) / 1000
        } else {
            raw_next_base
        };

        let mut sums = [0u128; 3];
        let mut counts = [0u128; 3];
        if let Some(rewards) = &history.reward {
            for block_reward in rewards {
                for (idx, reward) in block_reward.iter().take(3).enumerate() {
                    sums[idx] = sums[idx].saturating_add(*reward);
                    counts[idx] += 1;
                }
            }
        }
        let priority_fees: [u128; 3] = std::array::from_fn(|idx| {
            if counts[idx] > 0 {
                sums[idx] / counts[idx]
            } else {
                DEFAULT_PRIORITY_FEE_WEI
            }
        });

        Some(Self {
            next_base_fee: Some(next_base_fee),
            priority_fees,
            gas_price: None,
        })
    }

    pub fn legacy(gas_price: u128) -> Self {
        Self {
            next_base_fee: None,
            priority_fees: [0; 3],
            gas_price: Some(gas_price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub success: bool,
    pub block: Option<u64>,
}

/// Raw JSON-RPC surface against one endpoint. Failover, timeouts and retries
/// live in the chain client on top of this.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn native_balance(&self, ep: &Endpoint, owner: Address) -> Result<U256, RpcFailure>;

    async fn token_balance(
        &self,
        ep: &Endpoint,
        token: Address,
        owner: Address,
    ) -> Result<U256, RpcFailure>;

    async fn allowance(
        &self,
        ep: &Endpoint,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, RpcFailure>;

    async fn pending_nonce(&self, ep: &Endpoint, address: Address) -> Result<u64, RpcFailure>;

    async fn estimate_gas(&self, ep: &Endpoint, request: &TransactionRequest)
    -> Result<u64, RpcFailure>;

    async fn fee_data(&self, ep: &Endpoint) -> Result<LiveFeeData, RpcFailure>;

    /// `eth_call` against the latest block.
    async fn eth_call(&self, ep: &Endpoint, request: &TransactionRequest)
    -> Result<Bytes, RpcFailure>;

    async fn token_metadata(&self, ep: &Endpoint, token: Address)
    -> Result<TokenInfo, RpcFailure>;

    async fn send_raw(&self, ep: &Endpoint, raw: &Bytes) -> Result<B256, RpcFailure>;

    async fn receipt(&self, ep: &Endpoint, hash: B256) -> Result<Option<ReceiptInfo>, RpcFailure>;
}

/// `ChainRpc` over alloy HTTP providers, one cached provider per endpoint.
#[derive(Default)]
pub struct AlloyRpc {
    providers: DashMap<usize, HttpProvider>,
}

impl AlloyRpc {
    pub fn new() -> Self {
        Self::default()
    }

    fn provider(&self, ep: &Endpoint) -> HttpProvider {
        self.providers
            .entry(ep.id)
            .or_insert_with(|| ConnectionFactory::http(&ep.url))
            .clone()
    }
}

#[async_trait]
impl ChainRpc for AlloyRpc {
    async fn native_balance(&self, ep: &Endpoint, owner: Address) -> Result<U256, RpcFailure> {
        self.provider(ep)
            .get_balance(owner)
            .await
            .map_err(|e| RpcFailure::from_transport(&e))
    }

    async fn token_balance(
        &self,
        ep: &Endpoint,
        token: Address,
        owner: Address,
    ) -> Result<U256, RpcFailure> {
        let contract = ERC20::new(token, self.provider(ep));
        contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| RpcFailure::from_contract(&e))
    }

    async fn allowance(
        &self,
        ep: &Endpoint,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, RpcFailure> {
        let contract = ERC20::new(token, self.provider(ep));
        contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| RpcFailure::from_contract(&e))
    }

    async fn pending_nonce(&self, ep: &Endpoint, address: Address) -> Result<u64, RpcFailure> {
        self.provider(ep)
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| RpcFailure::from_transport(&e))
    }

    async fn estimate_gas(
        &self,
        ep: &Endpoint,
        request: &TransactionRequest,
    ) -> Result<u64, RpcFailure> {
        self.provider(ep)
            .estimate_gas(request.clone())
            .await
            .map_err(|e| RpcFailure::from_transport(&e))
    }

    async fn fee_data(&self, ep: &Endpoint) -> Result<LiveFeeData, RpcFailure> {
        let provider = self.provider(ep);
        let history = provider
            .get_fee_history(
                FEE_HISTORY_BLOCKS,
                BlockNumberOrTag::Latest,
                &FEE_HISTORY_PERCENTILES,
            )
            .await;
        match history {
            Ok(history) => {
                if let Some(fees) = LiveFeeData::from_history(&history) {
                    return Ok(fees);
                }
            }
            Err(e) => {
                let failure = RpcFailure::from_transport(&e);
                if failure.is_transient() {
                    return Err(failure);
                }
                // Node without eth_feeHistory: fall through to the legacy price.
            }
        }
        provider
            .get_gas_price()
            .await
            .map(LiveFeeData::legacy)
            .map_err(|e| RpcFailure::from_transport(&e))
    }

    async fn eth_call(
        &self,
        ep: &Endpoint,
        request: &TransactionRequest,
    ) -> Result<Bytes, RpcFailure> {
        self.provider(ep)
            .call(request.clone())
            .await
            .map_err(|e| RpcFailure::from_transport(&e))
    }

    async fn token_metadata(
        &self,
        ep: &Endpoint,
        token: Address,
    ) -> Result<TokenInfo, RpcFailure> {
        let contract = ERC20::new(token, self.provider(ep));
        let decimals = contract
            .decimals()
            .call()
            .await
            .map_err(|e| RpcFailure::from_contract(&e))?;
        let symbol = contract
            .symbol()
            .call()
            .await
            .map_err(|e| RpcFailure::from_contract(&e))?;
        Ok(TokenInfo { symbol, decimals })
    }

    async fn send_raw(&self, ep: &Endpoint, raw: &Bytes) -> Result<B256, RpcFailure> {
        self.provider(ep)
            .send_raw_transaction(raw.as_ref())
            .await
            .map(|pending| *pending.tx_hash())
            .map_err(|e| RpcFailure::from_transport(&e))
    }

    async fn receipt(&self, ep: &Endpoint, hash: B256) -> Result<Option<ReceiptInfo>, RpcFailure> {
        self.provider(ep)
            .get_transaction_receipt(hash)
            .await
            .map(|maybe| {
                maybe.map(|r| ReceiptInfo {
                    success: r.status(),
                    block: r.block_number,
                })
            })
            .map_err(|e| RpcFailure::from_transport(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::ErrorPayload;

    fn error_resp(code: i64, message: &'static str) -> TransportError {
        RpcError::ErrorResp(ErrorPayload {
            code,
            message: message.into(),
            data: None,
        })
    }

    #[test]
    fn classifies_json_rpc_errors() {
        assert_eq!(
            RpcFailure::from_transport(&error_resp(-32005, "limit")).kind,
            RpcFailureKind::RateLimited
        );
        assert_eq!(
            RpcFailure::from_transport(&error_resp(-32000, "Too Many Requests")).kind,
            RpcFailureKind::RateLimited
        );
        assert_eq!(
            RpcFailure::from_transport(&error_resp(3, "execution reverted")).kind,
            RpcFailureKind::Rejected
        );
        let known = RpcFailure::from_transport(&error_resp(-32000, "already known"));
        assert_eq!(known.kind, RpcFailureKind::Rejected);
        assert!(known.is_already_known());
    }

    #[test]
    fn gas_rejections_are_not_rate_limits() {
        for message in [
            "gas limit exceeded",
            "exceeds block gas capacity",
            "max fee per gas less than block base fee",
            "oversized data: transaction size exceeded",
        ] {
            assert_eq!(
                RpcFailure::from_transport(&error_resp(-32000, message)).kind,
                RpcFailureKind::Rejected,
                "{message}"
            );
        }
        for message in [
            "daily request limit reached",
            "project ID request rate exceeded",
            "Your app has exceeded its compute units per second capacity",
            "HTTP 429",
        ] {
            assert_eq!(
                RpcFailure::from_transport(&error_resp(-32000, message)).kind,
                RpcFailureKind::RateLimited,
                "{message}"
            );
        }
    }

    #[test]
    fn transience_and_reach() {
        let refused = RpcFailure::new(RpcFailureKind::Unreachable, "connection refused");
        assert!(refused.is_transient());
        assert!(refused.never_reached_network());
        let timeout = RpcFailure::new(RpcFailureKind::Timeout, "deadline");
        assert!(timeout.is_transient());
        assert!(!timeout.never_reached_network());
        assert!(!RpcFailure::new(RpcFailureKind::Rejected, "bad").is_transient());
    }

    #[test]
    fn transport_messages_split_connect_from_ambiguous() {
        assert_eq!(
            classify_transport_message("error sending request: tcp connect error: Connection refused"),
            RpcFailureKind::Unreachable
        );
        assert_eq!(
            classify_transport_message("operation timed out"),
            RpcFailureKind::Timeout
        );
        assert_eq!(
            classify_transport_message("connection reset by peer"),
            RpcFailureKind::ServerError
        );
    }

    #[test]
    fn fee_history_averages_percentiles() {
        let history = FeeHistory {
            base_fee_per_gas: vec![100, 110, 120],
            reward: Some(vec![vec![1, 5, 9], vec![3, 7, 11]]),
            ..Default::default()
        };
        let fees = LiveFeeData::from_history(&history).unwrap();
        assert_eq!(fees.next_base_fee, Some(120));
        assert_eq!(fees.priority_fees, [2, 6, 10]);
    }

    #[test]
    fn zero_next_base_fee_gets_bumped() {
        let history = FeeHistory {
            base_fee_per_gas: vec![1000, 0],
            ..Default::default()
        };
        let fees = LiveFeeData::from_history(&history).unwrap();
        assert_eq!(fees.next_base_fee, Some(1125));
    }

    #[test]
    fn empty_history_means_no_1559() {
        assert!(LiveFeeData::from_history(&FeeHistory::default()).is_none());
    }
}
