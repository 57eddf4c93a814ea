// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::retry::RetryPolicy;
use crate::data::erc20::{balances_calldata, decode_balances};
use crate::data::token_manager::TokenInfo;
use crate::domain::chain::Chain;
use crate::domain::constants::{
    MULTICALL3, RECEIPT_POLL_INTERVAL, RETRY_MAX_DELAY, RPC_CALL_TIMEOUT, RPC_MAX_ATTEMPTS,
    RPC_RETRY_INITIAL_DELAY,
};
use crate::domain::error::AppError;
use crate::domain::nonce::NonceSequence;
use crate::domain::transaction::{SignedTransaction, TxCall};
use crate::network::endpoint_pool::{Endpoint, EndpointPool, Outcome};
use crate::network::rpc::{ChainRpc, LiveFeeData, ReceiptInfo, RpcFailure, RpcFailureKind};
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub retry: RetryPolicy,
    pub call_timeout: Duration,
    pub receipt_poll: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(RPC_MAX_ATTEMPTS, RPC_RETRY_INITIAL_DELAY, RETRY_MAX_DELAY),
            call_timeout: RPC_CALL_TIMEOUT,
            receipt_poll: RECEIPT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success { block: Option<u64> },
    Reverted { block: Option<u64> },
    Timeout,
}

/// Chain facade: every call goes through the endpoint pool with failover.
pub struct ChainClient {
    chain: Chain,
    pool: Arc<EndpointPool>,
    rpc: Arc<dyn ChainRpc>,
    options: ClientOptions,
}

impl ChainClient {
    pub fn new(
        chain: Chain,
        pool: Arc<EndpointPool>,
        rpc: Arc<dyn ChainRpc>,
        options: ClientOptions,
    ) -> Self {
        Self {
            chain,
            pool,
            rpc,
            options,
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    pub async fn get_balance(&self, owner: Address, token: Address) -> Result<U256, AppError> {
        if self.chain.is_native(token) {
            return self
                .with_failover("get_balance", move |rpc, ep| async move {
                    rpc.native_balance(&ep, owner).await
                })
                .await;
        }
        self.with_failover("get_balance", move |rpc, ep| async move {
            rpc.token_balance(&ep, token, owner).await
        })
        .await
    }

    /// Native coins need no approval, so their allowance is unlimited.
    /// Balances of `owner` for every token in one Multicall3 `aggregate3` call.
    /// Entries the batch could not read come back as `None`.
    pub async fn multicall_balances(
        &self,
        owner: Address,
        tokens: &[Address],
    ) -> Result<Vec<Option<U256>>, AppError> {
        let reads: Vec<Option<Address>> = tokens
            .iter()
            .map(|token| (!self.chain.is_native(*token)).then_some(*token))
            .collect();
        let request = TransactionRequest::default()
            .to(MULTICALL3)
            .input(TransactionInput::new(balances_calldata(owner, &reads)));
        let raw = self
            .with_failover("multicall_balances", move |rpc, ep| {
                let request = request.clone();
                async move { rpc.eth_call(&ep, &request).await }
            })
            .await?;
        let balances = decode_balances(&raw).map_err(|e| AppError::Chain {
            operation: "multicall_balances",
            reason: format!("undecodable aggregate3 reply: {e}"),
        })?;
        if balances.len() != tokens.len() {
            return Err(AppError::Chain {
                operation: "multicall_balances",
                reason: format!(
                    "aggregate3 returned {} results for {} calls",
                    balances.len(),
                    tokens.len()
                ),
            });
        }
        Ok(balances)
    }

    pub async fn get_allowance(
        &self,
        owner: Address,
        spender: Address,
        token: Address,
    ) -> Result<U256, AppError> {
        if self.chain.is_native(token) {
            return Ok(U256::MAX);
        }
        self.with_failover("get_allowance", move |rpc, ep| async move {
            rpc.allowance(&ep, token, owner, spender).await
        })
        .await
    }

    pub async fn get_nonce(&self, address: Address) -> Result<u64, AppError> {
        self.with_failover("get_nonce", move |rpc, ep| async move {
            rpc.pending_nonce(&ep, address).await
        })
        .await
    }

    /// Pending nonce from the chain, as a fresh local sequence.
    pub async fn nonce_sequence(&self, address: Address) -> Result<NonceSequence, AppError> {
        let on_chain_nonce = self.get_nonce(address).await?;
        tracing::debug!(
            target: "nonce",
            wallet = %format!("{:#x}", address),
            nonce = on_chain_nonce,
            "Nonce loaded"
        );
        Ok(NonceSequence::starting_at(on_chain_nonce))
    }

    pub async fn estimate_gas(&self, from: Address, call: &TxCall) -> Result<u64, AppError> {
        let request = call.to_request(from);
        self.with_failover("estimate_gas", move |rpc, ep| {
            let request = request.clone();
            async move { rpc.estimate_gas(&ep, &request).await }
        })
        .await
    }

    pub async fn fee_data(&self) -> Result<LiveFeeData, AppError> {
        self.with_failover("fee_data", |rpc, ep| async move { rpc.fee_data(&ep).await })
            .await
    }

    pub async fn token_metadata(&self, token: Address) -> Result<TokenInfo, AppError> {
        if self.chain.is_native(token) {
            return Ok(TokenInfo {
                symbol: self.chain.native_symbol().to_string(),
                decimals: 18,
            });
        }
        self.with_failover("token_metadata", move |rpc, ep| async move {
            rpc.token_metadata(&ep, token).await
        })
        .await
    }

    pub async fn receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>, AppError> {
        self.with_failover("get_receipt", move |rpc, ep| async move {
            rpc.receipt(&ep, hash).await
        })
        .await
    }

    /// Broadcasts a signed transaction.
    ///
    /// Only failures that provably never reached an endpoint are retried. Anything
    /// ambiguous surfaces as `SubmissionUnconfirmed` and is not re-broadcast.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<B256, AppError> {
        let policy = self.options.retry;
        let mut tried = Vec::new();
        let mut last: Option<RpcFailure> = None;

        for attempt in 1..=policy.max_attempts {
            let ep = self.pool.acquire_excluding(&tried)?;
            let res = self.timed(self.rpc.send_raw(&ep, &signed.raw)).await;
            match res {
                Ok(hash) => {
                    self.pool.report(&ep, Outcome::Success);
                    if hash != signed.hash {
                        tracing::warn!(
                            target: "chain_client",
                            expected = %format!("{:#x}", signed.hash),
                            returned = %format!("{:#x}", hash),
                            "Node returned a different tx hash; tracking the locally computed one"
                        );
                    }
                    tracing::info!(
                        target: "chain_client",
                        tx_hash = %format!("{:#x}", signed.hash),
                        nonce = signed.nonce,
                        endpoint = %ep.redacted(),
                        "Transaction accepted"
                    );
                    return Ok(signed.hash);
                }
                Err(failure) if failure.is_already_known() => {
                    self.pool.report(&ep, Outcome::Success);
                    tracing::info!(
                        target: "chain_client",
                        tx_hash = %format!("{:#x}", signed.hash),
                        "Transaction already known to the node"
                    );
                    return Ok(signed.hash);
                }
                Err(failure) if failure.never_reached_network() => {
                    self.pool.report(&ep, Outcome::Failure);
                    tracing::warn!(
                        target: "chain_client",
                        endpoint = %ep.redacted(),
                        attempt,
                        error = %failure,
                        "Submission did not reach endpoint; rotating"
                    );
                    tried.push(ep.id);
                    last = Some(failure);
                    if attempt < policy.max_attempts {
                        sleep(policy.delay_after(attempt)).await;
                    }
                }
                Err(failure) if failure.is_transient() => {
                    self.pool.report(&ep, Outcome::Failure);
                    tracing::error!(
                        target: "chain_client",
                        tx_hash = %format!("{:#x}", signed.hash),
                        endpoint = %ep.redacted(),
                        error = %failure,
                        "Submission outcome unknown"
                    );
                    return Err(AppError::SubmissionUnconfirmed {
                        hash: signed.hash,
                        reason: failure.to_string(),
                    });
                }
                Err(failure) => {
                    self.pool.report(&ep, Outcome::Success);
                    return Err(AppError::Chain {
                        operation: "submit",
                        reason: failure.message,
                    });
                }
            }
        }

        Err(AppError::TransientRpc {
            operation: "submit",
            attempts: policy.max_attempts,
            reason: last.map(|f| f.to_string()).unwrap_or_default(),
        })
    }

    /// Polls for a receipt until `wait` elapses. Running out of time is a result,
    /// not an error.
    pub async fn wait_for_receipt(
        &self,
        hash: B256,
        wait: Duration,
    ) -> Result<ReceiptStatus, AppError> {
        let deadline = Instant::now() + wait;
        loop {
            match self.receipt(hash).await {
                Ok(Some(info)) => {
                    return Ok(if info.success {
                        ReceiptStatus::Success { block: info.block }
                    } else {
                        ReceiptStatus::Reverted { block: info.block }
                    });
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(
                        target: "chain_client",
                        tx_hash = %format!("{:#x}", hash),
                        error = %e,
                        "Receipt poll failed; will retry"
                    );
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(ReceiptStatus::Timeout);
            }
            sleep(self.options.receipt_poll.min(deadline - now)).await;
        }
    }

    async fn with_failover<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, AppError>
    where
        F: FnMut(Arc<dyn ChainRpc>, Endpoint) -> Fut,
        Fut: Future<Output = Result<T, RpcFailure>>,
    {
        let policy = self.options.retry;
        let mut tried = Vec::new();
        let mut last: Option<RpcFailure> = None;

        for attempt in 1..=policy.max_attempts {
            let ep = self.pool.acquire_excluding(&tried)?;
            match self.timed(call(self.rpc.clone(), ep.clone())).await {
                Ok(value) => {
                    self.pool.report(&ep, Outcome::Success);
                    return Ok(value);
                }
                Err(failure) if failure.is_transient() => {
                    self.pool.report(&ep, Outcome::Failure);
                    tracing::warn!(
                        target: "chain_client",
                        operation,
                        endpoint = %ep.redacted(),
                        attempt,
                        error = %failure,
                        "RPC call failed; rotating endpoint"
                    );
                    tried.push(ep.id);
                    last = Some(failure);
                    if attempt < policy.max_attempts {
                        sleep(policy.delay_after(attempt)).await;
                    }
                }
                Err(failure) => {
                    // The endpoint itself answered fine.
                    self.pool.report(&ep, Outcome::Success);
                    return Err(AppError::Chain {
                        operation,
                        reason: failure.message,
                    });
                }
            }
        }

        Err(AppError::TransientRpc {
            operation,
            attempts: policy.max_attempts,
            reason: last.map(|f| f.to_string()).unwrap_or_default(),
        })
    }

    async fn timed<T>(
        &self,
        fut: impl Future<Output = Result<T, RpcFailure>>,
    ) -> Result<T, RpcFailure> {
        match timeout(self.options.call_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(RpcFailure::new(
                RpcFailureKind::Timeout,
                format!("no response within {}ms", self.options.call_timeout.as_millis()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::NATIVE_SENTINEL;
    use crate::network::endpoint_pool::{EndpointHealth, HealthPolicy};
    use crate::data::erc20::IMulticall3;
    use alloy::primitives::Bytes;
    use alloy::sol_types::{SolCall, SolValue};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Endpoint 0 fails with the configured kind; others answer.
    struct FlakyRpc {
        failing: HashSet<usize>,
        kind: RpcFailureKind,
        calls: AtomicUsize,
        sends: Mutex<Vec<usize>>,
        receipt_after: usize,
    }

    impl FlakyRpc {
        fn new(failing: &[usize], kind: RpcFailureKind) -> Self {
            Self {
                failing: failing.iter().copied().collect(),
                kind,
                calls: AtomicUsize::new(0),
                sends: Mutex::new(Vec::new()),
                receipt_after: 0,
            }
        }

        fn check(&self, ep: &Endpoint) -> Result<(), RpcFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&ep.id) {
                Err(RpcFailure::new(self.kind, "scripted"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ChainRpc for FlakyRpc {
        async fn native_balance(&self, ep: &Endpoint, _: Address) -> Result<U256, RpcFailure> {
            self.check(ep).map(|_| U256::from(42u64))
        }
        async fn token_balance(
            &self,
            ep: &Endpoint,
            _: Address,
            _: Address,
        ) -> Result<U256, RpcFailure> {
            self.check(ep).map(|_| U256::from(7u64))
        }
        async fn allowance(
            &self,
            ep: &Endpoint,
            _: Address,
            _: Address,
            _: Address,
        ) -> Result<U256, RpcFailure> {
            self.check(ep).map(|_| U256::ZERO)
        }
        async fn pending_nonce(&self, ep: &Endpoint, _: Address) -> Result<u64, RpcFailure> {
            self.check(ep).map(|_| 5)
        }
        async fn estimate_gas(
            &self,
            ep: &Endpoint,
            _: &TransactionRequest,
        ) -> Result<u64, RpcFailure> {
            self.check(ep).map(|_| 21_000)
        }
        async fn fee_data(&self, ep: &Endpoint) -> Result<LiveFeeData, RpcFailure> {
            self.check(ep).map(|_| LiveFeeData::legacy(1))
        }
        async fn eth_call(
            &self,
            ep: &Endpoint,
            request: &TransactionRequest,
        ) -> Result<Bytes, RpcFailure> {
            self.check(ep)?;
            let data = request.input.input().cloned().unwrap_or_default();
            let calls = IMulticall3::aggregate3Call::abi_decode(&data)
                .map_err(|e| RpcFailure::new(RpcFailureKind::Rejected, e.to_string()))?
                .calls;
            // Native reads answer 42, token reads fail.
            let results: Vec<IMulticall3::Result> = calls
                .iter()
                .map(|call| IMulticall3::Result {
                    success: call.target == MULTICALL3,
                    returnData: U256::from(42u64).to_be_bytes::<32>().to_vec().into(),
                })
                .collect();
            Ok((results,).abi_encode_params().into())
        }
        async fn token_metadata(&self, ep: &Endpoint, _: Address) -> Result<TokenInfo, RpcFailure> {
            self.check(ep).map(|_| TokenInfo {
                symbol: "TKN".into(),
                decimals: 6,
            })
        }
        async fn send_raw(&self, ep: &Endpoint, _: &Bytes) -> Result<B256, RpcFailure> {
            self.sends.lock().unwrap().push(ep.id);
            self.check(ep).map(|_| B256::repeat_byte(1))
        }
        async fn receipt(&self, ep: &Endpoint, _: B256) -> Result<Option<ReceiptInfo>, RpcFailure> {
            let n = self.calls.load(Ordering::SeqCst);
            self.check(ep)?;
            Ok((n >= self.receipt_after && self.receipt_after > 0).then_some(ReceiptInfo {
                success: true,
                block: Some(9),
            }))
        }
    }

    fn client(endpoints: usize, rpc: Arc<FlakyRpc>) -> ChainClient {
        let urls = (0..endpoints)
            .map(|i| Url::parse(&format!("http://node{i}.test")).unwrap())
            .collect();
        let pool = EndpointPool::new(
            urls,
            HealthPolicy {
                degraded_after: 1,
                dead_after: 3,
                cooldown: Duration::from_secs(60),
            },
        )
        .unwrap();
        ChainClient::new(
            Chain::Base,
            Arc::new(pool),
            rpc,
            ClientOptions {
                retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
                call_timeout: Duration::from_millis(200),
                receipt_poll: Duration::from_millis(5),
            },
        )
    }

    fn signed() -> SignedTransaction {
        SignedTransaction {
            hash: B256::repeat_byte(1),
            raw: Bytes::from_static(&[1, 2, 3]),
            from: Address::ZERO,
            to: Address::ZERO,
            nonce: 0,
        }
    }

    #[tokio::test]
    async fn fails_over_to_next_endpoint_on_transient_error() {
        let rpc = Arc::new(FlakyRpc::new(&[0], RpcFailureKind::Unreachable));
        let client = client(2, rpc.clone());
        let bal = client.get_balance(Address::ZERO, NATIVE_SENTINEL).await.unwrap();
        assert_eq!(bal, U256::from(42u64));
        let snap = client.pool().snapshot();
        assert_eq!(snap[0].health, EndpointHealth::Degraded);
        assert_eq!(snap[1].health, EndpointHealth::Healthy);
    }

    #[tokio::test]
    async fn rejection_is_chain_error_without_retry() {
        let rpc = Arc::new(FlakyRpc::new(&[0, 1], RpcFailureKind::Rejected));
        let client = client(2, rpc.clone());
        let err = client.get_nonce(Address::ZERO).await.unwrap_err();
        assert!(matches!(err, AppError::Chain { .. }));
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_transient_failure() {
        let rpc = Arc::new(FlakyRpc::new(&[0, 1, 2, 3], RpcFailureKind::ServerError));
        let client = client(4, rpc.clone());
        let err = client.fee_data().await.unwrap_err();
        assert!(matches!(err, AppError::TransientRpc { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn nonce_sequence_starts_at_pending_nonce() {
        let rpc = Arc::new(FlakyRpc::new(&[0], RpcFailureKind::Unreachable));
        let client = client(2, rpc);
        let seq = client.nonce_sequence(Address::ZERO).await.unwrap();
        assert_eq!(seq.peek(), 5);
        assert!(seq.used().is_empty());
    }

    #[tokio::test]
    async fn multicall_balances_fail_over_and_keep_call_order() {
        let rpc = Arc::new(FlakyRpc::new(&[0], RpcFailureKind::Timeout));
        let client = client(2, rpc.clone());
        let token = Address::repeat_byte(0x11);
        let balances = client
            .multicall_balances(Address::ZERO, &[token, NATIVE_SENTINEL, token])
            .await
            .unwrap();
        assert_eq!(balances, vec![None, Some(U256::from(42u64)), None]);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn native_allowance_is_unlimited_without_rpc() {
        let rpc = Arc::new(FlakyRpc::new(&[], RpcFailureKind::Rejected));
        let client = client(1, rpc.clone());
        let allowance = client
            .get_allowance(Address::ZERO, Address::ZERO, NATIVE_SENTINEL)
            .await
            .unwrap();
        assert_eq!(allowance, U256::MAX);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_retries_only_unreached_failures() {
        let rpc = Arc::new(FlakyRpc::new(&[0], RpcFailureKind::RateLimited));
        let client = client(2, rpc.clone());
        let hash = client.submit(&signed()).await.unwrap();
        assert_eq!(hash, B256::repeat_byte(1));
        assert_eq!(*rpc.sends.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn ambiguous_submit_is_never_rebroadcast() {
        let rpc = Arc::new(FlakyRpc::new(&[0], RpcFailureKind::Timeout));
        let client = client(2, rpc.clone());
        let err = client.submit(&signed()).await.unwrap_err();
        assert!(matches!(err, AppError::SubmissionUnconfirmed { .. }));
        assert_eq!(*rpc.sends.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn receipt_wait_times_out_as_a_result() {
        let rpc = Arc::new(FlakyRpc::new(&[], RpcFailureKind::Rejected));
        let client = client(1, rpc);
        let status = client
            .wait_for_receipt(B256::ZERO, Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(status, ReceiptStatus::Timeout);
    }

    #[tokio::test]
    async fn receipt_wait_returns_once_mined() {
        let mut rpc = FlakyRpc::new(&[], RpcFailureKind::Rejected);
        rpc.receipt_after = 2;
        let client = client(1, Arc::new(rpc));
        let status = client
            .wait_for_receipt(B256::ZERO, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(status, ReceiptStatus::Success { block: Some(9) });
    }
}
