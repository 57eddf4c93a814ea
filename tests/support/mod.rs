// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>
// In-memory chain and aggregator used by the orchestrator scenarios. Signed
// payloads are decoded and applied so nonces, allowances and balances move the
// way a node would move them.

#![allow(dead_code)]

use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use oxidity_batcher::common::retry::RetryPolicy;
use alloy::sol_types::{SolCall, SolValue};
use oxidity_batcher::data::erc20::{ERC20, IMulticall3, approve_calldata, transfer_calldata};
use oxidity_batcher::data::token_manager::TokenInfo;
use oxidity_batcher::domain::chain::{Chain, ChainTarget, GasTier};
use oxidity_batcher::domain::constants::MULTICALL3;
use oxidity_batcher::domain::error::AppError;
use oxidity_batcher::domain::quote::{Quote, QuoteRequest, SwapCallData};
use oxidity_batcher::domain::wallet::Wallet;
use oxidity_batcher::network::aggregator::QuoteService;
use oxidity_batcher::network::chain_client::{ChainClient, ClientOptions};
use oxidity_batcher::network::endpoint_pool::{Endpoint, EndpointPool, HealthPolicy};
use oxidity_batcher::network::rpc::{ChainRpc, LiveFeeData, ReceiptInfo, RpcFailure, RpcFailureKind};
use oxidity_batcher::services::orchestrator::{Orchestrator, OrchestratorConfig};
use oxidity_batcher::services::pipeline::ConfirmationPolicy;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const CHAIN: Chain = Chain::Base;
pub const ROUTER: Address = Address::repeat_byte(0xAA);
pub const USDC: Address = Address::repeat_byte(0x11);
pub const WETH: Address = Address::repeat_byte(0x22);
pub const GWEI: u128 = 1_000_000_000;

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub input: Bytes,
}

#[derive(Default)]
struct ChainState {
    native: HashMap<Address, U256>,
    tokens: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    nonces: HashMap<Address, u64>,
    metadata: HashMap<Address, TokenInfo>,
    receipts: HashMap<B256, ReceiptInfo>,
    sent: Vec<SentTx>,
    unreachable: HashSet<usize>,
    calls: HashMap<usize, usize>,
    revert_approvals: HashSet<Address>,
    withhold_receipts: bool,
    block: u64,
    revert_multicall: bool,
    multicalls: usize,
    single_balance_reads: usize,
    /// Submissions still to be applied but answered with a gateway error.
    ambiguous_submits: usize,
    reject_fee_data: bool,
    charge_gas: bool,
}

/// `ChainRpc` backed by a shared in-memory ledger.
#[derive(Default)]
pub struct ScriptedChain {
    state: Mutex<ChainState>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        let chain = Self::default();
        chain.with(|s| {
            s.block = 100;
            s.metadata.insert(
                USDC,
                TokenInfo {
                    symbol: "USDC".into(),
                    decimals: 6,
                },
            );
            s.metadata.insert(
                WETH,
                TokenInfo {
                    symbol: "WETH".into(),
                    decimals: 18,
                },
            );
        });
        chain
    }

    fn with<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn fund_native(&self, owner: Address, amount: U256) {
        self.with(|s| {
            s.native.insert(owner, amount);
        });
    }

    pub fn fund_token(&self, token: Address, owner: Address, amount: U256) {
        self.with(|s| {
            s.tokens.insert((token, owner), amount);
        });
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.with(|s| {
            s.allowances.insert((token, owner, spender), amount);
        });
    }

    pub fn set_nonce(&self, owner: Address, nonce: u64) {
        self.with(|s| {
            s.nonces.insert(owner, nonce);
        });
    }

    pub fn make_unreachable(&self, endpoint_id: usize) {
        self.with(|s| {
            s.unreachable.insert(endpoint_id);
        });
    }

    pub fn revert_approvals_from(&self, owner: Address) {
        self.with(|s| {
            s.revert_approvals.insert(owner);
        });
    }

    pub fn withhold_receipts(&self) {
        self.with(|s| s.withhold_receipts = true);
    }

    pub fn revert_multicall(&self) {
        self.with(|s| s.revert_multicall = true);
    }

    /// The next `count` submissions land on chain but the node answers 502.
    pub fn ambiguous_submits(&self, count: usize) {
        self.with(|s| s.ambiguous_submits = count);
    }

    pub fn reject_fee_data(&self) {
        self.with(|s| s.reject_fee_data = true);
    }

    /// Deduct `gas_used * max_fee_per_gas` from the sender on every submission.
    pub fn charge_gas(&self) {
        self.with(|s| s.charge_gas = true);
    }

    pub fn multicalls(&self) -> usize {
        self.with(|s| s.multicalls)
    }

    pub fn single_balance_reads(&self) -> usize {
        self.with(|s| s.single_balance_reads)
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.with(|s| s.sent.clone())
    }

    pub fn sent_from(&self, owner: Address) -> Vec<SentTx> {
        self.sent().into_iter().filter(|tx| tx.from == owner).collect()
    }

    pub fn allowance_of(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.with(|s| {
            s.allowances
                .get(&(token, owner, spender))
                .copied()
                .unwrap_or_default()
        })
    }

    pub fn native_of(&self, owner: Address) -> U256 {
        self.with(|s| s.native.get(&owner).copied().unwrap_or_default())
    }

    pub fn token_of(&self, token: Address, owner: Address) -> U256 {
        self.with(|s| s.tokens.get(&(token, owner)).copied().unwrap_or_default())
    }

    pub fn calls_to(&self, endpoint_id: usize) -> usize {
        self.with(|s| s.calls.get(&endpoint_id).copied().unwrap_or_default())
    }

    fn touch(&self, ep: &Endpoint) -> Result<(), RpcFailure> {
        self.with(|s| {
            *s.calls.entry(ep.id).or_default() += 1;
            if s.unreachable.contains(&ep.id) {
                return Err(RpcFailure::new(
                    RpcFailureKind::Unreachable,
                    "tcp connect error: connection refused",
                ));
            }
            Ok(())
        })
    }
}

fn selector(data: &Bytes) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&data[..4]);
    out
}

/// Spender/recipient and amount of a two-argument ERC-20 call.
fn address_and_amount(input: &[u8]) -> Option<(Address, U256)> {
    if input.len() < 68 {
        return None;
    }
    Some((
        Address::from_slice(&input[16..36]),
        U256::from_be_slice(&input[36..68]),
    ))
}

fn gas_used(input: &Bytes) -> u64 {
    if input.is_empty() { 21_000 } else { 60_000 }
}

/// Answers an `aggregate3` balance batch from the ledger.
fn aggregate_balances(s: &ChainState, data: &[u8]) -> Result<Bytes, RpcFailure> {
    let calls = IMulticall3::aggregate3Call::abi_decode(data)
        .map_err(|e| RpcFailure::new(RpcFailureKind::Rejected, e.to_string()))?
        .calls;
    let results: Vec<IMulticall3::Result> = calls
        .iter()
        .map(|call| {
            let balance = if call.target == MULTICALL3 {
                IMulticall3::getEthBalanceCall::abi_decode(&call.callData)
                    .ok()
                    .map(|c| s.native.get(&c.addr).copied().unwrap_or_default())
            } else {
                ERC20::balanceOfCall::abi_decode(&call.callData).ok().map(|c| {
                    s.tokens
                        .get(&(call.target, c.owner))
                        .copied()
                        .unwrap_or_default()
                })
            };
            match balance {
                Some(balance) => IMulticall3::Result {
                    success: true,
                    returnData: balance.to_be_bytes::<32>().to_vec().into(),
                },
                None => IMulticall3::Result {
                    success: false,
                    returnData: Bytes::new(),
                },
            }
        })
        .collect();
    Ok((results,).abi_encode_params().into())
}

fn apply(s: &mut ChainState, tx: &SentTx) -> bool {
    let approve = selector(&approve_calldata(Address::ZERO, U256::ZERO));
    let transfer = selector(&transfer_calldata(Address::ZERO, U256::ZERO));
    let Some(to) = tx.to else {
        return false;
    };

    if tx.input.len() >= 4 && tx.input[..4] == approve {
        if s.revert_approvals.contains(&tx.from) {
            return false;
        }
        if let Some((spender, amount)) = address_and_amount(&tx.input) {
            s.allowances.insert((to, tx.from, spender), amount);
        }
        return true;
    }
    if tx.input.len() >= 4 && tx.input[..4] == transfer {
        let Some((receiver, amount)) = address_and_amount(&tx.input) else {
            return false;
        };
        let held = s.tokens.get(&(to, tx.from)).copied().unwrap_or_default();
        if held < amount {
            return false;
        }
        s.tokens.insert((to, tx.from), held - amount);
        *s.tokens.entry((to, receiver)).or_default() += amount;
        return true;
    }
    if !tx.value.is_zero() {
        let held = s.native.get(&tx.from).copied().unwrap_or_default();
        if held < tx.value {
            return false;
        }
        s.native.insert(tx.from, held - tx.value);
        *s.native.entry(to).or_default() += tx.value;
    }
    true
}

#[async_trait]
impl ChainRpc for ScriptedChain {
    async fn native_balance(&self, ep: &Endpoint, owner: Address) -> Result<U256, RpcFailure> {
        self.touch(ep)?;
        self.with(|s| s.single_balance_reads += 1);
        Ok(self.native_of(owner))
    }

    async fn token_balance(
        &self,
        ep: &Endpoint,
        token: Address,
        owner: Address,
    ) -> Result<U256, RpcFailure> {
        self.touch(ep)?;
        self.with(|s| s.single_balance_reads += 1);
        Ok(self.token_of(token, owner))
    }

    async fn allowance(
        &self,
        ep: &Endpoint,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, RpcFailure> {
        self.touch(ep)?;
        Ok(self.allowance_of(token, owner, spender))
    }

    async fn pending_nonce(&self, ep: &Endpoint, address: Address) -> Result<u64, RpcFailure> {
        self.touch(ep)?;
        Ok(self.with(|s| s.nonces.get(&address).copied().unwrap_or_default()))
    }

    async fn estimate_gas(
        &self,
        ep: &Endpoint,
        request: &TransactionRequest,
    ) -> Result<u64, RpcFailure> {
        self.touch(ep)?;
        let plain = request.input.input().is_none_or(|data| data.is_empty());
        Ok(if plain { 21_000 } else { 60_000 })
    }

    async fn fee_data(&self, ep: &Endpoint) -> Result<LiveFeeData, RpcFailure> {
        self.touch(ep)?;
        if self.with(|s| s.reject_fee_data) {
            return Err(RpcFailure::new(
                RpcFailureKind::Rejected,
                "the method eth_feeHistory does not exist (code -32601)",
            ));
        }
        Ok(LiveFeeData {
            next_base_fee: Some(GWEI),
            priority_fees: [GWEI / 10, GWEI / 2, GWEI],
            gas_price: None,
        })
    }

    async fn eth_call(
        &self,
        ep: &Endpoint,
        request: &TransactionRequest,
    ) -> Result<Bytes, RpcFailure> {
        self.touch(ep)?;
        let data = request.input.input().cloned().unwrap_or_default();
        let target = request.to.and_then(|to| to.to().copied());
        self.with(|s| {
            s.multicalls += 1;
            if s.revert_multicall || target != Some(MULTICALL3) {
                return Err(RpcFailure::new(
                    RpcFailureKind::Rejected,
                    "execution reverted (code 3)",
                ));
            }
            aggregate_balances(s, &data)
        })
    }

    async fn token_metadata(
        &self,
        ep: &Endpoint,
        token: Address,
    ) -> Result<TokenInfo, RpcFailure> {
        self.touch(ep)?;
        self.with(|s| s.metadata.get(&token).cloned())
            .ok_or_else(|| RpcFailure::new(RpcFailureKind::Rejected, "execution reverted"))
    }

    async fn send_raw(&self, ep: &Endpoint, raw: &Bytes) -> Result<B256, RpcFailure> {
        self.touch(ep)?;
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| RpcFailure::new(RpcFailureKind::Rejected, e.to_string()))?;
        let from = envelope
            .recover_signer()
            .map_err(|e| RpcFailure::new(RpcFailureKind::Rejected, e.to_string()))?;
        let tx = SentTx {
            hash: *envelope.tx_hash(),
            from,
            to: envelope.to(),
            nonce: envelope.nonce(),
            value: envelope.value(),
            input: envelope.input().clone(),
        };

        self.with(|s| {
            let expected = s.nonces.get(&from).copied().unwrap_or_default();
            if tx.nonce != expected {
                return Err(RpcFailure::new(
                    RpcFailureKind::Rejected,
                    format!("nonce too low: next nonce {expected}, tx nonce {}", tx.nonce),
                ));
            }
            s.nonces.insert(from, expected + 1);
            if s.charge_gas {
                let fee = U256::from(gas_used(&tx.input))
                    * U256::from(envelope.max_fee_per_gas());
                let held = s.native.get(&from).copied().unwrap_or_default();
                s.native.insert(from, held.saturating_sub(fee));
            }
            let success = apply(s, &tx);
            s.block += 1;
            if !s.withhold_receipts {
                let block = s.block;
                s.receipts.insert(
                    tx.hash,
                    ReceiptInfo {
                        success,
                        block: Some(block),
                    },
                );
            }
            s.sent.push(tx.clone());
            if s.ambiguous_submits > 0 {
                s.ambiguous_submits -= 1;
                return Err(RpcFailure::new(
                    RpcFailureKind::ServerError,
                    "HTTP 502 Bad Gateway",
                ));
            }
            Ok(tx.hash)
        })
    }

    async fn receipt(&self, ep: &Endpoint, hash: B256) -> Result<Option<ReceiptInfo>, RpcFailure> {
        self.touch(ep)?;
        Ok(self.with(|s| s.receipts.get(&hash).copied()))
    }
}

/// Aggregator stand-in quoting a fixed 2:1 rate. Builds refuse stale quotes the
/// way the live client does.
#[derive(Default)]
pub struct ScriptedQuotes {
    no_route_for: Mutex<HashSet<Address>>,
    builds: Mutex<Vec<Address>>,
    /// Lifetimes handed to the next quotes; 30s once drained.
    ttls: Mutex<VecDeque<Duration>>,
    build_delay: Mutex<Duration>,
    quotes_issued: Mutex<usize>,
}

impl ScriptedQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote_ttls(&self, ttls: impl IntoIterator<Item = Duration>) {
        self.ttls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(ttls);
    }

    pub fn delay_builds(&self, delay: Duration) {
        *self.build_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn quotes_issued(&self) -> usize {
        *self.quotes_issued.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn refuse_route_for(&self, sender: Address) {
        self.no_route_for
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(sender);
    }

    pub fn builds(&self) -> Vec<Address> {
        self.builds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl QuoteService for ScriptedQuotes {
    async fn get_quote(&self, _chain: Chain, request: &QuoteRequest) -> Result<Quote, AppError> {
        *self.quotes_issued.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        let ttl = self
            .ttls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Duration::from_secs(30));
        Ok(Quote::new(
            request,
            request.amount_in * U256::from(2u64),
            ROUTER,
            serde_json::json!({ "route": "scripted" }),
            ttl,
        ))
    }

    async fn build_swap_call_data(
        &self,
        _chain: Chain,
        quote: &Quote,
        min_amount_out: U256,
        sender: Address,
        _recipient: Address,
    ) -> Result<SwapCallData, AppError> {
        quote.ensure_fresh()?;
        let delay = *self.build_delay.lock().unwrap_or_else(|e| e.into_inner());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.builds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sender);
        let refused = self
            .no_route_for
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&sender);
        if refused {
            return Err(AppError::NoRoute(format!(
                "no route for {:#x} -> {:#x}",
                quote.token_in, quote.token_out
            )));
        }
        let mut data = vec![0xe2, 0x1f, 0xd0, 0xe9];
        data.extend_from_slice(&min_amount_out.to_be_bytes::<32>());
        Ok(SwapCallData {
            router: ROUTER,
            data: Bytes::from(data),
            value: U256::ZERO,
            gas_hint: Some(180_000),
            amount_out: quote.amount_out,
        })
    }
}

pub fn endpoints(n: usize) -> Vec<Url> {
    (0..n)
        .map(|i| Url::parse(&format!("http://rpc-{i}.test/")).unwrap())
        .collect()
}

pub fn fast_options() -> ClientOptions {
    ClientOptions {
        retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        call_timeout: Duration::from_secs(2),
        receipt_poll: Duration::from_millis(5),
    }
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        concurrency: 3,
        spender: ROUTER,
        confirmation: ConfirmationPolicy {
            timeout: Duration::from_millis(500),
            extensions: 1,
        },
        ..OrchestratorConfig::default()
    }
}

/// Orchestrator wired to `chain` and `quotes` over `endpoint_count` fake endpoints.
pub fn orchestrator(
    chain: Arc<ScriptedChain>,
    quotes: Arc<ScriptedQuotes>,
    endpoint_count: usize,
    config: OrchestratorConfig,
) -> (Orchestrator, Arc<ChainClient>) {
    let target = ChainTarget::new(CHAIN, endpoints(endpoint_count), GasTier::Standard);
    let pool = Arc::new(EndpointPool::new(target.endpoints.clone(), HealthPolicy::default()).unwrap());
    let client = Arc::new(ChainClient::new(CHAIN, pool, chain, fast_options()));
    let orchestrator = Orchestrator::new(target, client.clone(), quotes, config);
    (orchestrator, client)
}

pub fn signers(n: usize) -> Vec<PrivateKeySigner> {
    (0..n).map(|_| PrivateKeySigner::random()).collect()
}

pub fn wallets(signers: &[PrivateKeySigner]) -> Vec<Wallet> {
    signers.iter().cloned().map(Wallet::from_signer).collect()
}
