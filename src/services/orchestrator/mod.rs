// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Batch orchestrator: fans one operation out over many wallets with bounded
//! parallelism and collects one result per wallet.

pub mod state;
pub mod tasks;

use crate::data::token_manager::TokenManager;
use crate::domain::chain::ChainTarget;
use crate::domain::constants::{
    DEFAULT_GAS_LIMIT_MARGIN_BPS, DEFAULT_SLIPPAGE_BPS, KYBERSWAP_ROUTER, MAX_REQUOTES,
};
use crate::domain::error::AppError;
use crate::domain::task::{Operation, TaskResult, TaskState, TaskStatus};
use crate::domain::wallet::Wallet;
use crate::network::aggregator::QuoteService;
use crate::network::chain_client::ChainClient;
use crate::network::endpoint_pool::EndpointHealth;
use crate::network::gas::GasStrategy;
use crate::services::approval::{ApprovalManager, ApprovalMode};
use crate::services::pipeline::{ConfirmationPolicy, TxPipeline};
use crate::services::report::{ReportSink, RunReport};
use alloy::primitives::Address;
use state::TaskTracker;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tasks::{TaskContext, WalletOutcome};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

pub use tasks::WalletJob;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub concurrency: usize,
    pub slippage_bps: u32,
    pub max_requotes: u32,
    pub approval_mode: ApprovalMode,
    /// Router the swap allowance is granted to.
    pub spender: Address,
    pub gas_limit_margin_bps: u64,
    pub confirmation: ConfirmationPolicy,
    pub dry_run: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            max_requotes: MAX_REQUOTES,
            approval_mode: ApprovalMode::default(),
            spender: KYBERSWAP_ROUTER,
            gas_limit_margin_bps: DEFAULT_GAS_LIMIT_MARGIN_BPS,
            confirmation: ConfirmationPolicy::default(),
            dry_run: false,
        }
    }
}

pub struct Orchestrator {
    target: ChainTarget,
    client: Arc<ChainClient>,
    quotes: Arc<dyn QuoteService>,
    gas: Arc<GasStrategy>,
    tokens: Arc<TokenManager>,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        target: ChainTarget,
        client: Arc<ChainClient>,
        quotes: Arc<dyn QuoteService>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gas: Arc::new(GasStrategy::new(config.gas_limit_margin_bps)),
            tokens: Arc::new(TokenManager::new()),
            target,
            client,
            quotes,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling stops dispatch; wallets already running finish normally.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn context(&self) -> TaskContext {
        let pipeline = Arc::new(TxPipeline::new(
            self.client.clone(),
            self.target.clone(),
            self.gas.clone(),
            self.config.confirmation,
            self.config.dry_run,
        ));
        TaskContext {
            client: self.client.clone(),
            quotes: self.quotes.clone(),
            approvals: ApprovalManager::new(pipeline.clone(), self.config.approval_mode),
            pipeline,
            tokens: self.tokens.clone(),
            spender: self.config.spender,
            slippage_bps: self.config.slippage_bps,
            max_requotes: self.config.max_requotes,
        }
    }

    /// Runs `operation` for every wallet and streams results into `sink`.
    ///
    /// Returns `Err` only when the batch cannot start. Run-level failures during
    /// processing are reported through [`RunReport::fatal_error`].
    pub async fn run(
        &self,
        wallets: Vec<Wallet>,
        operation: &Operation,
        sink: &dyn ReportSink,
    ) -> Result<RunReport, AppError> {
        let started = Instant::now();
        if wallets.is_empty() {
            return Err(AppError::Config("No wallets loaded".into()));
        }
        let jobs = plan_jobs(operation, wallets.len())?;
        let mut pending = dedupe(wallets.into_iter().zip(jobs));

        tracing::info!(
            target: "orchestrator",
            chain = %self.target.chain,
            chain_id = self.target.chain_id(),
            operation = operation.name(),
            wallets = pending.len(),
            concurrency = self.config.concurrency,
            dry_run = self.config.dry_run,
            "Starting batch"
        );

        let ctx = Arc::new(self.context());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut running: JoinSet<WalletOutcome> = JoinSet::new();
        let mut collector = Collector {
            report: RunReport::new(self.target.chain, operation.name()),
            in_flight: HashMap::new(),
            sink,
            cancel: &self.cancel,
        };

        while let Some((wallet, job)) = pending.pop_front() {
            let permit = loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break None,
                    Some(joined) = running.join_next_with_id(), if !running.is_empty() => {
                        collector.absorb(joined);
                    }
                    permit = semaphore.clone().acquire_owned() => break permit.ok(),
                }
            };
            let Some(permit) = permit else {
                pending.push_front((wallet, job));
                break;
            };

            let address = wallet.address();
            let ctx = ctx.clone();
            let handle = running.spawn(async move {
                let _permit = permit;
                tasks::run_wallet(&ctx, wallet, job).await
            });
            collector
                .in_flight
                .insert(handle.id(), (address, operation.name()));
        }

        if !pending.is_empty() {
            tracing::warn!(
                target: "orchestrator",
                undispatched = pending.len(),
                "Run cancelled; remaining wallets skipped"
            );
        }
        for (wallet, job) in pending {
            collector.record(TaskTracker::new(wallet.address(), job.name()).skip("run cancelled"));
        }

        while let Some(joined) = running.join_next_with_id().await {
            collector.absorb(joined);
        }

        let mut report = collector.report;
        report.elapsed = started.elapsed();
        self.log_endpoint_health();
        tracing::info!(target: "orchestrator", summary = %report.summary(), "Batch finished");
        Ok(report)
    }

    fn log_endpoint_health(&self) {
        for status in self.client.pool().snapshot() {
            let health = match status.health {
                EndpointHealth::Healthy => "healthy",
                EndpointHealth::Degraded => "degraded",
                EndpointHealth::Dead { .. } => "dead",
            };
            tracing::info!(
                target: "orchestrator",
                endpoint = %status.url,
                health,
                consecutive_failures = status.consecutive_failures,
                "Endpoint health"
            );
        }
    }
}

struct Collector<'a> {
    report: RunReport,
    in_flight: HashMap<Id, (Address, &'static str)>,
    sink: &'a dyn ReportSink,
    cancel: &'a CancellationToken,
}

impl Collector<'_> {
    fn record(&mut self, result: TaskResult) {
        self.sink.record(&result);
        self.report.push(result);
    }

    fn absorb(&mut self, joined: Result<(Id, WalletOutcome), JoinError>) {
        match joined {
            Ok((id, outcome)) => {
                self.in_flight.remove(&id);
                if let Some(fatal) = outcome.fatal {
                    if self.report.fatal_error.is_none() {
                        tracing::error!(
                            target: "orchestrator",
                            wallet = %format!("{:#x}", outcome.result.wallet),
                            error = %fatal,
                            "Run-level failure; stopping dispatch"
                        );
                        self.report.fatal_error = Some(fatal);
                    }
                    self.cancel.cancel();
                }
                self.record(outcome.result);
            }
            Err(e) => {
                let (wallet, operation) = self
                    .in_flight
                    .remove(&e.id())
                    .unwrap_or((Address::ZERO, "unknown"));
                tracing::error!(
                    target: "orchestrator",
                    wallet = %format!("{wallet:#x}"),
                    error = %e,
                    "Wallet task aborted"
                );
                self.record(TaskResult {
                    wallet,
                    operation,
                    status: TaskStatus::Failed,
                    detail: format!("wallet task aborted: {e}"),
                    tx_hash: None,
                    approval_tx_hash: None,
                    reached: TaskState::Pending,
                    final_state: TaskState::Failed,
                    error_kind: Some("Unknown"),
                });
            }
        }
    }
}

/// One job per wallet, in wallet order. Transfer receivers pair 1-to-1 with the
/// wallets or a single receiver is shared by all.
pub fn plan_jobs(operation: &Operation, wallet_count: usize) -> Result<Vec<WalletJob>, AppError> {
    match operation {
        Operation::Swap {
            token_in,
            token_out,
            amount,
        } => {
            if token_in == token_out {
                return Err(AppError::Config(
                    "Swap input and output token are the same".into(),
                ));
            }
            Ok(vec![
                WalletJob::Swap {
                    token_in: *token_in,
                    token_out: *token_out,
                    amount: *amount,
                };
                wallet_count
            ])
        }
        Operation::Transfer {
            token,
            amount,
            receivers,
        } => {
            let paired = match receivers.len() {
                0 => return Err(AppError::Config("No receivers loaded for transfer".into())),
                1 => vec![receivers[0]; wallet_count],
                n if n == wallet_count => receivers.clone(),
                n => {
                    return Err(AppError::Config(format!(
                        "{n} receivers for {wallet_count} wallets; provide one per wallet or a single shared receiver"
                    )));
                }
            };
            Ok(paired
                .into_iter()
                .map(|receiver| WalletJob::Transfer {
                    token: *token,
                    amount: *amount,
                    receiver,
                })
                .collect())
        }
        Operation::Balance { tokens } => {
            if tokens.is_empty() {
                return Err(AppError::Config("No tokens loaded for balance read".into()));
            }
            Ok(vec![
                WalletJob::Balance {
                    tokens: tokens.clone(),
                };
                wallet_count
            ])
        }
    }
}

/// Keeps the first job per wallet address so no wallet runs twice.
fn dedupe(pairs: impl Iterator<Item = (Wallet, WalletJob)>) -> VecDeque<(Wallet, WalletJob)> {
    let mut seen = HashSet::new();
    pairs
        .filter(|(wallet, _)| {
            let fresh = seen.insert(wallet.address());
            if !fresh {
                tracing::warn!(
                    target: "orchestrator",
                    wallet = %format!("{:#x}", wallet.address()),
                    "Duplicate wallet ignored"
                );
            }
            fresh
        })
        .collect()
}
