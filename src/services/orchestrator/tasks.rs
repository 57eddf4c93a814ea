// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Per-wallet work. Each function drives one wallet from `Pending` to a terminal
//! state; errors are turned into task results at the `run_wallet` boundary.

use crate::data::erc20::transfer_calldata;
use crate::data::token_manager::TokenManager;
use crate::domain::constants::NATIVE_TRANSFER_GAS;
use crate::domain::error::AppError;
use crate::domain::quote::QuoteRequest;
use crate::domain::task::{AmountSpec, TaskResult, TaskState};
use crate::domain::transaction::TxCall;
use crate::domain::wallet::Wallet;
use crate::network::aggregator::QuoteService;
use crate::network::chain_client::ChainClient;
use crate::services::approval::{ApprovalManager, ApprovalOutcome};
use crate::services::orchestrator::state::TaskTracker;
use crate::services::pipeline::TxPipeline;
use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;

/// What one wallet has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletJob {
    Swap {
        token_in: Address,
        token_out: Address,
        amount: AmountSpec,
    },
    Transfer {
        token: Address,
        amount: AmountSpec,
        receiver: Address,
    },
    Balance {
        tokens: Vec<Address>,
    },
}

impl WalletJob {
    pub fn name(&self) -> &'static str {
        match self {
            WalletJob::Swap { .. } => "swap",
            WalletJob::Transfer { .. } => "transfer",
            WalletJob::Balance { .. } => "balance",
        }
    }
}

pub(crate) struct TaskContext {
    pub client: Arc<ChainClient>,
    pub quotes: Arc<dyn QuoteService>,
    pub pipeline: Arc<TxPipeline>,
    pub approvals: ApprovalManager,
    pub tokens: Arc<TokenManager>,
    pub spender: Address,
    pub slippage_bps: u32,
    pub max_requotes: u32,
}

pub(crate) struct WalletOutcome {
    pub result: TaskResult,
    /// Set when the error must stop the whole run.
    pub fatal: Option<String>,
}

enum Flow {
    Done {
        detail: String,
        tx_hash: Option<B256>,
    },
    Skip(String),
}

pub(crate) async fn run_wallet(ctx: &TaskContext, mut wallet: Wallet, job: WalletJob) -> WalletOutcome {
    let mut tracker = TaskTracker::new(wallet.address(), job.name());
    let outcome = match job {
        WalletJob::Swap {
            token_in,
            token_out,
            amount,
        } => swap(ctx, &mut wallet, &mut tracker, token_in, token_out, amount).await,
        WalletJob::Transfer {
            token,
            amount,
            receiver,
        } => transfer(ctx, &mut wallet, &mut tracker, token, amount, receiver).await,
        WalletJob::Balance { tokens } => balances(ctx, &wallet, &tokens).await,
    };

    match outcome {
        Ok(Flow::Done { detail, tx_hash }) => WalletOutcome {
            result: tracker.succeed(detail, tx_hash),
            fatal: None,
        },
        Ok(Flow::Skip(reason)) => WalletOutcome {
            result: tracker.skip(reason),
            fatal: None,
        },
        Err(err) => WalletOutcome {
            fatal: err.is_fatal().then(|| err.to_string()),
            result: tracker.fail(&err),
        },
    }
}

/// Resolves the amount against the balance, or explains why the wallet is skipped.
fn validate_amount(spec: AmountSpec, balance: U256) -> Result<U256, String> {
    if balance.is_zero() {
        return Err("zero balance".into());
    }
    let amount = spec.resolve(balance);
    if amount.is_zero() {
        return Err("amount resolves to zero".into());
    }
    if amount > balance {
        return Err(format!("amount {amount} exceeds balance {balance}"));
    }
    Ok(amount)
}

fn format_amount(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    match format_units(value, decimals) {
        Ok(rendered) if rendered.contains('.') => rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string(),
        Ok(rendered) => rendered,
        Err(_) => value.to_string(),
    }
}

async fn load_nonce(ctx: &TaskContext, wallet: &mut Wallet) -> Result<(), AppError> {
    let sequence = ctx.client.nonce_sequence(wallet.address()).await?;
    wallet.attach_nonce(sequence);
    Ok(())
}

async fn swap(
    ctx: &TaskContext,
    wallet: &mut Wallet,
    tracker: &mut TaskTracker,
    token_in: Address,
    token_out: Address,
    amount: AmountSpec,
) -> Result<Flow, AppError> {
    let owner = wallet.address();
    let chain = ctx.client.chain();
    let native_in = chain.is_native(token_in);

    let balance = ctx.client.get_balance(owner, token_in).await?;
    let amount_in = match validate_amount(amount, balance) {
        Ok(amount) => amount,
        Err(reason) => return Ok(Flow::Skip(reason)),
    };
    load_nonce(ctx, wallet).await?;

    if !native_in {
        tracker.advance(TaskState::ApprovalCheck)?;
        match ctx
            .approvals
            .ensure_approval(wallet, token_in, ctx.spender, amount_in)
            .await?
        {
            ApprovalOutcome::AlreadySufficient => {}
            ApprovalOutcome::Approved(hash) => {
                tracker.set_approval_hash(hash);
                tracing::info!(
                    target: "orchestrator",
                    wallet = %format!("{owner:#x}"),
                    tx_hash = %format!("{hash:#x}"),
                    "Approval in place"
                );
            }
        }
    }

    let request = QuoteRequest {
        token_in,
        token_out,
        amount_in,
        slippage_bps: ctx.slippage_bps,
    };
    let mut requotes = 0u32;
    let (quote, signed) = loop {
        tracker.advance(TaskState::Quoting)?;
        let quote = ctx.quotes.get_quote(chain, &request).await?;
        let built = match ctx
            .quotes
            .build_swap_call_data(chain, &quote, quote.min_amount_out(), owner, owner)
            .await
        {
            Err(AppError::QuoteExpired { age_ms }) if requotes < ctx.max_requotes => {
                requotes += 1;
                tracing::warn!(target: "orchestrator", wallet = %format!("{owner:#x}"), age_ms = %age_ms, "Quote expired before build; re-quoting");
                continue;
            }
            other => other?,
        };
        if !native_in && built.router != ctx.spender {
            return Err(AppError::Validation {
                field: "router".into(),
                message: format!(
                    "aggregator router {:#x} differs from approved spender {:#x}",
                    built.router, ctx.spender
                ),
            });
        }
        let value = if native_in && built.value.is_zero() {
            amount_in
        } else {
            built.value
        };
        let call = TxCall {
            to: built.router,
            value,
            data: built.data,
        };

        tracker.advance(TaskState::GasSizing)?;
        let gas = ctx.pipeline.size_gas(owner, &call, built.gas_hint).await?;

        tracker.advance(TaskState::Signing)?;
        if let Err(stale) = quote.ensure_fresh() {
            if requotes < ctx.max_requotes {
                requotes += 1;
                tracing::warn!(target: "orchestrator", wallet = %format!("{owner:#x}"), error = %stale, "Quote went stale before signing; re-quoting");
                continue;
            }
            return Err(stale);
        }
        let signed = ctx.pipeline.sign(wallet, call, gas)?;
        break (quote, signed);
    };

    let hash = ctx.pipeline.submit(wallet, &signed).await?;
    tracker.set_tx_hash(hash);
    tracker.advance(TaskState::Submitted)?;
    let confirmation = ctx.pipeline.confirm(hash).await?;

    let info_in = ctx.tokens.resolve_or_placeholder(&ctx.client, token_in).await;
    let info_out = ctx.tokens.resolve_or_placeholder(&ctx.client, token_out).await;
    Ok(Flow::Done {
        detail: format!(
            "swapped {} {} for at least {} {} (quoted {}, block {})",
            format_amount(amount_in, info_in.decimals),
            info_in.symbol,
            format_amount(quote.min_amount_out(), info_out.decimals),
            info_out.symbol,
            format_amount(quote.amount_out, info_out.decimals),
            confirmation
                .block
                .map(|b| b.to_string())
                .unwrap_or_else(|| "?".into())
        ),
        tx_hash: Some(confirmation.hash),
    })
}

async fn transfer(
    ctx: &TaskContext,
    wallet: &mut Wallet,
    tracker: &mut TaskTracker,
    token: Address,
    amount: AmountSpec,
    receiver: Address,
) -> Result<Flow, AppError> {
    let owner = wallet.address();
    if receiver == owner {
        return Ok(Flow::Skip("receiver is the sending wallet".into()));
    }
    let native = ctx.client.chain().is_native(token);
    let call_for = |amount: U256| {
        if native {
            TxCall::native_transfer(receiver, amount)
        } else {
            TxCall::contract(token, transfer_calldata(receiver, amount))
        }
    };

    let balance = ctx.client.get_balance(owner, token).await?;
    let mut value = match validate_amount(amount, balance) {
        Ok(amount) => amount,
        Err(reason) => return Ok(Flow::Skip(reason)),
    };
    load_nonce(ctx, wallet).await?;

    tracker.advance(TaskState::GasSizing)?;
    let hint = native.then_some(NATIVE_TRANSFER_GAS);
    let gas = ctx.pipeline.estimate(owner, &call_for(value), hint).await?;
    if native && matches!(amount, AmountSpec::PercentBps(_)) {
        // A share of the native balance leaves room for the fee.
        let spendable = balance.saturating_sub(gas.max_cost());
        value = value.min(spendable);
        if value.is_zero() {
            return Ok(Flow::Skip("balance does not cover the transfer fee".into()));
        }
    }
    let call = call_for(value);
    ctx.pipeline
        .ensure_affordable(owner, call.value, &gas)
        .await?;

    tracker.advance(TaskState::Signing)?;
    let signed = ctx.pipeline.sign(wallet, call, gas)?;
    let hash = ctx.pipeline.submit(wallet, &signed).await?;
    tracker.set_tx_hash(hash);
    tracker.advance(TaskState::Submitted)?;
    let confirmation = ctx.pipeline.confirm(hash).await?;

    let info = ctx.tokens.resolve_or_placeholder(&ctx.client, token).await;
    Ok(Flow::Done {
        detail: format!(
            "transferred {} {} to {receiver:#x}",
            format_amount(value, info.decimals),
            info.symbol
        ),
        tx_hash: Some(confirmation.hash),
    })
}

async fn balances(ctx: &TaskContext, wallet: &Wallet, tokens: &[Address]) -> Result<Flow, AppError> {
    let owner = wallet.address();
    let batched = match ctx.client.multicall_balances(owner, tokens).await {
        Ok(batched) => batched,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            tracing::warn!(
                target: "orchestrator",
                wallet = %format!("{owner:#x}"),
                error = %e,
                "Multicall balance read failed; reading tokens one by one"
            );
            vec![None; tokens.len()]
        }
    };

    let mut parts = Vec::with_capacity(tokens.len());
    for (token, batched) in tokens.iter().zip(batched) {
        let balance = match batched {
            Some(balance) => balance,
            None => ctx.client.get_balance(owner, *token).await?,
        };
        let info = ctx.tokens.resolve_or_placeholder(&ctx.client, *token).await;
        parts.push(format!(
            "{}={}",
            info.symbol,
            format_amount(balance, info.decimals)
        ));
    }
    Ok(Flow::Done {
        detail: parts.join(", "),
        tx_hash: None,
    })
}
