// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::data::erc20::approve_calldata;
use crate::domain::error::{AppError, Disposition};
use crate::domain::transaction::TxCall;
use crate::domain::wallet::Wallet;
use crate::services::pipeline::TxPipeline;
use alloy::primitives::{Address, B256, U256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Size of the allowance granted when one is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalMode {
    /// `amount + 1`.
    Exact,
    #[default]
    Unlimited,
}

impl ApprovalMode {
    pub fn allowance_for(self, needed: U256) -> U256 {
        match self {
            ApprovalMode::Exact => needed.saturating_add(U256::from(1u64)),
            ApprovalMode::Unlimited => U256::MAX,
        }
    }
}

impl FromStr for ApprovalMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(ApprovalMode::Exact),
            "unlimited" | "max" | "infinite" => Ok(ApprovalMode::Unlimited),
            other => Err(AppError::Config(format!(
                "Unknown approval mode '{other}' (expected exact or unlimited)"
            ))),
        }
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApprovalMode::Exact => "exact",
            ApprovalMode::Unlimited => "unlimited",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    AlreadySufficient,
    Approved(B256),
}

pub struct ApprovalManager {
    pipeline: Arc<TxPipeline>,
    mode: ApprovalMode,
}

impl ApprovalManager {
    pub fn new(pipeline: Arc<TxPipeline>, mode: ApprovalMode) -> Self {
        Self { pipeline, mode }
    }

    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    /// Makes sure `spender` may move `amount_needed` of `token` for the wallet.
    ///
    /// Consumes the wallet's next nonce only when an approval is actually sent, and
    /// returns only after that approval is confirmed.
    pub async fn ensure_approval(
        &self,
        wallet: &mut Wallet,
        token: Address,
        spender: Address,
        amount_needed: U256,
    ) -> Result<ApprovalOutcome, AppError> {
        let owner = wallet.address();
        let current = self
            .pipeline
            .client()
            .get_allowance(owner, spender, token)
            .await
            .map_err(approval_error)?;
        if current >= amount_needed {
            tracing::debug!(
                target: "approval",
                wallet = %format!("{owner:#x}"),
                token = %format!("{token:#x}"),
                allowance = %current,
                "Allowance already sufficient"
            );
            return Ok(ApprovalOutcome::AlreadySufficient);
        }

        let amount = self.mode.allowance_for(amount_needed);
        tracing::info!(
            target: "approval",
            wallet = %format!("{owner:#x}"),
            token = %format!("{token:#x}"),
            spender = %format!("{spender:#x}"),
            mode = %self.mode,
            "Submitting approval"
        );
        let call = TxCall::contract(token, approve_calldata(spender, amount));
        let confirmation = self
            .pipeline
            .execute(wallet, call, None)
            .await
            .map_err(approval_error)?;
        tracing::info!(
            target: "approval",
            wallet = %format!("{owner:#x}"),
            tx_hash = %format!("{:#x}", confirmation.hash),
            "Approval confirmed"
        );
        Ok(ApprovalOutcome::Approved(confirmation.hash))
    }
}

/// Wallet failures become `ApprovalFailed`; skips and run-level errors keep their kind.
fn approval_error(err: AppError) -> AppError {
    match err.disposition() {
        Disposition::Fail => AppError::ApprovalFailed(err.to_string()),
        Disposition::Fatal | Disposition::Skip => err,
    }
}
