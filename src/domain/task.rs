// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::BPS_DENOMINATOR;
use crate::domain::error::AppError;
use alloy::primitives::{Address, B256, U256};
use std::fmt;

/// How much of a token a wallet moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSpec {
    Fixed(U256),
    /// Share of the wallet's current balance, in basis points.
    PercentBps(u32),
}

impl AmountSpec {
    pub fn percent(percent: f64) -> Result<Self, AppError> {
        if !(percent > 0.0 && percent <= 100.0) {
            return Err(AppError::Validation {
                field: "percent".into(),
                message: format!("{percent} is outside (0, 100]"),
            });
        }
        Ok(AmountSpec::PercentBps((percent * 100.0).round() as u32))
    }

    pub fn resolve(&self, balance: U256) -> U256 {
        match self {
            AmountSpec::Fixed(amount) => *amount,
            AmountSpec::PercentBps(bps) => {
                balance.saturating_mul(U256::from(*bps)) / U256::from(BPS_DENOMINATOR)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Swap {
        token_in: Address,
        token_out: Address,
        amount: AmountSpec,
    },
    /// `receivers` pairs 1-to-1 with wallets, or holds one receiver shared by all.
    Transfer {
        token: Address,
        amount: AmountSpec,
        receivers: Vec<Address>,
    },
    Balance {
        tokens: Vec<Address>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Swap { .. } => "swap",
            Operation::Transfer { .. } => "transfer",
            Operation::Balance { .. } => "balance",
        }
    }
}

/// Per wallet-operation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    ApprovalCheck,
    Quoting,
    GasSizing,
    Signing,
    Submitted,
    Confirmed,
    Failed,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Confirmed | TaskState::Failed | TaskState::Skipped
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        })
    }
}

/// One entry per wallet per operation.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub wallet: Address,
    pub operation: &'static str,
    pub status: TaskStatus,
    pub detail: String,
    pub tx_hash: Option<B256>,
    /// Approval sent ahead of a swap, when one was needed.
    pub approval_tx_hash: Option<B256>,
    /// Last non-terminal state the task was in.
    pub reached: TaskState,
    pub final_state: TaskState,
    pub error_kind: Option<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_amount_resolves_against_balance() {
        let spec = AmountSpec::percent(25.0).unwrap();
        assert_eq!(spec, AmountSpec::PercentBps(2_500));
        assert_eq!(spec.resolve(U256::from(1_000u64)), U256::from(250u64));
        assert!(AmountSpec::percent(0.0).is_err());
        assert!(AmountSpec::percent(100.5).is_err());
    }

    #[test]
    fn fixed_amount_ignores_balance() {
        let spec = AmountSpec::Fixed(U256::from(7u64));
        assert_eq!(spec.resolve(U256::ZERO), U256::from(7u64));
    }
}
