// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No RPC endpoints available (all endpoints are dead)")]
    NoEndpointsAvailable,

    #[error("Transient RPC failure during {operation} after {attempts} attempt(s): {reason}")]
    TransientRpc {
        operation: &'static str,
        attempts: usize,
        reason: String,
    },

    #[error("Chain rejected {operation}: {reason}")]
    Chain {
        operation: &'static str,
        reason: String,
    },

    #[error("Quote expired {age_ms}ms after quoting; re-quote required")]
    QuoteExpired { age_ms: u128 },

    #[error("No route: {0}")]
    NoRoute(String),

    #[error("Quote service unavailable: {0}")]
    QuoteServiceUnavailable(String),

    #[error("Approval failed: {0}")]
    ApprovalFailed(String),

    #[error("Gas data unavailable for chain {chain_id}")]
    GasDataUnavailable { chain_id: u64 },

    #[error(
        "Submission of {hash:#x} unconfirmed: {reason}; do not resend with the same nonce, check the tx manually"
    )]
    SubmissionUnconfirmed { hash: B256, reason: String },

    #[error("Transaction {hash:#x} reverted on-chain (block {block:?})")]
    Reverted { hash: B256, block: Option<u64> },

    #[error(
        "No receipt for {hash:#x} after {waited_secs}s; accepted tx is not resubmitted, check it manually"
    )]
    ConfirmationTimeout { hash: B256, waited_secs: u64 },

    #[error("Insufficient funds. Required: {required}, Available: {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Dry-run: {0}")]
    DryRun(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Address {0} is invalid or not checksummed")]
    InvalidAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

/// How the wallet-task boundary treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Abort the whole run.
    Fatal,
    /// Record the wallet task as failed; siblings continue.
    Fail,
    /// Record the wallet task as skipped, unless it already submitted a
    /// transaction, in which case it is failed.
    Skip,
}

impl AppError {
    pub fn disposition(&self) -> Disposition {
        match self {
            AppError::Config(_) | AppError::NoEndpointsAvailable => Disposition::Fatal,
            AppError::GasDataUnavailable { .. }
            | AppError::InsufficientFunds { .. }
            | AppError::DryRun(_) => Disposition::Skip,
            _ => Disposition::Fail,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.disposition() == Disposition::Fatal
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::TransientRpc { .. } | AppError::QuoteServiceUnavailable(_)
        )
    }

    /// Stable short name recorded in task results.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "ConfigurationError",
            AppError::NoEndpointsAvailable => "NoEndpointsAvailable",
            AppError::TransientRpc { .. } => "TransientRpcFailure",
            AppError::Chain { .. } => "ChainError",
            AppError::QuoteExpired { .. } => "QuoteExpired",
            AppError::NoRoute(_) => "NoRoute",
            AppError::QuoteServiceUnavailable(_) => "QuoteServiceUnavailable",
            AppError::ApprovalFailed(_) => "ApprovalFailed",
            AppError::GasDataUnavailable { .. } => "GasDataUnavailable",
            AppError::SubmissionUnconfirmed { .. } => "SubmissionUnconfirmed",
            AppError::Reverted { .. } => "Reverted",
            AppError::ConfirmationTimeout { .. } => "ConfirmationTimeout",
            AppError::InsufficientFunds { .. } => "InsufficientFunds",
            AppError::DryRun(_) => "DryRun",
            AppError::Signing(_) => "SigningError",
            AppError::Validation { .. } => "ValidationError",
            AppError::InvalidAddress(_) => "InvalidAddress",
            AppError::Io(_) => "IoError",
            AppError::Unknown(_) => "Unknown",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
