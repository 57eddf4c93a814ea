// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::chain::Chain;
use crate::domain::task::{TaskResult, TaskStatus};
use std::sync::Mutex;
use std::time::Duration;

/// Receives one entry per wallet per operation, in completion order.
pub trait ReportSink: Send + Sync {
    fn record(&self, result: &TaskResult);
}

/// Keeps every result in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    results: Mutex<Vec<TaskResult>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<TaskResult> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.results.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportSink for CollectingSink {
    fn record(&self, result: &TaskResult) {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result.clone());
    }
}

/// Emits each result as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn record(&self, result: &TaskResult) {
        let wallet = format!("{:#x}", result.wallet);
        let tx_hash = result
            .tx_hash
            .map(|h| format!("{h:#x}"))
            .unwrap_or_default();
        let approval_tx_hash = result
            .approval_tx_hash
            .map(|h| format!("{h:#x}"))
            .unwrap_or_default();
        match result.status {
            TaskStatus::Success => tracing::info!(
                target: "report",
                wallet = %wallet,
                operation = result.operation,
                status = %result.status,
                tx_hash = %tx_hash,
                approval_tx_hash = %approval_tx_hash,
                detail = %result.detail,
                "Wallet task finished"
            ),
            TaskStatus::Skipped => tracing::warn!(
                target: "report",
                wallet = %wallet,
                operation = result.operation,
                status = %result.status,
                reached = %result.reached,
                detail = %result.detail,
                "Wallet task skipped"
            ),
            TaskStatus::Failed => tracing::error!(
                target: "report",
                wallet = %wallet,
                operation = result.operation,
                status = %result.status,
                reached = %result.reached,
                error_kind = result.error_kind.unwrap_or("unknown"),
                tx_hash = %tx_hash,
                approval_tx_hash = %approval_tx_hash,
                detail = %result.detail,
                "Wallet task failed"
            ),
        }
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub chain: Chain,
    pub operation: &'static str,
    pub results: Vec<TaskResult>,
    /// Set when a run-level failure stopped dispatch.
    pub fatal_error: Option<String>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(chain: Chain, operation: &'static str) -> Self {
        Self {
            chain,
            operation,
            results: Vec::new(),
            fatal_error: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn push(&mut self, result: TaskResult) {
        self.results.push(result);
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TaskStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TaskStatus::Skipped)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Per-wallet failures do not fail the run.
    pub fn is_success(&self) -> bool {
        self.fatal_error.is_none()
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} on {}: {} wallet(s), {} succeeded, {} failed, {} skipped in {:.1}s",
            self.operation,
            self.chain,
            self.total(),
            self.succeeded(),
            self.failed(),
            self.skipped(),
            self.elapsed.as_secs_f64()
        );
        if let Some(fatal) = &self.fatal_error {
            line.push_str(&format!(" (aborted: {fatal})"));
        }
        line
    }
}
