// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::{AppError, Disposition};
use crate::domain::task::{TaskResult, TaskState, TaskStatus};
use alloy::primitives::{Address, B256};

/// Allowed moves of the per wallet-operation state machine.
pub fn can_transition(from: TaskState, to: TaskState) -> bool {
    use TaskState::*;
    match (from, to) {
        (from, _) if from.is_terminal() => false,
        (_, Failed) => true,
        (Submitted, Confirmed) => true,
        // Once accepted by the network a task can only confirm or fail.
        (Submitted, _) => false,
        (_, Skipped) => true,
        (Pending, ApprovalCheck | Quoting | GasSizing | Confirmed) => true,
        (ApprovalCheck, Quoting) => true,
        (Quoting, GasSizing) => true,
        (GasSizing, Signing) => true,
        (Signing, Submitted | Quoting) => true,
        _ => false,
    }
}

/// Tracks one wallet task through its states and produces its [`TaskResult`].
#[derive(Debug)]
pub struct TaskTracker {
    wallet: Address,
    operation: &'static str,
    state: TaskState,
    trail: Vec<TaskState>,
    tx_hash: Option<B256>,
    approval_tx_hash: Option<B256>,
}

impl TaskTracker {
    pub fn new(wallet: Address, operation: &'static str) -> Self {
        Self {
            wallet,
            operation,
            state: TaskState::Pending,
            trail: vec![TaskState::Pending],
            tx_hash: None,
            approval_tx_hash: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn trail(&self) -> &[TaskState] {
        &self.trail
    }

    /// Moves to `next`. Re-entering the current state is a no-op.
    pub fn advance(&mut self, next: TaskState) -> Result<(), AppError> {
        if next == self.state {
            return Ok(());
        }
        if !can_transition(self.state, next) {
            return Err(AppError::Validation {
                field: "task_state".into(),
                message: format!("illegal transition {} -> {next}", self.state),
            });
        }
        tracing::debug!(
            target: "orchestrator",
            wallet = %format!("{:#x}", self.wallet),
            operation = self.operation,
            from = %self.state,
            to = %next,
            "Task state"
        );
        self.state = next;
        self.trail.push(next);
        Ok(())
    }

    /// Hash of the transaction the network accepted for this task.
    pub fn set_tx_hash(&mut self, hash: B256) {
        self.tx_hash = Some(hash);
    }

    /// Hash of an approval sent on the task's behalf before the main transaction.
    pub fn set_approval_hash(&mut self, hash: B256) {
        self.approval_tx_hash = Some(hash);
    }

    /// True once any transaction of this task reached the network.
    pub fn has_submitted(&self) -> bool {
        self.tx_hash.is_some()
            || self.approval_tx_hash.is_some()
            || self.trail.contains(&TaskState::Submitted)
    }

    pub fn succeed(self, detail: String, tx_hash: Option<B256>) -> TaskResult {
        let tx_hash = tx_hash.or(self.tx_hash);
        self.finish(TaskState::Confirmed, detail, tx_hash, None)
    }

    pub fn skip(self, reason: impl Into<String>) -> TaskResult {
        let tx_hash = self.tx_hash;
        self.finish(TaskState::Skipped, reason.into(), tx_hash, None)
    }

    /// Records `err` as a skip or a failure depending on its disposition and on
    /// whether anything was already submitted. A skip is only a skip while the
    /// task has written nothing on chain.
    pub fn fail(self, err: &AppError) -> TaskResult {
        let terminal = match err.disposition() {
            Disposition::Skip
                if !self.has_submitted() && can_transition(self.state, TaskState::Skipped) =>
            {
                TaskState::Skipped
            }
            _ => TaskState::Failed,
        };
        let tx_hash = self.tx_hash.or(match err {
            AppError::SubmissionUnconfirmed { hash, .. }
            | AppError::Reverted { hash, .. }
            | AppError::ConfirmationTimeout { hash, .. } => Some(*hash),
            _ => None,
        });
        let detail = err.to_string();
        self.finish(terminal, detail, tx_hash, Some(err.kind()))
    }

    fn finish(
        mut self,
        terminal: TaskState,
        detail: String,
        tx_hash: Option<B256>,
        error_kind: Option<&'static str>,
    ) -> TaskResult {
        let reached = self.state;
        if !can_transition(reached, terminal) {
            tracing::error!(
                target: "orchestrator",
                wallet = %format!("{:#x}", self.wallet),
                from = %reached,
                to = %terminal,
                "Forcing illegal terminal transition"
            );
        }
        self.state = terminal;
        self.trail.push(terminal);
        TaskResult {
            wallet: self.wallet,
            operation: self.operation,
            status: match terminal {
                TaskState::Confirmed => TaskStatus::Success,
                TaskState::Skipped => TaskStatus::Skipped,
                _ => TaskStatus::Failed,
            },
            detail,
            tx_hash,
            approval_tx_hash: self.approval_tx_hash,
            reached,
            final_state: terminal,
            error_kind,
        }
    }
}
