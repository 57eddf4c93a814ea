// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;

/// Local nonce counter for one wallet. Seeded once per wallet task from the
/// pending nonce and advanced only after the network acknowledged a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceSequence {
    next: u64,
    used: Vec<u64>,
}

impl NonceSequence {
    pub fn starting_at(nonce: u64) -> Self {
        Self {
            next: nonce,
            used: Vec::new(),
        }
    }

    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Marks `nonce` as consumed. Only the current head may be committed.
    pub fn commit(&mut self, nonce: u64) -> Result<(), AppError> {
        if nonce != self.next {
            return Err(AppError::Validation {
                field: "nonce".into(),
                message: format!("commit of {nonce} while the next nonce is {}", self.next),
            });
        }
        self.used.push(nonce);
        self.next = self.next.saturating_add(1);
        Ok(())
    }

    pub fn used(&self) -> &[u64] {
        &self.used
    }
}
