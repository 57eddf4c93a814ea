// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::BPS_DENOMINATOR;
use crate::domain::error::AppError;
use alloy::primitives::{Address, Bytes, U256};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub slippage_bps: u32,
}

/// Route returned by the aggregator for one wallet attempt. Never shared across wallets.
#[derive(Debug, Clone)]
pub struct Quote {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub slippage_bps: u32,
    pub router: Address,
    /// Opaque route payload echoed back to the build endpoint.
    pub route: serde_json::Value,
    pub quoted_at: Instant,
    pub expires_at: Instant,
}

impl Quote {
    pub fn new(
        request: &QuoteRequest,
        amount_out: U256,
        router: Address,
        route: serde_json::Value,
        ttl: Duration,
    ) -> Self {
        let quoted_at = Instant::now();
        Self {
            token_in: request.token_in,
            token_out: request.token_out,
            amount_in: request.amount_in,
            amount_out,
            slippage_bps: request.slippage_bps,
            router,
            route,
            quoted_at,
            expires_at: quoted_at + ttl,
        }
    }

    pub fn age(&self) -> Duration {
        self.quoted_at.elapsed()
    }

    pub fn is_stale(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn ensure_fresh(&self) -> Result<(), AppError> {
        if self.is_stale() {
            return Err(AppError::QuoteExpired {
                age_ms: self.age().as_millis(),
            });
        }
        Ok(())
    }

    /// Expected output reduced by the slippage tolerance.
    pub fn min_amount_out(&self) -> U256 {
        let keep = BPS_DENOMINATOR.saturating_sub(self.slippage_bps as u64);
        self.amount_out.saturating_mul(U256::from(keep)) / U256::from(BPS_DENOMINATOR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCallData {
    pub router: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_hint: Option<u64>,
    pub amount_out: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> QuoteRequest {
        QuoteRequest {
            token_in: Address::repeat_byte(1),
            token_out: Address::repeat_byte(2),
            amount_in: U256::from(1_000u64),
            slippage_bps: 50,
        }
    }

    #[test]
    fn min_amount_out_applies_slippage() {
        let quote = Quote::new(
            &request(),
            U256::from(10_000u64),
            Address::ZERO,
            serde_json::Value::Null,
            Duration::from_secs(30),
        );
        assert_eq!(quote.min_amount_out(), U256::from(9_950u64));
        assert!(quote.ensure_fresh().is_ok());
    }

    #[test]
    fn zero_ttl_quote_is_expired() {
        let quote = Quote::new(
            &request(),
            U256::from(1u64),
            Address::ZERO,
            serde_json::Value::Null,
            Duration::ZERO,
        );
        assert!(matches!(
            quote.ensure_fresh(),
            Err(AppError::QuoteExpired { .. })
        ));
    }
}
