// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::Address;
use dashmap::DashMap;

use crate::domain::error::AppError;
use crate::network::chain_client::ChainClient;

/// Minimal token metadata used for decimal-aware logging and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
}

/// Per-run symbol/decimals cache, filled lazily through the chain client.
#[derive(Debug, Default)]
pub struct TokenManager {
    tokens: DashMap<Address, TokenInfo>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, token: Address) -> Option<TokenInfo> {
        self.tokens.get(&token).map(|entry| entry.clone())
    }

    pub fn insert(&self, token: Address, info: TokenInfo) {
        self.tokens.insert(token, info);
    }

    pub async fn resolve(&self, client: &ChainClient, token: Address) -> Result<TokenInfo, AppError> {
        if let Some(info) = self.cached(token) {
            return Ok(info);
        }
        let info = client.token_metadata(token).await?;
        tracing::debug!(
            target: "token_manager",
            token = %format!("{:#x}", token),
            symbol = %info.symbol,
            decimals = info.decimals,
            "Resolved token metadata"
        );
        self.tokens.insert(token, info.clone());
        Ok(info)
    }

    /// Like `resolve`, but a lookup failure degrades to a placeholder instead of
    /// failing the caller. Placeholders are not cached.
    pub async fn resolve_or_placeholder(&self, client: &ChainClient, token: Address) -> TokenInfo {
        match self.resolve(client, token).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    target: "token_manager",
                    token = %format!("{:#x}", token),
                    error = %e,
                    "Token metadata unavailable; reporting raw units"
                );
                TokenInfo {
                    symbol: format!("{:#x}", token),
                    decimals: 0,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
