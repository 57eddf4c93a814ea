// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{
    CHAIN_ARBITRUM, CHAIN_BASE, CHAIN_ETHEREUM, CHAIN_LINEA, CHAIN_OPTIMISM, CHAIN_POLYGON,
    NATIVE_SENTINEL, POLYGON_NATIVE_TOKEN,
};
use crate::domain::error::AppError;
use alloy::primitives::Address;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Chains the batcher knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Polygon,
    Base,
    Ether,
    Op,
    Arb,
    Linea,
}

impl Chain {
    pub const ALL: [Chain; 6] = [
        Chain::Polygon,
        Chain::Base,
        Chain::Ether,
        Chain::Op,
        Chain::Arb,
        Chain::Linea,
    ];

    pub fn chain_id(self) -> u64 {
        match self {
            Chain::Polygon => CHAIN_POLYGON,
            Chain::Base => CHAIN_BASE,
            Chain::Ether => CHAIN_ETHEREUM,
            Chain::Op => CHAIN_OPTIMISM,
            Chain::Arb => CHAIN_ARBITRUM,
            Chain::Linea => CHAIN_LINEA,
        }
    }

    /// Path segment used by the aggregator API.
    pub fn aggregator_slug(self) -> &'static str {
        match self {
            Chain::Polygon => "polygon",
            Chain::Base => "base",
            Chain::Ether => "ethereum",
            Chain::Op => "optimism",
            Chain::Arb => "arbitrum",
            Chain::Linea => "linea",
        }
    }

    /// Host of the keyed provider URL template (`https://<host>/v2/<key>`).
    pub fn provider_host(self) -> &'static str {
        match self {
            Chain::Polygon => "polygon-mainnet.g.alchemy.com",
            Chain::Base => "base-mainnet.g.alchemy.com",
            Chain::Ether => "eth-mainnet.g.alchemy.com",
            Chain::Op => "opt-mainnet.g.alchemy.com",
            Chain::Arb => "arb-mainnet.g.alchemy.com",
            Chain::Linea => "linea-mainnet.g.alchemy.com",
        }
    }

    pub fn native_token(self) -> Address {
        match self {
            Chain::Polygon => POLYGON_NATIVE_TOKEN,
            _ => NATIVE_SENTINEL,
        }
    }

    pub fn native_symbol(self) -> &'static str {
        match self {
            Chain::Polygon => "POL",
            _ => "ETH",
        }
    }

    pub fn is_native(self, token: Address) -> bool {
        token == NATIVE_SENTINEL || token == self.native_token()
    }

    pub fn keyed_provider_url(self, api_key: &str) -> Result<Url, AppError> {
        let raw = format!("https://{}/v2/{}", self.provider_host(), api_key.trim());
        Url::parse(&raw).map_err(|e| AppError::Config(format!("Invalid keyed RPC URL: {e}")))
    }
}

impl FromStr for Chain {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POLYGON" | "MATIC" => Ok(Chain::Polygon),
            "BASE" => Ok(Chain::Base),
            "ETHER" | "ETHEREUM" | "MAINNET" => Ok(Chain::Ether),
            "OP" | "OPTIMISM" => Ok(Chain::Op),
            "ARB" | "ARBITRUM" => Ok(Chain::Arb),
            "LINEA" => Ok(Chain::Linea),
            other => Err(AppError::Config(format!(
                "Unknown chain '{other}' (expected one of POLYGON, BASE, ETHER, OP, ARB, LINEA)"
            ))),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Chain::Polygon => "POLYGON",
            Chain::Base => "BASE",
            Chain::Ether => "ETHER",
            Chain::Op => "OP",
            Chain::Arb => "ARB",
            Chain::Linea => "LINEA",
        };
        f.write_str(name)
    }
}

/// Fee aggressiveness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GasTier {
    Slow,
    #[default]
    Standard,
    Fast,
    /// Standard fees scaled by `multiplier_bps / 10_000`.
    Custom { multiplier_bps: u32 },
}

impl FromStr for GasTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if let Some(raw) = normalized.strip_prefix("custom:") {
            let multiplier_bps: u32 = raw.trim().parse().map_err(|_| {
                AppError::Config(format!("Invalid custom gas multiplier '{raw}' (bps)"))
            })?;
            if !(1_000..=100_000).contains(&multiplier_bps) {
                return Err(AppError::Config(format!(
                    "Custom gas multiplier {multiplier_bps} bps out of range 1000..=100000"
                )));
            }
            return Ok(GasTier::Custom { multiplier_bps });
        }
        match normalized.as_str() {
            "slow" | "low" => Ok(GasTier::Slow),
            "standard" | "medium" => Ok(GasTier::Standard),
            "fast" | "high" => Ok(GasTier::Fast),
            other => Err(AppError::Config(format!(
                "Unknown gas tier '{other}' (expected slow, standard, fast or custom:<bps>)"
            ))),
        }
    }
}

/// Everything about the target network that stays fixed for a run.
#[derive(Debug, Clone)]
pub struct ChainTarget {
    pub chain: Chain,
    pub endpoints: Vec<Url>,
    pub gas_tier: GasTier,
}

impl ChainTarget {
    pub fn new(chain: Chain, endpoints: Vec<Url>, gas_tier: GasTier) -> Self {
        Self {
            chain,
            endpoints,
            gas_tier,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain.chain_id()
    }

    pub fn is_native(&self, token: Address) -> bool {
        self.chain.is_native(token)
    }
}
