// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::chain::{ChainTarget, GasTier};
use crate::domain::constants::{BPS_DENOMINATOR, DEFAULT_GAS_LIMIT_MARGIN_BPS};
use crate::domain::error::AppError;
use crate::domain::transaction::{FeeCaps, GasParams};
use crate::network::chain_client::ChainClient;
use crate::network::rpc::LiveFeeData;
use std::collections::HashMap;
use std::sync::Mutex;

/// Turns live fee data and a gas estimate into concrete fee caps for a tier.
///
/// The last usable fee sample per chain is kept for the run and used when the
/// network cannot provide fresh data.
#[derive(Debug)]
pub struct GasStrategy {
    margin_bps: u64,
    last_good: Mutex<HashMap<u64, LiveFeeData>>,
}

impl Default for GasStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_GAS_LIMIT_MARGIN_BPS)
    }
}

impl GasStrategy {
    pub fn new(margin_bps: u64) -> Self {
        Self {
            margin_bps,
            last_good: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches live fees through `client` and sizes the transaction.
    pub async fn params_for(
        &self,
        client: &ChainClient,
        target: &ChainTarget,
        estimated_gas: u64,
    ) -> Result<GasParams, AppError> {
        let live = client.fee_data().await;
        self.compute_gas(target, target.gas_tier, live, estimated_gas)
    }

    pub fn compute_gas(
        &self,
        target: &ChainTarget,
        tier: GasTier,
        live: Result<LiveFeeData, AppError>,
        estimated_gas: u64,
    ) -> Result<GasParams, AppError> {
        let chain_id = target.chain_id();
        let fees = match live {
            Ok(data) if usable(&data) => {
                self.remember(chain_id, data);
                data
            }
            Err(e) if e.is_fatal() => return Err(e),
            other => {
                let reason = match &other {
                    Ok(_) => "fee data had neither base fee nor gas price".to_string(),
                    Err(e) => e.to_string(),
                };
                match self.last_good(chain_id) {
                    Some(cached) => {
                        tracing::warn!(
                            target: "gas",
                            chain_id,
                            error = %reason,
                            "Live fee data unavailable; using last observed fees"
                        );
                        cached
                    }
                    None => {
                        tracing::warn!(
                            target: "gas",
                            chain_id,
                            error = %reason,
                            "No fee data for chain"
                        );
                        return Err(AppError::GasDataUnavailable { chain_id });
                    }
                }
            }
        };

        let caps = price(tier, &fees).ok_or(AppError::GasDataUnavailable { chain_id })?;
        let params = GasParams {
            fees: caps,
            gas_limit: self.gas_limit(estimated_gas),
        };
        tracing::debug!(target: "gas", chain_id, ?tier, ?params, "Gas sized");
        Ok(params)
    }

    /// Estimate plus the configured safety margin, rounded up.
    pub fn gas_limit(&self, estimated_gas: u64) -> u64 {
        let padded = (estimated_gas as u128)
            .saturating_mul((BPS_DENOMINATOR + self.margin_bps) as u128)
            .div_ceil(BPS_DENOMINATOR as u128);
        u64::try_from(padded).unwrap_or(u64::MAX)
    }

    fn remember(&self, chain_id: u64, data: LiveFeeData) {
        self.last_good
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chain_id, data);
    }

    fn last_good(&self, chain_id: u64) -> Option<LiveFeeData> {
        self.last_good
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&chain_id)
            .copied()
    }
}

fn usable(data: &LiveFeeData) -> bool {
    data.next_base_fee.is_some_and(|b| b > 0) || data.gas_price.is_some_and(|p| p > 0)
}

fn scale_bps(value: u128, bps: u64) -> u128 {
    value.saturating_mul(bps as u128) / BPS_DENOMINATOR as u128
}

/// Priority percentile index and base-fee headroom (bps) per tier.
fn tier_profile(tier: GasTier) -> (usize, u64) {
    match tier {
        GasTier::Slow => (0, 11_000),
        GasTier::Standard | GasTier::Custom { .. } => (1, 12_500),
        GasTier::Fast => (2, 15_000),
    }
}

fn legacy_multiplier_bps(tier: GasTier) -> u64 {
    match tier {
        GasTier::Slow => 10_000,
        GasTier::Standard => 11_000,
        GasTier::Fast => 12_500,
        GasTier::Custom { multiplier_bps } => multiplier_bps as u64,
    }
}

fn price(tier: GasTier, fees: &LiveFeeData) -> Option<FeeCaps> {
    if let Some(base) = fees.next_base_fee.filter(|b| *b > 0) {
        let (percentile, headroom_bps) = tier_profile(tier);
        let mut priority = fees.priority_fees[percentile];
        let mut max_fee = scale_bps(base, headroom_bps).saturating_add(priority);
        if let GasTier::Custom { multiplier_bps } = tier {
            priority = scale_bps(priority, multiplier_bps as u64);
            max_fee = scale_bps(max_fee, multiplier_bps as u64);
        }
        return Some(FeeCaps::Eip1559 {
            max_fee_per_gas: max_fee.max(priority),
            max_priority_fee_per_gas: priority,
        });
    }
    let gas_price = fees.gas_price.filter(|p| *p > 0)?;
    Some(FeeCaps::Legacy {
        gas_price: scale_bps(gas_price, legacy_multiplier_bps(tier)),
    })
}
