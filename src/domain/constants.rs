// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, address};
use std::time::Duration;

// =============================================================================
// ASSETS & CONTRACTS
// =============================================================================

/// Aggregator-style native coin placeholder.
pub const NATIVE_SENTINEL: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");
/// Polygon exposes its native coin through this system contract address.
pub const POLYGON_NATIVE_TOKEN: Address = address!("0000000000000000000000000000000000001010");

/// Multicall3, deployed at the same address on every supported chain.
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// KyberSwap meta-aggregation router (same address on every supported chain).
pub const KYBERSWAP_ROUTER: Address = address!("6131B5fae19EA4f9D964eAc0408E4408b66337b5");
pub const KYBERSWAP_API_BASE: &str = "https://aggregator-api.kyberswap.com";
pub const DEFAULT_AGGREGATOR_CLIENT_ID: &str = "oxidity-batcher";

// =============================================================================
// CHAIN IDS
// =============================================================================

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_OPTIMISM: u64 = 10;
pub const CHAIN_POLYGON: u64 = 137;
pub const CHAIN_BASE: u64 = 8453;
pub const CHAIN_ARBITRUM: u64 = 42161;
pub const CHAIN_LINEA: u64 = 59144;

// =============================================================================
// GAS
// =============================================================================

pub const NATIVE_TRANSFER_GAS: u64 = 21_000;
/// Safety margin added on top of `eth_estimateGas` (20%).
pub const DEFAULT_GAS_LIMIT_MARGIN_BPS: u64 = 2_000;
/// Used when a node zeroes out the next base fee.
pub const BASE_FEE_BUMP_PER_MILLE: u128 = 1_125;
pub const DEFAULT_PRIORITY_FEE_WEI: u128 = 1_500_000_000;
pub const FEE_HISTORY_BLOCKS: u64 = 5;
pub const FEE_HISTORY_PERCENTILES: [f64; 3] = [10.0, 50.0, 90.0];

// =============================================================================
// ENDPOINT HEALTH & RETRY POLICY
// =============================================================================

pub const ENDPOINT_DEGRADED_AFTER: u32 = 2;
pub const ENDPOINT_DEAD_AFTER: u32 = 5;
pub const ENDPOINT_COOLDOWN: Duration = Duration::from_secs(30);

pub const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(8);
pub const RPC_MAX_ATTEMPTS: usize = 3;
pub const RPC_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(100);
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(4);

pub const QUOTE_MAX_ATTEMPTS: usize = 3;
pub const QUOTE_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(250);
pub const QUOTE_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const QUOTE_STALENESS: Duration = Duration::from_secs(30);
pub const MAX_REQUOTES: u32 = 1;
/// Swap deadline passed to the aggregator build endpoint.
pub const SWAP_DEADLINE_SECS: u64 = 1_200;

// =============================================================================
// CONFIRMATION
// =============================================================================

pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);
/// Extra full-length waits granted to an accepted tx before giving up on it.
pub const CONFIRMATION_EXTENSIONS: u32 = 1;

pub const MAX_SLIPPAGE_BPS: u32 = 5_000;
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;
pub const BPS_DENOMINATOR: u64 = 10_000;
