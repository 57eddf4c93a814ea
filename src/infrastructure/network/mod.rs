// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod aggregator;
pub mod chain_client;
pub mod endpoint_pool;
pub mod gas;
pub mod provider;
pub mod rpc;
