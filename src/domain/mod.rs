// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod chain;
pub mod constants;
pub mod error;
pub mod nonce;
pub mod quote;
pub mod task;
pub mod transaction;
pub mod wallet;
