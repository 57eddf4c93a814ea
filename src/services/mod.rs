// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod approval;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
