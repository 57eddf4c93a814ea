// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{ENDPOINT_COOLDOWN, ENDPOINT_DEAD_AFTER, ENDPOINT_DEGRADED_AFTER};
use crate::domain::error::AppError;
use crate::network::provider::redact_url;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub id: usize,
    pub url: Url,
}

impl Endpoint {
    /// Scheme and host only; API keys in paths never reach the logs.
    pub fn redacted(&self) -> String {
        redact_url(&self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointHealth {
    Healthy,
    Degraded,
    Dead { until: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    pub degraded_after: u32,
    pub dead_after: u32,
    pub cooldown: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            degraded_after: ENDPOINT_DEGRADED_AFTER,
            dead_after: ENDPOINT_DEAD_AFTER,
            cooldown: ENDPOINT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointStatus {
    pub id: usize,
    pub url: String,
    pub health: EndpointHealth,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct Entry {
    endpoint: Endpoint,
    health: EndpointHealth,
    consecutive_failures: u32,
}

#[derive(Debug)]
struct HealthTable {
    entries: Vec<Entry>,
    cursor: usize,
}

/// Interchangeable RPC endpoints with health tracking. Entries are never removed
/// during a run; dead ones sit out a cool-down and come back as degraded.
#[derive(Debug)]
pub struct EndpointPool {
    table: Mutex<HealthTable>,
    policy: HealthPolicy,
}

impl EndpointPool {
    pub fn new(urls: Vec<Url>, policy: HealthPolicy) -> Result<Self, AppError> {
        if urls.is_empty() {
            return Err(AppError::Config("No RPC endpoints configured".into()));
        }
        if policy.degraded_after == 0 || policy.dead_after < policy.degraded_after {
            return Err(AppError::Config(format!(
                "Invalid endpoint health thresholds: degraded_after={} dead_after={}",
                policy.degraded_after, policy.dead_after
            )));
        }
        let entries = urls
            .into_iter()
            .enumerate()
            .map(|(id, url)| Entry {
                endpoint: Endpoint { id, url },
                health: EndpointHealth::Healthy,
                consecutive_failures: 0,
            })
            .collect();
        Ok(Self {
            table: Mutex::new(HealthTable { entries, cursor: 0 }),
            policy,
        })
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn acquire(&self) -> Result<Endpoint, AppError> {
        self.acquire_excluding(&[])
    }

    /// Round-robin pick that prefers endpoints not listed in `tried`.
    pub fn acquire_excluding(&self, tried: &[usize]) -> Result<Endpoint, AppError> {
        let mut table = self.lock();
        let now = Instant::now();
        self.revive_expired(&mut table, now);

        let n = table.entries.len();
        let start = table.cursor % n;
        let passes: [(bool, bool); 4] = [
            // (want_healthy, allow_tried)
            (true, false),
            (false, false),
            (true, true),
            (false, true),
        ];
        for (want_healthy, allow_tried) in passes {
            for offset in 0..n {
                let idx = (start + offset) % n;
                let entry = &table.entries[idx];
                let health_ok = match entry.health {
                    EndpointHealth::Healthy => want_healthy,
                    EndpointHealth::Degraded => !want_healthy,
                    EndpointHealth::Dead { .. } => false,
                };
                if !health_ok || (!allow_tried && tried.contains(&entry.endpoint.id)) {
                    continue;
                }
                let endpoint = entry.endpoint.clone();
                table.cursor = idx + 1;
                return Ok(endpoint);
            }
        }

        tracing::error!(target: "endpoint_pool", endpoints = n, "All RPC endpoints are dead");
        Err(AppError::NoEndpointsAvailable)
    }

    pub fn report(&self, endpoint: &Endpoint, outcome: Outcome) {
        let mut table = self.lock();
        let Some(entry) = table.entries.get_mut(endpoint.id) else {
            return;
        };
        match outcome {
            Outcome::Success => {
                if entry.health != EndpointHealth::Healthy {
                    tracing::info!(
                        target: "endpoint_pool",
                        endpoint = %endpoint.redacted(),
                        "Endpoint recovered"
                    );
                }
                entry.health = EndpointHealth::Healthy;
                entry.consecutive_failures = 0;
            }
            Outcome::Failure => {
                entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
                let failures = entry.consecutive_failures;
                if failures >= self.policy.dead_after {
                    if !matches!(entry.health, EndpointHealth::Dead { .. }) {
                        tracing::warn!(
                            target: "endpoint_pool",
                            endpoint = %endpoint.redacted(),
                            failures,
                            cooldown_secs = self.policy.cooldown.as_secs(),
                            "Endpoint marked dead"
                        );
                        entry.health = EndpointHealth::Dead {
                            until: Instant::now() + self.policy.cooldown,
                        };
                    }
                } else if failures >= self.policy.degraded_after {
                    if entry.health == EndpointHealth::Healthy {
                        tracing::warn!(
                            target: "endpoint_pool",
                            endpoint = %endpoint.redacted(),
                            failures,
                            "Endpoint degraded"
                        );
                    }
                    entry.health = EndpointHealth::Degraded;
                }
            }
        }
    }

    pub fn snapshot(&self) -> Vec<EndpointStatus> {
        let mut table = self.lock();
        self.revive_expired(&mut table, Instant::now());
        table
            .entries
            .iter()
            .map(|e| EndpointStatus {
                id: e.endpoint.id,
                url: e.endpoint.redacted(),
                health: e.health,
                consecutive_failures: e.consecutive_failures,
            })
            .collect()
    }

    fn revive_expired(&self, table: &mut HealthTable, now: Instant) {
        for entry in table.entries.iter_mut() {
            if let EndpointHealth::Dead { until } = entry.health
                && until <= now
            {
                tracing::debug!(
                    target: "endpoint_pool",
                    endpoint = %entry.endpoint.redacted(),
                    "Cool-down elapsed; endpoint eligible as degraded"
                );
                entry.health = EndpointHealth::Degraded;
                entry.consecutive_failures = self.policy.degraded_after;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HealthTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}
