//! Static target discovery with health tracking.
//!
//! Targets come from configuration. A target reported unhealthy is left out of
//! sweeps until `unhealthy_backoff` has elapsed, then it is retried.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::collector::{HealthReporter, HealthState};
use crate::device::{Generation, Target};

/// Default time an unhealthy target is left out of sweeps.
pub const DEFAULT_UNHEALTHY_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct TargetHealth {
    state: HealthState,
    since: Instant,
    consecutive_failures: u64,
}

impl TargetHealth {
    fn healthy() -> Self {
        Self {
            state: HealthState::Healthy,
            since: Instant::now(),
            consecutive_failures: 0,
        }
    }
}

/// Health of one configured target, as served by `/targets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSnapshot {
    pub address: String,
    pub generation: Generation,
    pub state: HealthState,
    pub consecutive_failures: u64,
}

/// Fixed target list plus per-target health.
#[derive(Debug)]
pub struct StaticDiscovery {
    targets: Vec<Target>,
    health: Mutex<HashMap<String, TargetHealth>>,
    unhealthy_backoff: Duration,
}

impl StaticDiscovery {
    /// Track `targets`, all starting healthy. Duplicate addresses keep the first entry.
    pub fn new(targets: Vec<Target>, unhealthy_backoff: Duration) -> Self {
        let mut unique: Vec<Target> = Vec::with_capacity(targets.len());
        for target in targets {
            if unique.iter().any(|t| t.address == target.address) {
                tracing::warn!(target = %target.address, "Duplicate target ignored");
                continue;
            }
            unique.push(target);
        }

        let health = unique
            .iter()
            .map(|t| (t.address.clone(), TargetHealth::healthy()))
            .collect();

        Self {
            targets: unique,
            health: Mutex::new(health),
            unhealthy_backoff,
        }
    }

    /// All configured targets regardless of health.
    pub fn all(&self) -> &[Target] {
        &self.targets
    }

    /// Look up a configured target by address.
    pub fn find(&self, address: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.address == address)
    }

    /// Targets to poll now.
    ///
    /// Unhealthy targets whose backoff has elapsed are moved back to healthy
    /// and included.
    pub fn targets(&self) -> Vec<Target> {
        let now = Instant::now();
        let mut health = self.health.lock();

        self.targets
            .iter()
            .filter(|target| {
                let Some(entry) = health.get_mut(&target.address) else {
                    return true;
                };
                if entry.state == HealthState::Healthy {
                    return true;
                }
                if now.duration_since(entry.since) >= self.unhealthy_backoff {
                    tracing::info!(target = %target.address, failures = entry.consecutive_failures, "Retrying unhealthy target");
                    entry.state = HealthState::Healthy;
                    entry.since = now;
                    return true;
                }
                false
            })
            .cloned()
            .collect()
    }

    /// Set the health of `address`. Unknown addresses are ignored.
    pub fn mark_target(&self, address: &str, state: HealthState) {
        let mut health = self.health.lock();
        let Some(entry) = health.get_mut(address) else {
            tracing::debug!(target = %address, "Health update for unconfigured target ignored");
            return;
        };

        match state {
            HealthState::Healthy => {
                if entry.state != HealthState::Healthy {
                    tracing::info!(target = %address, "Target recovered");
                }
                entry.consecutive_failures = 0;
            }
            HealthState::Unhealthy => {
                entry.consecutive_failures += 1;
                tracing::warn!(target = %address, failures = entry.consecutive_failures, backoff = ?self.unhealthy_backoff, "Target marked unhealthy");
            }
        }
        entry.state = state;
        entry.since = Instant::now();
    }

    /// Current health of `address`.
    #[cfg(test)]
    pub(crate) fn state(&self, address: &str) -> Option<HealthState> {
        self.health.lock().get(address).map(|h| h.state)
    }

    /// Health of every configured target, in configuration order.
    pub fn snapshot(&self) -> Vec<TargetSnapshot> {
        let health = self.health.lock();
        self.targets
            .iter()
            .map(|target| {
                let entry = health
                    .get(&target.address)
                    .copied()
                    .unwrap_or_else(TargetHealth::healthy);
                TargetSnapshot {
                    address: target.address.clone(),
                    generation: target.generation,
                    state: entry.state,
                    consecutive_failures: entry.consecutive_failures,
                }
            })
            .collect()
    }
}

impl HealthReporter for StaticDiscovery {
    fn mark_unhealthy(&self, address: &str) {
        self.mark_target(address, HealthState::Unhealthy);
    }
}
