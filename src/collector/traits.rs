//! Seams between the collector and its collaborators.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Reachability of a target as tracked by discovery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HealthState {
    #[default]
    Healthy,
    Unhealthy,
}

/// Receives reachability failures from collection passes.
///
/// Fire-and-forget: the tracker owns recovery. A pass never reads health state.
pub trait HealthReporter: Send + Sync + 'static {
    /// The target at `address` could not be reached this pass.
    fn mark_unhealthy(&self, address: &str);
}
