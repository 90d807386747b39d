//! Polled device identity.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Device API generation, selecting the protocol adapter.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Generation {
    /// REST API (`/settings`, `/status`, `/relay/<id>`).
    Gen1,
    /// JSON-RPC over HTTP (`/rpc/<Method>`).
    #[default]
    Gen2,
}

/// One network-addressable device.
///
/// `address` is either `host[:port]` or a full `http(s)://` base URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Device address.
    pub address: String,
    /// API generation (default: gen2).
    #[serde(default)]
    pub generation: Generation,
}

impl Target {
    /// Create a new target.
    pub fn new(address: impl Into<String>, generation: Generation) -> Self {
        Self {
            address: address.into(),
            generation,
        }
    }

    /// Base URL for requests to this device, without trailing slash.
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.address, self.generation)
    }
}
