//! Target list configuration.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::Target;

use super::error::ConfigError;

/// Target list, as found at the top level of the main file or in include files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Devices to poll.
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl TargetsConfig {
    /// Merge another TargetsConfig into this one.
    #[must_use]
    pub fn merge(mut self, other: TargetsConfig) -> Self {
        self.targets.extend(other.targets);
        self
    }

    /// Validate all targets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for target in &self.targets {
            if target.address.trim().is_empty() {
                return Err(ConfigError::EmptyAddress);
            }
            if !seen.insert(&target.address) {
                return Err(ConfigError::DuplicateTarget(target.address.clone()));
            }

            let url = url::Url::parse(&target.base_url()).map_err(|e| {
                ConfigError::InvalidTarget {
                    address: target.address.clone(),
                    reason: format!("invalid address: {e}"),
                }
            })?;
            if url.host_str().is_none() {
                return Err(ConfigError::InvalidTarget {
                    address: target.address.clone(),
                    reason: "address has no host".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Load target lists from all YAML files in a directory.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(ConfigError::TargetPath {
                path: dir.to_path_buf(),
                reason: "does not exist",
            });
        }
        if !dir.is_dir() {
            return Err(ConfigError::TargetPath {
                path: dir.to_path_buf(),
                reason: "is not a directory",
            });
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext == "yaml" || ext == "yml" {
                paths.push(path);
            }
        }
        // read_dir order is platform dependent
        paths.sort();

        let mut merged = Self::default();
        for path in paths {
            tracing::debug!(path = %path.display(), "Loading target config");
            let content = std::fs::read_to_string(&path)?;
            let file_config: Self = serde_yaml::from_str(&content)
                .map_err(|source| ConfigError::TargetFile { path: path.clone(), source })?;
            merged = merged.merge(file_config);
        }

        Ok(merged)
    }
}
