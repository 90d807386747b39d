//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The main file or a target file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The main file is not a valid configuration document.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid server bind address: '{0}'")]
    BindAddress(String),

    #[error("server port must be non-zero")]
    ZeroPort,

    /// A probe duration that must be positive is zero.
    #[error("probe {0} must be non-zero")]
    ZeroDuration(&'static str),

    #[error("probe auth username cannot be empty")]
    EmptyUsername,

    #[error("target address cannot be empty")]
    EmptyAddress,

    #[error("duplicate target address: '{0}'")]
    DuplicateTarget(String),

    /// The address does not form a usable device URL.
    #[error("target '{address}': {reason}")]
    InvalidTarget { address: String, reason: String },

    /// `target_path` does not name a readable directory.
    #[error("target_path '{}' {reason}", .path.display())]
    TargetPath { path: PathBuf, reason: &'static str },

    /// A file under `target_path` is not a target list.
    #[error("failed to parse '{}': {source}", .path.display())]
    TargetFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
