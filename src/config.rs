//! Configuration module for the plugscope exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Probe settings (request and scrape timeouts, cache TTL, credentials)
//! - Target list and an optional include directory of target files

mod app;
mod error;
mod targets;

pub use app::{
    AppConfig, AuthConfig, DEFAULT_CONFIG_CACHE_TTL, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SCRAPE_TIMEOUT, DEFAULT_UNHEALTHY_BACKOFF, ProbeConfig, ServerConfig,
};
pub use error::ConfigError;
pub use targets::TargetsConfig;
