//! plugscope - smart plug metrics exporter
//!
//! Polls Gen1 (REST) and Gen2 (JSON-RPC) smart plugs and energy meters on
//! every scrape and exposes their state in Prometheus text format.
//!
//! # Architecture
//!
//! - **Transport**: HTTP GET with a per-request timeout and optional basic auth
//! - **Device**: per-generation protocol adapters and component discovery
//! - **Collector**: one pass per target, isolated per component
//! - **Cache**: TTL cache for device configuration documents
//! - **Discovery**: configured targets with unhealthy backoff
//! - **Server**: `/metrics`, `/probe`, `/targets` and `/healthz`
//!
//! # Example
//!
//! ```rust,no_run
//! use plugscope::config::AppConfig;
//! use plugscope::server::{AppState, create_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("configs/config.yaml")?;
//!     let app = create_router(AppState::from_config(&config)?);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:9965").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod collector;
pub mod config;
pub mod device;
pub mod discovery;
pub mod metrics;
pub mod server;
pub mod transport;

pub use cache::{CacheKey, StatusCache};
pub use collector::{HealthReporter, HealthState, MetricCollector, PassReport};
pub use device::{Generation, Target};
pub use discovery::StaticDiscovery;
pub use metrics::MetricSurface;
pub use transport::{HttpTransport, Transport, TransportError};
