//! Collector Layer
//!
//! Turns one scrape of one target into metric samples.
//!
//! # Architecture
//!
//! - [`MetricCollector`]: per-target pass (config, system, wifi, then each component)
//! - [`HealthReporter`]: reachability failures go to the discovery collaborator
//! - [`PassReport`]: what a pass managed to collect
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use plugscope::cache::StatusCache;
//! use plugscope::collector::MetricCollector;
//! use plugscope::device::{AdapterSet, Generation, Target};
//! use plugscope::discovery::StaticDiscovery;
//! use plugscope::metrics::MetricSurface;
//! use plugscope::transport::HttpTransport;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new(Duration::from_secs(5))?);
//! let discovery = Arc::new(StaticDiscovery::new(vec![], Duration::from_secs(60)));
//! let collector = MetricCollector::new(
//!     AdapterSet::new(transport),
//!     Arc::new(StatusCache::new()),
//!     discovery,
//! );
//!
//! let registry = prometheus::Registry::new();
//! let surface = MetricSurface::register(&registry)?;
//! let report = collector
//!     .collect(&Target::new("192.168.1.20", Generation::Gen2), &surface)
//!     .await;
//! println!("collected {} components", report.collected);
//! # Ok(())
//! # }
//! ```

mod pass;
mod traits;

pub use pass::{DEFAULT_CONFIG_TTL, MetricCollector, PassReport};
pub use traits::{HealthReporter, HealthState};
