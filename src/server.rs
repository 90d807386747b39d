//! Web server module for plugscope.
//!
//! Every scrape polls devices live into a fresh registry, so a series that
//! could not be collected is absent instead of stale.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use futures::future::join_all;
use prometheus::Registry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::cache::StatusCache;
use crate::collector::{HealthState, MetricCollector};
use crate::config::AppConfig;
use crate::device::{AdapterSet, DeviceConfig, Generation, Target};
use crate::discovery::StaticDiscovery;
use crate::metrics::{self, MetricSurface};
use crate::transport::{HttpTransport, Transport, TransportError};

const INDEX_HTML: &str = r#"<html>
<head><title>plugscope</title></head>
<body>
<h1>plugscope</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/targets">Targets</a></p>
<p>Probe a single device: <code>/probe?target=192.168.1.20&amp;generation=gen2</code></p>
</body>
</html>"#;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The probe request is missing or has invalid parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Metric registration or encoding failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Scrape failed");
        }
        (status, self.to_string()).into_response()
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<MetricCollector>,
    pub discovery: Arc<StaticDiscovery>,
    pub cache: Arc<StatusCache<DeviceConfig>>,
    /// Upper bound of one target pass.
    pub scrape_timeout: Duration,
}

impl AppState {
    /// Wire the collector, cache and discovery over `transport`.
    pub fn new(
        transport: Arc<dyn Transport>,
        targets: Vec<Target>,
        config_cache_ttl: Duration,
        unhealthy_backoff: Duration,
        scrape_timeout: Duration,
    ) -> Self {
        let cache = Arc::new(StatusCache::new());
        let discovery = Arc::new(StaticDiscovery::new(targets, unhealthy_backoff));
        let collector = MetricCollector::new(
            AdapterSet::new(transport),
            cache.clone(),
            discovery.clone(),
        )
        .with_config_ttl(config_cache_ttl);

        Self {
            collector: Arc::new(collector),
            discovery,
            cache,
            scrape_timeout,
        }
    }

    /// Build the state from application configuration using an HTTP transport.
    ///
    /// # Errors
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, TransportError> {
        let mut transport = HttpTransport::new(config.probe.timeout)?;
        if let Some(auth) = config.probe.auth.clone() {
            transport = transport.with_basic_auth(auth.into());
        }

        Ok(Self::new(
            Arc::new(transport),
            config.targets.targets.clone(),
            config.probe.config_cache_ttl,
            config.probe.unhealthy_backoff,
            config.probe.scrape_timeout,
        ))
    }

    /// Run one pass per target concurrently and encode the result.
    ///
    /// # Errors
    /// Returns `ServerError::Metrics` if the registry cannot be built or encoded.
    pub async fn scrape(&self, targets: &[Target]) -> Result<String, ServerError> {
        let registry = Registry::new();
        let surface = MetricSurface::register(&registry)?;

        join_all(targets.iter().map(|target| self.run_pass(target, &surface))).await;

        Ok(metrics::encode(&registry)?)
    }

    async fn run_pass(&self, target: &Target, surface: &MetricSurface) {
        let pass = self.collector.collect(target, surface);
        match tokio::time::timeout(self.scrape_timeout, pass).await {
            Ok(report) => {
                if report.reachable {
                    self.discovery
                        .mark_target(&target.address, HealthState::Healthy);
                }
                tracing::debug!(
                    target = %target.address,
                    discovered = report.discovered,
                    collected = report.collected,
                    failed = report.failed,
                    "Pass complete"
                );
            }
            Err(_) => {
                tracing::warn!(target = %target.address, timeout = ?self.scrape_timeout, "Pass timed out, exposing partial results");
            }
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("targets", &self.discovery.all().len())
            .field("scrape_timeout", &self.scrape_timeout)
            .finish_non_exhaustive()
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Query parameters for the probe endpoint.
#[derive(Debug, Deserialize)]
pub struct ProbeParams {
    pub target: Option<String>,
    pub generation: Option<String>,
}

impl ProbeParams {
    /// Resolve the requested target.
    ///
    /// An explicit generation wins; otherwise a configured target keeps its
    /// generation and unknown addresses default to gen2.
    fn resolve(self, discovery: &StaticDiscovery) -> Result<Target, ServerError> {
        let address = self
            .target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServerError::BadRequest("missing 'target' parameter".to_string()))?;

        let generation = match self.generation.as_deref().filter(|g| !g.is_empty()) {
            Some(g) => Generation::from_str(g).map_err(|_| {
                ServerError::BadRequest(format!("invalid generation '{g}', expected gen1 or gen2"))
            })?,
            None => discovery
                .find(&address)
                .map(|t| t.generation)
                .unwrap_or_default(),
        };

        let target = Target::new(address, generation);
        let url = url::Url::parse(&target.base_url())
            .map_err(|e| ServerError::BadRequest(format!("invalid target '{}': {e}", target.address)))?;
        if url.host_str().is_none() {
            return Err(ServerError::BadRequest(format!(
                "invalid target '{}': no host",
                target.address
            )));
        }
        Ok(target)
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .route("/probe", get(probe_handler))
        .route("/targets", get(targets_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

fn exposition(body: String) -> Response {
    ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response()
}

/// Scrape all currently healthy targets.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<Response, ServerError> {
    let targets = state.discovery.targets();
    tracing::debug!(targets = targets.len(), "Scraping configured targets");
    let body = state.scrape(&targets).await?;
    Ok(exposition(body))
}

/// Scrape one target given as query parameter.
async fn probe_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProbeParams>,
) -> Result<Response, ServerError> {
    let target = params.resolve(&state.discovery)?;
    let body = state.scrape(std::slice::from_ref(&target)).await?;
    Ok(exposition(body))
}

/// Health of configured targets.
async fn targets_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.discovery.snapshot()).into_response()
}
