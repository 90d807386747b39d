//! Request transport to devices.
//!
//! Adapters own the path templates; the transport only joins them onto the
//! target's base URL and enforces a per-request timeout.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::time::timeout;

use crate::device::Target;

/// Default per-request timeout (5 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while talking to a device.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection or protocol failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The device did not answer within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The device answered with a non-success status code.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The target address cannot form a request URL.
    #[error("invalid target address '{0}'")]
    InvalidAddress(String),
}

/// Fetches raw documents from a device.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// GET `path` (starting with `/`) from `target`.
    async fn get(&self, target: &Target, path: &str) -> Result<Vec<u8>, TransportError>;
}

/// HTTP Basic credentials sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    auth: Option<BasicAuth>,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout.
    ///
    /// # Errors
    /// Returns `TransportError::Request` if the HTTP client cannot be built.
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            timeout: request_timeout,
            auth: None,
        })
    }

    /// Send HTTP Basic credentials with every request.
    pub fn with_basic_auth(mut self, auth: BasicAuth) -> Self {
        self.auth = Some(auth);
        self
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .field("auth", &self.auth.as_ref().map(|a| &a.username))
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, target: &Target, path: &str) -> Result<Vec<u8>, TransportError> {
        let url = format!("{}{}", target.base_url(), path);
        url::Url::parse(&url).map_err(|_| TransportError::InvalidAddress(target.address.clone()))?;

        let mut request = self.client.get(&url);
        if let Some(ref auth) = self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = timeout(self.timeout, request.send())
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        tracing::trace!(url = %url, bytes = body.len(), "Fetched device document");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory transport for adapter and collector tests.

    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    /// Serves canned bodies by path and counts requests per path.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        routes: Mutex<HashMap<String, Result<String, u16>>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Answer `path` with `body`.
        pub(crate) fn route(self, path: &str, body: &str) -> Self {
            self.routes
                .lock()
                .insert(path.to_string(), Ok(body.to_string()));
            self
        }

        /// Answer `path` with an HTTP error status.
        pub(crate) fn fail(self, path: &str, status: u16) -> Self {
            self.routes.lock().insert(path.to_string(), Err(status));
            self
        }

        /// Number of requests issued for `path`.
        pub(crate) fn calls(&self, path: &str) -> usize {
            self.calls.lock().get(path).copied().unwrap_or(0)
        }

        /// Total number of requests issued.
        pub(crate) fn total_calls(&self) -> usize {
            self.calls.lock().values().sum()
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn get(&self, _target: &Target, path: &str) -> Result<Vec<u8>, TransportError> {
            *self.calls.lock().entry(path.to_string()).or_insert(0) += 1;
            match self.routes.lock().get(path) {
                Some(Ok(body)) => Ok(body.clone().into_bytes()),
                Some(Err(status)) => Err(TransportError::Status(*status)),
                None => Err(TransportError::Status(404)),
            }
        }
    }
}
