//! Rate-limited, retrying outbound HTTP client.
//!
//! # Request Path
//! ```text
//! request(method, url, options)
//!     → build URL (+ query)
//!     → security::rate_limit (admit, release armed for +period)
//!     → resilience::retry {
//!           resilience::timeouts (per-attempt deadline)
//!           → Transport::send
//!       }
//!     → status >= 400 → UpstreamStatus (not retried)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::config::{HttpClientConfig, RetryConfig};
use crate::http::transport::{OutboundRequest, OutboundResponse, ReqwestTransport, Transport, TransportError};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::{retry, RetryError, RetryPolicy};
use crate::security::rate_limit::AdmissionGate;

/// Errors surfaced by [`HttpClient::request`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The downstream answered with a 4xx/5xx status.
    #[error("upstream responded with status {status}")]
    UpstreamStatus { status: StatusCode, body: String },

    /// Every attempt failed at the transport layer.
    #[error("transport failed after {attempts} attempt(s): {source}")]
    TransportExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("http client is closed")]
    Closed,
}

/// Optional parts of an outbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Overrides the client default for this request.
    pub timeout: Option<Duration>,
}

/// Outbound HTTP client with an admission gate, retries and timeouts.
#[derive(Debug)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    gate: AdmissionGate,
    retry: RetryPolicy,
    default_timeout: Duration,
}

impl HttpClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        gate: AdmissionGate,
        retry: RetryPolicy,
        default_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            gate,
            retry,
            default_timeout,
        }
    }

    /// Build a client over the reqwest transport from configuration.
    pub fn from_config(client: &HttpClientConfig, retries: &RetryConfig) -> Self {
        Self::new(
            Arc::new(ReqwestTransport::new()),
            AdmissionGate::new(client.rate_limit, client.rate_period()),
            RetryPolicy::from(retries),
            client.timeout(),
        )
    }

    /// Execute a request with admission control, retry and timeout.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<OutboundResponse, ClientError> {
        let mut target = Url::parse(url).map_err(|e| ClientError::InvalidRequest(format!("{url}: {e}")))?;
        if !options.query.is_empty() {
            target.query_pairs_mut().extend_pairs(options.query.iter());
        }

        self.gate.admit().await.map_err(|_| ClientError::Closed)?;

        let outbound = OutboundRequest {
            method: method.clone(),
            url: target,
            headers: options.headers,
            body: options.body,
            timeout: options.timeout.unwrap_or(self.default_timeout),
        };
        let limit = outbound.timeout;
        let start = Instant::now();

        tracing::debug!(method = %method, url = %outbound.url, "Sending upstream request");

        let result = retry(&self.retry, |_attempt| {
            let attempt_request = outbound.clone();
            with_deadline(limit, self.transport.send(attempt_request), TransportError::Timeout)
        })
        .await;

        let response = match result {
            Ok(response) => response,
            Err(RetryError::Exhausted { attempts, last }) => {
                metrics::record_upstream_request(method.as_str(), 0, start);
                tracing::error!(method = %method, url = %outbound.url, attempts, error = %last, "Upstream unreachable");
                return Err(ClientError::TransportExhausted { attempts, source: last });
            }
            Err(RetryError::Aborted { error, .. }) => {
                metrics::record_upstream_request(method.as_str(), 0, start);
                return Err(ClientError::InvalidRequest(error.to_string()));
            }
        };

        metrics::record_upstream_request(method.as_str(), response.status.as_u16(), start);

        if response.status.is_client_error() || response.status.is_server_error() {
            tracing::warn!(method = %method, url = %outbound.url, status = %response.status, "Upstream returned error status");
            return Err(ClientError::UpstreamStatus {
                status: response.status,
                body: response.text(),
            });
        }

        Ok(response)
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<OutboundResponse, ClientError> {
        self.request(Method::GET, url, options).await
    }

    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<OutboundResponse, ClientError> {
        self.request(Method::POST, url, options).await
    }

    /// Stop admitting requests. Waiting callers get [`ClientError::Closed`].
    pub fn close(&self) {
        self.gate.close();
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}
