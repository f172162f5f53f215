// crates/weft-transport/src/http.rs
// ============================================================================
// Module: HTTP Concept Transport
// Description: Transport for concepts served over HTTP endpoints.
// Purpose: Dispatch invocations and queries with strict limits.
// Dependencies: weft-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! The HTTP transport reaches a remote concept host over three endpoints
//! under one base URL: `POST invoke`, `POST query`, and `GET health`. It
//! enforces scheme restrictions, a request timeout, and a response size cap,
//! and fails closed on anything it cannot validate. Health probes never
//! error; an unreachable host reports unavailable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;
use weft_core::ActionRecord;
use weft_core::ConceptTransport;
use weft_core::Fields;
use weft_core::HealthStatus;
use weft_core::QueryRequest;
use weft_core::TransportError;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP transport.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` base URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Base URL of the concept host.
    pub base_url: String,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl HttpTransportConfig {
    /// Creates a config for a base URL with the default limits.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            allow_http: false,
            timeout_ms: 5_000,
            max_response_bytes: 1024 * 1024,
            user_agent: "weft/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Transport Implementation
// ============================================================================

/// Transport for a concept served over HTTP.
///
/// # Invariants
/// - The base URL is validated at construction.
/// - Responses exceeding configured limits fail closed.
pub struct HttpTransport {
    /// Validated base URL.
    base: Url,
    /// Transport configuration, including limits.
    config: HttpTransportConfig,
    /// HTTP client used for outbound requests.
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport after validating the base URL and scheme.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the URL is invalid, the scheme is
    /// not permitted, or the client cannot be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let base = Url::parse(&config.base_url)
            .map_err(|err| TransportError::Unavailable(format!("invalid base url: {err}")))?;
        match base.scheme() {
            "https" => {}
            "http" if config.allow_http => {}
            scheme => {
                return Err(TransportError::Unavailable(format!(
                    "scheme not permitted: {scheme}"
                )));
            }
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;
        Ok(Self {
            base,
            config,
            client,
        })
    }

    /// Joins an endpoint path onto the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|err| TransportError::Unavailable(format!("invalid endpoint: {err}")))
    }

    /// Reads a JSON response body under the configured size cap.
    async fn read_json(&self, response: reqwest::Response) -> Result<Value, TransportError> {
        let cap = u64::try_from(self.config.max_response_bytes).unwrap_or(u64::MAX);
        if let Some(length) = response.content_length()
            && length > cap
        {
            return Err(TransportError::Query(format!("response too large: {length} bytes")));
        }
        let bytes =
            response.bytes().await.map_err(|err| TransportError::Query(err.to_string()))?;
        if bytes.len() > self.config.max_response_bytes {
            return Err(TransportError::Query(format!(
                "response too large: {} bytes",
                bytes.len()
            )));
        }
        serde_json::from_slice(&bytes).map_err(|err| TransportError::Query(err.to_string()))
    }
}

#[async_trait]
impl ConceptTransport for HttpTransport {
    async fn invoke(&self, invocation: &ActionRecord) -> Result<ActionRecord, TransportError> {
        let endpoint = self.endpoint("invoke")?;
        let response = self
            .client
            .post(endpoint)
            .json(invocation)
            .send()
            .await
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Invoke(format!("status {}", response.status())));
        }
        let body = self.read_json(response).await.map_err(|err| match err {
            TransportError::Query(message) => TransportError::Invoke(message),
            other => other,
        })?;
        serde_json::from_value(body).map_err(|err| TransportError::Invoke(err.to_string()))
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<Fields>, TransportError> {
        let endpoint = self.endpoint("query")?;
        let response = self
            .client
            .post(endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Query(format!("status {}", response.status())));
        }
        let body = self.read_json(response).await?;
        serde_json::from_value(body).map_err(|err| TransportError::Query(err.to_string()))
    }

    async fn health(&self) -> HealthStatus {
        let Ok(endpoint) = self.endpoint("health") else {
            return HealthStatus::down();
        };
        let probe_start = Instant::now();
        let Ok(response) = self.client.get(endpoint).send().await else {
            return HealthStatus::down();
        };
        if !response.status().is_success() {
            return HealthStatus::down();
        }
        let latency = u64::try_from(probe_start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match self.read_json(response).await.map(serde_json::from_value::<HealthStatus>) {
            Ok(Ok(mut status)) => {
                status.latency_ms = Some(status.latency_ms.unwrap_or(latency));
                status
            }
            _ => HealthStatus::down(),
        }
    }
}
