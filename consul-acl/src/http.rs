//! Retrying HTTP transport for the agent API.
//!
//! Every request carries the caller's ACL token in `X-Consul-Token`. A
//! non-2xx status or a transport failure counts as a failed attempt; the
//! request is re-sent immediately until it succeeds or the attempt budget
//! runs out.

use crate::config::{AgentConfig, AgentEndpoint};
use crate::error::{AclError, AclResult};
use crate::retry::{with_retry, RetryConfig};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Header carrying the ACL token.
pub const TOKEN_HEADER: &str = "X-Consul-Token";

/// A single request against the agent.
#[derive(Debug, Clone)]
pub struct AclRequest {
    /// HTTP method
    pub method: Method,

    /// Path below the agent base URL
    pub path: String,

    /// Serialized JSON body, if any
    pub body: Option<String>,

    /// Treat 404 as success (idempotent delete)
    pub absent_ok: bool,
}

impl AclRequest {
    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            absent_ok: false,
        }
    }

    /// Create a PUT request with a JSON body.
    pub fn put<B: Serialize>(path: impl Into<String>, body: &B) -> AclResult<Self> {
        let body = serde_json::to_string(body)
            .map_err(|e| AclError::ProtocolError(format!("Unable to encode body: {}", e)))?;
        Ok(Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
            absent_ok: false,
        })
    }

    /// Create a DELETE request; a missing resource counts as deleted.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: None,
            absent_ok: true,
        }
    }
}

/// Successful response from the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code
    pub status: u16,

    /// Raw response body
    pub body: String,
}

impl HttpReply {
    /// Parse the body as JSON.
    pub fn json<T>(&self) -> AclResult<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        serde_json::from_str(&self.body).map_err(|e| {
            AclError::ProtocolError(format!("Unexpected response body ({}): {}", e, self.body))
        })
    }
}

/// A failed attempt.
#[derive(Debug)]
enum AttemptFailure {
    /// Agent answered with a non-2xx status
    Status { status: u16, body: String },
    /// Request never produced a response
    Transport(String),
}

/// HTTP client that retries every failed attempt up to a budget.
#[derive(Clone)]
pub struct RetryingHttpClient {
    /// HTTP client instance.
    client: Client,

    /// Agent endpoint.
    endpoint: AgentEndpoint,
}

impl RetryingHttpClient {
    /// Create a client for the configured agent.
    pub fn new(config: &AgentConfig) -> AclResult<Self> {
        config
            .validate()
            .map_err(|e| AclError::ConfigurationError(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                AclError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Get the agent endpoint.
    pub fn endpoint(&self) -> &AgentEndpoint {
        &self.endpoint
    }

    /// Execute a request, retrying failed attempts.
    ///
    /// Fails with [`AclError::RemoteUnavailable`] once `retry.max_attempts`
    /// attempts have failed, carrying the last status and body.
    #[instrument(skip(self, request, credential), fields(method = %request.method, path = %request.path))]
    pub async fn execute(
        &self,
        request: &AclRequest,
        credential: &str,
        retry: &RetryConfig,
    ) -> AclResult<HttpReply> {
        let mut attempts = 0u32;

        let outcome = with_retry(retry, || {
            attempts += 1;
            self.attempt(request, credential)
        })
        .await;

        outcome.map_err(|failure| match failure {
            AttemptFailure::Status { status, body } => AclError::RemoteUnavailable {
                attempts,
                status: Some(status),
                message: body,
            },
            AttemptFailure::Transport(message) => AclError::RemoteUnavailable {
                attempts,
                status: None,
                message,
            },
        })
    }

    async fn attempt(
        &self,
        request: &AclRequest,
        credential: &str,
    ) -> Result<HttpReply, AttemptFailure> {
        let url = self.endpoint.url(&request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(TOKEN_HEADER, credential);

        if let Some(ref body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        if status.is_success() {
            debug!(status = status.as_u16(), "Agent request succeeded");
            return Ok(HttpReply {
                status: status.as_u16(),
                body,
            });
        }

        if request.absent_ok && status == StatusCode::NOT_FOUND {
            debug!("Resource already absent");
            return Ok(HttpReply {
                status: status.as_u16(),
                body,
            });
        }

        warn!("Agent API error ({}): {}", status.as_u16(), body);
        Err(AttemptFailure::Status {
            status: status.as_u16(),
            body,
        })
    }
}
