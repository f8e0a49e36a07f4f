//! Agent connection configuration.
//!
//! Provides the address of the Consul agent and the request defaults used by
//! the HTTP client. Configuration is loaded from environment variables with
//! sensible defaults for a local agent.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Configuration for talking to a Consul agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent endpoint.
    pub endpoint: AgentEndpoint,

    /// Request timeout in seconds.
    pub default_timeout_secs: u64,
}

impl Default for AgentConfig {
    /// Returns default configuration for an agent on the local host.
    fn default() -> Self {
        Self {
            endpoint: AgentEndpoint {
                base_url: "http://localhost:8500".to_string(),
            },
            default_timeout_secs: 30,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CONSUL_HTTP_ADDR`: agent address (default: http://localhost:8500).
    ///   A bare `host:port` is accepted and gets an `http://` scheme.
    /// - `CONSUL_HTTP_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            endpoint: AgentEndpoint {
                base_url: std::env::var("CONSUL_HTTP_ADDR")
                    .map(|addr| AgentEndpoint::normalize(&addr))
                    .unwrap_or(default.endpoint.base_url),
            },
            default_timeout_secs: std::env::var("CONSUL_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.default_timeout_secs),
        }
    }

    /// Build a configuration for an agent reachable at `protocol://hostname:port`.
    pub fn for_agent(protocol: &str, hostname: &str, port: u16) -> Self {
        Self {
            endpoint: AgentEndpoint {
                base_url: format!("{}://{}:{}", protocol, hostname, port),
            },
            ..Self::default()
        }
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Validate the configuration before any request is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.endpoint.base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "endpoint.base_url".to_string(),
                message: format!("expected an http(s) URL, got '{}'", base),
            });
        }
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "default_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Address of a Consul agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEndpoint {
    /// Base URL for the agent (e.g., "http://localhost:8500").
    pub base_url: String,
}

impl AgentEndpoint {
    /// Create an endpoint from a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    fn normalize(addr: &str) -> String {
        if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        }
    }
}
