//! Consul ACL token API.
//!
//! [`AclApi`] is the set of agent operations the reconciler needs. The HTTP
//! implementation, [`AclClient`], routes each call through the retrying
//! transport with the caller's credential and attempt budget.

use crate::config::AgentConfig;
use crate::error::AclResult;
use crate::http::{AclRequest, RetryingHttpClient};
use crate::retry::RetryConfig;
use crate::types::{RemoteToken, TokenRequest};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Path listing every token.
pub const TOKENS_PATH: &str = "/v1/acl/tokens";

/// Path for creating a token, and prefix for addressing one.
pub const TOKEN_PATH: &str = "/v1/acl/token";

/// Operations on ACL tokens.
#[async_trait]
pub trait AclApi: Send + Sync {
    /// List every token visible to the credential.
    async fn list_tokens(&self, credential: &str, retry: &RetryConfig)
        -> AclResult<Vec<RemoteToken>>;

    /// Create a token.
    async fn create_token(
        &self,
        credential: &str,
        retry: &RetryConfig,
        body: &TokenRequest,
    ) -> AclResult<RemoteToken>;

    /// Replace the description and policies of an existing token.
    async fn update_token(
        &self,
        credential: &str,
        retry: &RetryConfig,
        accessor_id: &str,
        body: &TokenRequest,
    ) -> AclResult<RemoteToken>;

    /// Delete a token. Deleting a token that does not exist succeeds.
    async fn delete_token(
        &self,
        credential: &str,
        retry: &RetryConfig,
        accessor_id: &str,
    ) -> AclResult<()>;
}

/// HTTP client for the agent's ACL token endpoints.
#[derive(Clone)]
pub struct AclClient {
    http: RetryingHttpClient,
}

impl AclClient {
    /// Create a client for the configured agent.
    pub fn new(config: &AgentConfig) -> AclResult<Self> {
        Ok(Self {
            http: RetryingHttpClient::new(config)?,
        })
    }

    /// Create a client for the agent described by the environment.
    pub fn from_env() -> AclResult<Self> {
        Self::new(&AgentConfig::from_env())
    }

    /// Get the underlying transport.
    pub fn http(&self) -> &RetryingHttpClient {
        &self.http
    }
}

fn token_path(accessor_id: &str) -> String {
    format!("{}/{}", TOKEN_PATH, accessor_id)
}

#[async_trait]
impl AclApi for AclClient {
    #[instrument(skip(self, credential, retry))]
    async fn list_tokens(
        &self,
        credential: &str,
        retry: &RetryConfig,
    ) -> AclResult<Vec<RemoteToken>> {
        let reply = self
            .http
            .execute(&AclRequest::get(TOKENS_PATH), credential, retry)
            .await?;
        let tokens: Vec<RemoteToken> = reply.json()?;
        debug!(count = tokens.len(), "Fetched ACL tokens");
        Ok(tokens)
    }

    #[instrument(skip(self, credential, retry, body), fields(description = %body.description))]
    async fn create_token(
        &self,
        credential: &str,
        retry: &RetryConfig,
        body: &TokenRequest,
    ) -> AclResult<RemoteToken> {
        let request = AclRequest::put(TOKEN_PATH, body)?;
        let reply = self.http.execute(&request, credential, retry).await?;
        reply.json()
    }

    #[instrument(skip(self, credential, retry, body), fields(description = %body.description))]
    async fn update_token(
        &self,
        credential: &str,
        retry: &RetryConfig,
        accessor_id: &str,
        body: &TokenRequest,
    ) -> AclResult<RemoteToken> {
        let request = AclRequest::put(token_path(accessor_id), body)?;
        let reply = self.http.execute(&request, credential, retry).await?;
        reply.json()
    }

    #[instrument(skip(self, credential, retry))]
    async fn delete_token(
        &self,
        credential: &str,
        retry: &RetryConfig,
        accessor_id: &str,
    ) -> AclResult<()> {
        self.http
            .execute(&AclRequest::delete(token_path(accessor_id)), credential, retry)
            .await?;
        Ok(())
    }
}
