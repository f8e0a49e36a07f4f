//! Per-pass cache of the agent's token list.

use crate::client::AclApi;
use crate::error::AclResult;
use crate::retry::RetryConfig;
use crate::types::RemoteToken;
use tracing::debug;

/// Token list fetched at most once per pass.
///
/// The cached snapshot is never patched with the results of later
/// mutations; the next pass fetches a fresh one after [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct RemoteTokenDirectory {
    snapshot: Option<Vec<RemoteToken>>,
}

impl RemoteTokenDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the token list, fetching it on first use.
    pub async fn fetch<A>(
        &mut self,
        api: &A,
        credential: &str,
        max_attempts: u32,
    ) -> AclResult<&[RemoteToken]>
    where
        A: AclApi + ?Sized,
    {
        if self.snapshot.is_none() {
            let tokens = api
                .list_tokens(credential, &RetryConfig::new(max_attempts))
                .await?;
            debug!(count = tokens.len(), "Cached remote token snapshot");
            self.snapshot = Some(tokens);
        }

        Ok(self.snapshot.as_deref().unwrap_or_default())
    }

    /// Return the cached snapshot without fetching.
    pub fn cached(&self) -> Option<&[RemoteToken]> {
        self.snapshot.as_deref()
    }

    /// Drop the cached snapshot.
    pub fn reset(&mut self) {
        self.snapshot = None;
    }
}
