//! Correlates desired tokens with remote tokens by description.

use crate::error::{AclError, AclResult};
use crate::types::{DesiredToken, RemoteToken};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How to treat several remote tokens sharing one description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// First token in snapshot order wins; the ambiguity is logged
    #[default]
    FirstWins,
    /// Fail with [`AclError::AmbiguousMatch`]
    Strict,
}

/// Finds the remote counterpart of a desired token.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    mode: MatchMode,
}

impl Matcher {
    /// Create a matcher with the given ambiguity mode.
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// Get the ambiguity mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Match a desired token against a snapshot.
    ///
    /// Records the match's accessor id on `desired`, or `""` when no remote
    /// token carries the desired token's correlation key.
    pub fn match_token<'s>(
        &self,
        desired: &mut DesiredToken,
        snapshot: &'s [RemoteToken],
    ) -> AclResult<Option<&'s RemoteToken>> {
        let key = desired.correlation_key();
        let mut candidates = snapshot.iter().filter(|t| t.description == key);
        let first = candidates.next();
        let extra = candidates.count();

        if extra > 0 {
            let total = extra + 1;
            match self.mode {
                MatchMode::Strict => {
                    return Err(AclError::AmbiguousMatch {
                        key: key.to_string(),
                        candidates: total,
                    });
                }
                MatchMode::FirstWins => {
                    warn!(
                        key = %key,
                        candidates = total,
                        "Several remote tokens share this description, using the first"
                    );
                }
            }
        }

        match first {
            Some(token) => {
                debug!(key = %key, accessor_id = %token.accessor_id, "Matched remote token");
                desired.set_observed_accessor_id(token.accessor_id.clone());
            }
            None => {
                debug!(key = %key, "No remote token matches");
                desired.set_observed_accessor_id(String::new());
            }
        }

        Ok(first)
    }
}
