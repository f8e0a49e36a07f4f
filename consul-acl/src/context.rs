//! Reconciliation context
//!
//! A [`ReconciliationContext`] owns everything one pass needs: the API
//! handle, the cached token snapshot, the desired tokens and their plans.
//! A pass runs in two phases:
//!
//! 1. `prepare` validates the declarations, fetches the snapshot once,
//!    matches and plans every token. Nothing is written to the agent.
//! 2. `flush` applies the stored plans in declaration order.
//!
//! Requests are awaited one at a time; no task is spawned.
//!
//! # Example
//!
//! ```rust,no_run
//! use consul_acl::{AclClient, AgentConfig, DesiredToken, ReconciliationContext};
//!
//! async fn run() -> consul_acl::AclResult<()> {
//!     let client = AclClient::new(&AgentConfig::default())?;
//!     let mut context = ReconciliationContext::new(client);
//!
//!     context.begin_pass();
//!     context
//!         .prepare(vec![DesiredToken::new("web", "management-token")
//!             .with_policy_name("web-read")])
//!         .await?;
//!     let report = context.flush().await?;
//!     println!("created {:?}", report.created);
//!     Ok(())
//! }
//! ```

use crate::client::AclApi;
use crate::directory::RemoteTokenDirectory;
use crate::error::{AclError, AclResult};
use crate::executor::Executor;
use crate::matcher::{MatchMode, Matcher};
use crate::planner::{plan, PolicyDiff};
use crate::types::{DesiredToken, ReconciliationPlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassState {
    Idle,
    Prepared,
    Flushed,
}

/// Outcome of a flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Pass this flush belongs to
    pub pass_id: Uuid,

    /// When the flush started
    pub started_at: DateTime<Utc>,

    /// When the flush finished
    pub finished_at: DateTime<Utc>,

    /// Names of created tokens
    pub created: Vec<String>,

    /// Names of updated tokens
    pub updated: Vec<String>,

    /// Names of deleted tokens
    pub deleted: Vec<String>,

    /// Names of tokens left as they were
    pub unchanged: Vec<String>,
}

impl FlushReport {
    fn new(pass_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            pass_id,
            started_at: now,
            finished_at: now,
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            unchanged: Vec::new(),
        }
    }

    fn record(&mut self, name: &str, plan: &ReconciliationPlan) {
        let bucket = match plan {
            ReconciliationPlan::NoOp => &mut self.unchanged,
            ReconciliationPlan::Create => &mut self.created,
            ReconciliationPlan::Update(_) => &mut self.updated,
            ReconciliationPlan::Delete(_) => &mut self.deleted,
        };
        bucket.push(name.to_string());
    }

    /// Number of tokens that required a network mutation.
    pub fn changed(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// State of one reconciliation pass.
pub struct ReconciliationContext<A> {
    api: A,
    directory: RemoteTokenDirectory,
    matcher: Matcher,
    pass_id: Uuid,
    state: PassState,
    tokens: Vec<DesiredToken>,
    plans: Vec<ReconciliationPlan>,
}

impl<A: AclApi> ReconciliationContext<A> {
    /// Create a context with the default match mode.
    pub fn new(api: A) -> Self {
        Self {
            api,
            directory: RemoteTokenDirectory::new(),
            matcher: Matcher::default(),
            pass_id: Uuid::now_v7(),
            state: PassState::Idle,
            tokens: Vec::new(),
            plans: Vec::new(),
        }
    }

    /// Set how duplicate descriptions are handled.
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.matcher = Matcher::new(mode);
        self
    }

    /// Get the API handle.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Identifier of the current pass.
    pub fn pass_id(&self) -> Uuid {
        self.pass_id
    }

    /// Start a new pass: forget the snapshot and any stored plans.
    pub fn begin_pass(&mut self) -> Uuid {
        self.directory.reset();
        self.plans.clear();
        self.state = PassState::Idle;
        self.pass_id = Uuid::now_v7();
        debug!(pass_id = %self.pass_id, "Began reconciliation pass");
        self.pass_id
    }

    /// Match and plan every desired token against one snapshot.
    ///
    /// The snapshot is fetched once per pass, using the credential and the
    /// `max_attempts` budget of the first declared token; the other tokens'
    /// credentials and budgets apply only to their own `flush` requests.
    /// Preparing again before `flush` reuses the same snapshot. On error
    /// nothing is stored and `flush` stays unavailable.
    #[instrument(skip(self, desired), fields(pass_id = %self.pass_id, tokens = desired.len()))]
    pub async fn prepare(
        &mut self,
        mut desired: Vec<DesiredToken>,
    ) -> AclResult<&[ReconciliationPlan]> {
        self.state = PassState::Idle;
        self.plans.clear();
        validate_all(&desired)?;

        let mut plans = Vec::with_capacity(desired.len());
        if let Some(first) = desired.first() {
            let credential = first.credential.clone();
            let max_attempts = first.max_attempts;
            let snapshot = self
                .directory
                .fetch(&self.api, &credential, max_attempts)
                .await?;

            for token in desired.iter_mut() {
                let matched = self.matcher.match_token(token, snapshot)?;
                let decision = plan(token, matched);

                if let (ReconciliationPlan::Update(accessor_id), Some(remote)) =
                    (&decision, matched)
                {
                    let diff = PolicyDiff::compute(token, &remote.policies);
                    info!(
                        name = %token.name,
                        accessor_id = %accessor_id,
                        missing = diff.missing.len(),
                        surplus = diff.surplus.len(),
                        "Token policies differ"
                    );
                } else {
                    debug!(name = %token.name, plan = decision.label(), "Planned token");
                }
                plans.push(decision);
            }
        }

        self.tokens = desired;
        self.plans = plans;
        self.state = PassState::Prepared;
        Ok(self.plans.as_slice())
    }

    /// Apply the prepared plans in declaration order.
    ///
    /// Stops at the first failure; tokens flushed before it keep their new
    /// state and the remaining ones are left untouched. A prepared set can
    /// be flushed once.
    ///
    /// Flushing ends the pass: the cached snapshot is dropped, so the next
    /// `prepare` sees the agent's state after these changes.
    #[instrument(skip(self), fields(pass_id = %self.pass_id))]
    pub async fn flush(&mut self) -> AclResult<FlushReport> {
        if self.state != PassState::Prepared {
            return Err(AclError::NotPrepared);
        }
        self.state = PassState::Flushed;
        self.directory.reset();

        let mut report = FlushReport::new(self.pass_id);
        let executor = Executor::new(&self.api);

        for (token, decision) in self.tokens.iter_mut().zip(self.plans.iter()) {
            if let Err(e) = executor.apply(token, decision).await {
                error!(
                    name = %token.name,
                    plan = decision.label(),
                    error = %e,
                    "Flush aborted"
                );
                return Err(e);
            }
            report.record(&token.name, decision);
        }

        report.finished_at = Utc::now();
        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            unchanged = report.unchanged.len(),
            "Flush complete"
        );
        Ok(report)
    }

    /// Plans stored by the last successful `prepare`.
    pub fn plans(&self) -> &[ReconciliationPlan] {
        &self.plans
    }

    /// Desired tokens of the current pass with their observed accessor ids.
    pub fn desired(&self) -> &[DesiredToken] {
        &self.tokens
    }

    /// Take back the desired tokens.
    pub fn into_desired(self) -> Vec<DesiredToken> {
        self.tokens
    }
}

fn validate_all(desired: &[DesiredToken]) -> AclResult<()> {
    let mut names = HashSet::with_capacity(desired.len());
    for token in desired {
        token.validate()?;
        if !names.insert(token.name.as_str()) {
            return Err(AclError::ConfigurationError(format!(
                "token '{}' is declared more than once",
                token.name
            )));
        }
    }
    Ok(())
}
