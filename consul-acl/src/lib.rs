//! # Consul ACL
//!
//! This crate reconciles a declared set of Consul ACL tokens against the
//! tokens held by an agent, creating, updating and deleting tokens until the
//! agent matches the declaration.
//!
//! ## Overview
//!
//! The consul-acl crate handles:
//! - **Policy references**: policies named either by name or by id
//! - **Transport**: HTTP calls with bounded, immediate retry
//! - **Directory**: one cached token list per pass
//! - **Matching**: pairing declarations with existing tokens by description
//! - **Planning**: deciding create, update, delete or nothing per token
//! - **Execution**: applying the plans and recording accessor ids
//!
//! ## Passes
//!
//! Work happens in passes driven by a [`ReconciliationContext`]:
//!
//! - `begin_pass`: drop the cached token list and any stored plans
//! - `prepare`: fetch the token list once, match and plan every token
//! - `flush`: apply the plans, in declaration order, and drop the cached list
//!
//! `prepare` never writes to the agent, so every decision in a pass is made
//! against the same snapshot. Running the same declaration twice leaves the
//! second pass with nothing to do.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consul_acl::{AclClient, AgentConfig, DesiredToken, Ensure, ReconciliationContext};
//!
//! async fn converge() -> consul_acl::AclResult<()> {
//!     let client = AclClient::new(&AgentConfig::from_env())?;
//!     let mut context = ReconciliationContext::new(client);
//!
//!     let desired = vec![
//!         DesiredToken::new("web", "e33653a6-0320-4a71-b3af-75f14578e3aa")
//!             .with_policy_name("web-read")
//!             .with_policy_id("652f27c9-d08d-412b-8985-9becc9c42fb2"),
//!         DesiredToken::new("legacy", "e33653a6-0320-4a71-b3af-75f14578e3aa")
//!             .with_ensure(Ensure::Absent),
//!     ];
//!
//!     context.begin_pass();
//!     for plan in context.prepare(desired).await? {
//!         println!("{:?}", plan);
//!     }
//!     let report = context.flush().await?;
//!     println!("{} token(s) changed", report.changed());
//!
//!     for token in context.desired() {
//!         println!("{} -> {}", token.name, token.observed_accessor_id());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! All operations return [`AclResult`]. Failures while preparing abort the
//! whole pass; failures while flushing stop at the failing token, and tokens
//! flushed before it keep their new state.

pub mod client;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod executor;
pub mod http;
pub mod matcher;
pub mod planner;
pub mod retry;
pub mod types;

// Re-export main types
pub use client::{AclApi, AclClient};
pub use config::{AgentConfig, AgentEndpoint, ConfigError};
pub use context::{FlushReport, ReconciliationContext};
pub use directory::RemoteTokenDirectory;
pub use error::{AclError, AclResult};
pub use executor::Executor;
pub use http::{AclRequest, HttpReply, RetryingHttpClient};
pub use matcher::{MatchMode, Matcher};
pub use planner::{plan, PolicyDiff, PolicyIndex};
pub use retry::{with_retry, with_retry_if, RetryConfig};
pub use types::{
    DesiredToken, Ensure, PolicyLink, PolicyRef, ReconciliationPlan, RemoteToken, TokenRequest,
    DEFAULT_MAX_ATTEMPTS,
};
