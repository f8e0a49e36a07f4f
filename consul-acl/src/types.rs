//! ACL token types
//!
//! This module defines the desired-state and remote-state views of a Consul
//! ACL token, the policy reference union shared by both, and the wire bodies
//! exchanged with the agent.

use crate::error::{AclError, AclResult};
use serde::{Deserialize, Deserializer, Serialize};

/// Default attempt budget for a desired token.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Reference to a policy, either by name or by opaque id.
///
/// Serializes as `{"Name": ...}` or `{"ID": ...}`, the shape the agent
/// accepts in a token's `Policies` list. A name reference and an id
/// reference are never equal, even when they point at the same policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyRef {
    /// Policy referenced by name
    #[serde(rename = "Name")]
    ByName(String),

    /// Policy referenced by id
    #[serde(rename = "ID")]
    ById(String),
}

impl PolicyRef {
    /// Create a by-name reference.
    pub fn name(name: impl Into<String>) -> Self {
        PolicyRef::ByName(name.into())
    }

    /// Create a by-id reference.
    pub fn id(id: impl Into<String>) -> Self {
        PolicyRef::ById(id.into())
    }

    /// Get the referenced name or id.
    pub fn value(&self) -> &str {
        match self {
            PolicyRef::ByName(v) | PolicyRef::ById(v) => v,
        }
    }
}

impl std::fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyRef::ByName(name) => write!(f, "name:{}", name),
            PolicyRef::ById(id) => write!(f, "id:{}", id),
        }
    }
}

/// Desired lifecycle state of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// Token should exist with exactly the declared policies
    #[default]
    Present,
    /// Token should not exist
    Absent,
}

/// A token as declared in configuration.
///
/// The resource name doubles as the correlation key: it is sent as the
/// token description and matched against descriptions of existing tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredToken {
    /// Resource name, also the token description
    pub name: String,

    /// ACL token used to authenticate against the agent
    pub credential: String,

    /// Policies referenced by name, in declared order
    #[serde(default)]
    pub policies_by_name: Vec<String>,

    /// Policies referenced by id, in declared order
    #[serde(default)]
    pub policies_by_id: Vec<String>,

    /// Attempt budget for every request made on behalf of this token
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Desired lifecycle state
    #[serde(default)]
    pub ensure: Ensure,

    /// Secret to assign on creation, if the agent should not generate one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_id: Option<String>,

    /// Accessor id of the remote counterpart, empty when none is known
    #[serde(default)]
    observed_accessor_id: String,
}

impl DesiredToken {
    /// Create a present token with no policies and the default budget.
    pub fn new(name: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credential: credential.into(),
            policies_by_name: Vec::new(),
            policies_by_id: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            ensure: Ensure::Present,
            secret_id: None,
            observed_accessor_id: String::new(),
        }
    }

    /// Add a policy referenced by name.
    pub fn with_policy_name(mut self, name: impl Into<String>) -> Self {
        self.policies_by_name.push(name.into());
        self
    }

    /// Add a policy referenced by id.
    pub fn with_policy_id(mut self, id: impl Into<String>) -> Self {
        self.policies_by_id.push(id.into());
        self
    }

    /// Set the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the desired lifecycle state.
    pub fn with_ensure(mut self, ensure: Ensure) -> Self {
        self.ensure = ensure;
        self
    }

    /// Set the secret to assign on creation.
    pub fn with_secret_id(mut self, secret_id: impl Into<String>) -> Self {
        self.secret_id = Some(secret_id.into());
        self
    }

    /// Correlation key used to find the remote counterpart.
    pub fn correlation_key(&self) -> &str {
        &self.name
    }

    /// All policy references, by-name entries first then by-id entries.
    pub fn policy_refs(&self) -> Vec<PolicyRef> {
        self.policies_by_name
            .iter()
            .map(PolicyRef::name)
            .chain(self.policies_by_id.iter().map(PolicyRef::id))
            .collect()
    }

    /// Check whether any policy is declared.
    pub fn has_policies(&self) -> bool {
        !self.policies_by_name.is_empty() || !self.policies_by_id.is_empty()
    }

    /// Accessor id of the remote counterpart, `""` when none is known.
    pub fn observed_accessor_id(&self) -> &str {
        &self.observed_accessor_id
    }

    /// Check whether a remote counterpart has been observed.
    pub fn is_observed(&self) -> bool {
        !self.observed_accessor_id.is_empty()
    }

    /// Reject declarations that cannot be reconciled.
    ///
    /// A present token must reference at least one policy; an absent token
    /// may omit them.
    pub fn validate(&self) -> AclResult<()> {
        if self.name.trim().is_empty() {
            return Err(AclError::ConfigurationError(
                "token name must not be empty".to_string(),
            ));
        }
        if self.credential.is_empty() {
            return Err(AclError::ConfigurationError(format!(
                "token '{}' has no credential",
                self.name
            )));
        }
        if self.max_attempts == 0 {
            return Err(AclError::ConfigurationError(format!(
                "token '{}' must allow at least one attempt",
                self.name
            )));
        }
        if self
            .policies_by_name
            .iter()
            .chain(self.policies_by_id.iter())
            .any(|p| p.trim().is_empty())
        {
            return Err(AclError::ConfigurationError(format!(
                "token '{}' references a policy with an empty name or id",
                self.name
            )));
        }
        if self.ensure == Ensure::Present && !self.has_policies() {
            return Err(AclError::ConfigurationError(format!(
                "token '{}' is present but references no policy",
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn set_observed_accessor_id(&mut self, accessor_id: impl Into<String>) {
        self.observed_accessor_id = accessor_id.into();
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// A policy link as reported on an existing token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyLink {
    /// Policy id
    #[serde(rename = "ID")]
    pub id: String,

    /// Policy name
    #[serde(rename = "Name")]
    pub name: String,
}

impl PolicyLink {
    /// Create a policy link.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A token as reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteToken {
    /// Accessor id assigned by the agent
    #[serde(rename = "AccessorID")]
    pub accessor_id: String,

    /// Description, used as correlation key
    #[serde(rename = "Description", default)]
    pub description: String,

    /// Resolved policy links
    #[serde(rename = "Policies", default, deserialize_with = "null_as_empty")]
    pub policies: Vec<PolicyLink>,
}

impl RemoteToken {
    /// Create a remote token.
    pub fn new(
        accessor_id: impl Into<String>,
        description: impl Into<String>,
        policies: Vec<PolicyLink>,
    ) -> Self {
        Self {
            accessor_id: accessor_id.into(),
            description: description.into(),
            policies,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<PolicyLink>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<PolicyLink>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of a create or update request.
///
/// Field order is the wire order: `Description`, `Local`, `Policies`, then
/// `SecretID` when one is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRequest {
    /// Token description
    #[serde(rename = "Description")]
    pub description: String,

    /// Whether the token is datacenter-local; always false
    #[serde(rename = "Local")]
    pub local: bool,

    /// Policy references, by-name entries first
    #[serde(rename = "Policies")]
    pub policies: Vec<PolicyRef>,

    /// Secret to assign on creation
    #[serde(rename = "SecretID", skip_serializing_if = "Option::is_none")]
    pub secret_id: Option<String>,
}

impl TokenRequest {
    /// Build the request body for a desired token.
    pub fn from_desired(desired: &DesiredToken) -> Self {
        Self {
            description: desired.name.clone(),
            local: false,
            policies: desired.policy_refs(),
            secret_id: desired.secret_id.clone(),
        }
    }
}

/// Decision taken for one desired token during prepare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "accessor_id", rename_all = "snake_case")]
pub enum ReconciliationPlan {
    /// Remote state already matches
    NoOp,
    /// Token must be created
    Create,
    /// Token with this accessor id must be updated
    Update(String),
    /// Token with this accessor id must be deleted
    Delete(String),
}

impl ReconciliationPlan {
    /// Check whether the plan needs a network mutation.
    pub fn is_noop(&self) -> bool {
        matches!(self, ReconciliationPlan::NoOp)
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationPlan::NoOp => "noop",
            ReconciliationPlan::Create => "create",
            ReconciliationPlan::Update(_) => "update",
            ReconciliationPlan::Delete(_) => "delete",
        }
    }
}
