//! Diff planner: decides what a desired token needs.
//!
//! Policies are compared as sets of resolved `{id, name}` links. A desired
//! by-name reference is satisfied by a remote link with that name, a by-id
//! reference by a link with that id. Any unsatisfied reference (missing) or
//! any remote link no reference resolves to (surplus) makes the token stale.
//! List order never matters.

use crate::types::{DesiredToken, Ensure, PolicyLink, PolicyRef, ReconciliationPlan, RemoteToken};
use std::collections::{HashMap, HashSet};

/// Lookup table over one remote token's policy links, keyed by name and id.
#[derive(Debug)]
pub struct PolicyIndex<'a> {
    by_name: HashMap<&'a str, &'a PolicyLink>,
    by_id: HashMap<&'a str, &'a PolicyLink>,
}

impl<'a> PolicyIndex<'a> {
    /// Index the policy links of a remote token.
    pub fn new(links: &'a [PolicyLink]) -> Self {
        let mut by_name = HashMap::with_capacity(links.len());
        let mut by_id = HashMap::with_capacity(links.len());
        for link in links {
            by_name.entry(link.name.as_str()).or_insert(link);
            by_id.entry(link.id.as_str()).or_insert(link);
        }
        Self { by_name, by_id }
    }

    /// Resolve a reference to the link it designates, if present.
    pub fn resolve(&self, policy: &PolicyRef) -> Option<&'a PolicyLink> {
        match policy {
            PolicyRef::ByName(name) => self.by_name.get(name.as_str()).copied(),
            PolicyRef::ById(id) => self.by_id.get(id.as_str()).copied(),
        }
    }
}

/// Policy differences between a desired token and its remote counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDiff {
    /// Desired references with no matching remote link
    pub missing: Vec<PolicyRef>,

    /// Remote links not designated by any desired reference
    pub surplus: Vec<PolicyLink>,
}

impl PolicyDiff {
    /// Compare a desired token's references against remote links.
    pub fn compute(desired: &DesiredToken, links: &[PolicyLink]) -> Self {
        let index = PolicyIndex::new(links);
        let mut required: HashSet<&PolicyLink> = HashSet::new();
        let mut missing = Vec::new();

        for policy in desired.policy_refs() {
            match index.resolve(&policy) {
                Some(link) => {
                    required.insert(link);
                }
                None => missing.push(policy),
            }
        }

        let mut seen: HashSet<&PolicyLink> = HashSet::new();
        let surplus = links
            .iter()
            .filter(|link| !required.contains(link) && seen.insert(*link))
            .cloned()
            .collect();

        Self { missing, surplus }
    }

    /// Check whether the policy sets are equal.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.surplus.is_empty()
    }
}

/// Decide the action for a desired token given its matched remote token.
pub fn plan(desired: &DesiredToken, matched: Option<&RemoteToken>) -> ReconciliationPlan {
    match (desired.ensure, matched) {
        (Ensure::Absent, Some(remote)) => ReconciliationPlan::Delete(remote.accessor_id.clone()),
        (Ensure::Absent, None) => ReconciliationPlan::NoOp,
        (Ensure::Present, None) => ReconciliationPlan::Create,
        (Ensure::Present, Some(remote)) => {
            if PolicyDiff::compute(desired, &remote.policies).is_empty() {
                ReconciliationPlan::NoOp
            } else {
                ReconciliationPlan::Update(remote.accessor_id.clone())
            }
        }
    }
}
