//! Executor: applies plans to the agent.
//!
//! Only the flush phase calls into this module. Every request uses the
//! desired token's own credential and attempt budget. The observed accessor
//! id is written only after the agent confirms the change.

use crate::client::AclApi;
use crate::error::AclResult;
use crate::retry::RetryConfig;
use crate::types::{DesiredToken, ReconciliationPlan, RemoteToken, TokenRequest};
use tracing::{info, instrument};

/// Issues create, update and delete calls for desired tokens.
pub struct Executor<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A> Executor<'a, A>
where
    A: AclApi + ?Sized,
{
    /// Create an executor over an API implementation.
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Create the token and record its accessor id.
    #[instrument(skip(self, desired), fields(name = %desired.name))]
    pub async fn create(&self, desired: &mut DesiredToken) -> AclResult<RemoteToken> {
        let body = TokenRequest::from_desired(desired);
        let created = self
            .api
            .create_token(&desired.credential, &retry_for(desired), &body)
            .await?;

        info!(accessor_id = %created.accessor_id, "Created ACL token");
        desired.set_observed_accessor_id(created.accessor_id.clone());
        Ok(created)
    }

    /// Replace the token's policies and record the returned accessor id.
    #[instrument(skip(self, desired), fields(name = %desired.name))]
    pub async fn update(
        &self,
        desired: &mut DesiredToken,
        accessor_id: &str,
    ) -> AclResult<RemoteToken> {
        let body = TokenRequest::from_desired(desired);
        let updated = self
            .api
            .update_token(&desired.credential, &retry_for(desired), accessor_id, &body)
            .await?;

        info!(accessor_id = %updated.accessor_id, "Updated ACL token");
        desired.set_observed_accessor_id(updated.accessor_id.clone());
        Ok(updated)
    }

    /// Delete the token. A token that is already gone counts as deleted.
    #[instrument(skip(self, desired), fields(name = %desired.name))]
    pub async fn delete(&self, desired: &DesiredToken, accessor_id: &str) -> AclResult<()> {
        self.api
            .delete_token(&desired.credential, &retry_for(desired), accessor_id)
            .await?;

        info!("Deleted ACL token");
        Ok(())
    }

    /// Carry out one plan. `NoOp` makes no call.
    pub async fn apply(
        &self,
        desired: &mut DesiredToken,
        plan: &ReconciliationPlan,
    ) -> AclResult<()> {
        match plan {
            ReconciliationPlan::NoOp => {}
            ReconciliationPlan::Create => {
                self.create(desired).await?;
            }
            ReconciliationPlan::Update(accessor_id) => {
                self.update(desired, accessor_id).await?;
            }
            ReconciliationPlan::Delete(accessor_id) => {
                self.delete(desired, accessor_id).await?;
            }
        }
        Ok(())
    }
}

fn retry_for(desired: &DesiredToken) -> RetryConfig {
    RetryConfig::new(desired.max_attempts)
}
