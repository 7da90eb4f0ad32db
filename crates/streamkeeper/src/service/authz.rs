use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    api::{GovernanceError, Result},
    request_context::RequestContext,
    service::{EnvironmentId, OperationType, ResourceKind},
};

/// Fixed set of capabilities a role may hold within a tenant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::VariantArray,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    RequestCreateTopics,
    RequestEditTopics,
    RequestDeleteTopics,
    RequestClaimTopics,
    RequestCreateAcls,
    RequestDeleteAcls,
    RequestCreateSchemas,
    RequestCreateConnectors,
    RequestEditConnectors,
    RequestDeleteConnectors,
    RequestClaimConnectors,
    ApproveTopics,
    ApproveAcls,
    ApproveSchemas,
    ApproveConnectors,
    /// Approve requests raised by any team, not only the caller's own.
    ApproveAllTeams,
    SyncTopics,
    SyncAcls,
    UpdateDocumentation,
}

/// Capability required to submit `operation` for `kind`.
#[must_use]
pub fn request_capability(kind: ResourceKind, operation: OperationType) -> Capability {
    match (kind, operation) {
        (ResourceKind::Topic, OperationType::Update) => Capability::RequestEditTopics,
        (ResourceKind::Topic, OperationType::Delete) => Capability::RequestDeleteTopics,
        (ResourceKind::Topic, OperationType::Claim) => Capability::RequestClaimTopics,
        (ResourceKind::Topic, _) => Capability::RequestCreateTopics,
        (ResourceKind::Acl, OperationType::Delete) => Capability::RequestDeleteAcls,
        (ResourceKind::Acl, _) => Capability::RequestCreateAcls,
        (ResourceKind::Schema, _) => Capability::RequestCreateSchemas,
        (ResourceKind::Connector, OperationType::Update) => Capability::RequestEditConnectors,
        (ResourceKind::Connector, OperationType::Delete) => Capability::RequestDeleteConnectors,
        (ResourceKind::Connector, OperationType::Claim) => Capability::RequestClaimConnectors,
        (ResourceKind::Connector, _) => Capability::RequestCreateConnectors,
    }
}

/// Capability required to approve or decline a request for `kind`.
#[must_use]
pub fn approve_capability(kind: ResourceKind) -> Capability {
    match kind {
        ResourceKind::Topic => Capability::ApproveTopics,
        ResourceKind::Acl => Capability::ApproveAcls,
        ResourceKind::Schema => Capability::ApproveSchemas,
        ResourceKind::Connector => Capability::ApproveConnectors,
    }
}

/// Capability and environment scoping checks. Backed by a per-tenant
/// role-to-capability mapping; consulted by every other component.
#[async_trait]
pub trait AuthorizationGuard
where
    Self: Clone + std::fmt::Debug + Send + Sync + 'static,
{
    async fn is_authorized(&self, ctx: &RequestContext, capability: Capability) -> Result<bool>;

    /// Environments the caller may see and act on. Every read and write path
    /// intersects against this set before returning or acting.
    async fn allowed_environments(&self, ctx: &RequestContext) -> Result<HashSet<EnvironmentId>>;

    async fn require(&self, ctx: &RequestContext, capability: Capability) -> Result<()> {
        if self.is_authorized(ctx, capability).await? {
            Ok(())
        } else {
            Err(GovernanceError::not_authorized(
                "Missing permissions for this operation.",
            ))
        }
    }

    /// Rejects environments outside the caller's scope. Deliberately reports
    /// not-found rather than not-authorized so cross-tenant existence does
    /// not leak.
    async fn require_environment(
        &self,
        ctx: &RequestContext,
        environment: &EnvironmentId,
    ) -> Result<()> {
        if self.allowed_environments(ctx).await?.contains(environment) {
            Ok(())
        } else {
            Err(GovernanceError::not_found(format!(
                "Environment '{environment}' not found."
            )))
        }
    }
}

/// Guard that grants every capability and environment. Test wiring only.
#[derive(Debug, Clone, Default)]
pub struct AllowAllGuard {
    environments: Vec<EnvironmentId>,
}

impl AllowAllGuard {
    #[must_use]
    pub fn with_environments(environments: Vec<EnvironmentId>) -> Self {
        Self { environments }
    }
}

#[async_trait]
impl AuthorizationGuard for AllowAllGuard {
    async fn is_authorized(&self, _ctx: &RequestContext, _capability: Capability) -> Result<bool> {
        Ok(true)
    }

    async fn allowed_environments(&self, _ctx: &RequestContext) -> Result<HashSet<EnvironmentId>> {
        Ok(self.environments.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_capability_dispatch() {
        assert_eq!(
            request_capability(ResourceKind::Topic, OperationType::Create),
            Capability::RequestCreateTopics
        );
        assert_eq!(
            request_capability(ResourceKind::Topic, OperationType::Promote),
            Capability::RequestCreateTopics
        );
        assert_eq!(
            request_capability(ResourceKind::Acl, OperationType::Delete),
            Capability::RequestDeleteAcls
        );
        assert_eq!(
            request_capability(ResourceKind::Connector, OperationType::Claim),
            Capability::RequestClaimConnectors
        );
    }

    #[test]
    fn test_capability_wire_format() {
        assert_eq!(Capability::ApproveAllTeams.to_string(), "APPROVE_ALL_TEAMS");
    }
}
