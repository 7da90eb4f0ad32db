use uuid::Uuid;

use crate::service::{TeamId, TenantId};

/// Resolved identity of the caller. Produced by the identity collaborator
/// (`TenantDirectory::resolve_principal`) before any governance operation
/// runs; never read from ambient global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub team_id: TeamId,
    pub tenant_id: TenantId,
    pub role: String,
}

/// Per-call context threaded explicitly through every public operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    principal: Principal,
    correlation_id: Uuid,
}

impl RequestContext {
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            correlation_id: Uuid::now_v7(),
        }
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.principal.username
    }

    #[must_use]
    pub fn team_id(&self) -> TeamId {
        self.principal.team_id
    }

    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.principal.tenant_id
    }

    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
