use async_trait::async_trait;

use crate::{
    api::Result,
    request_context::Principal,
    service::{ClusterConfig, EnvironmentId, TeamId, TenantId},
};

/// Identity resolution and tenant configuration lookup. External
/// collaborator contract; the underlying directory (database, SSO
/// attributes) is out of scope.
#[async_trait]
pub trait TenantDirectory
where
    Self: Clone + std::fmt::Debug + Send + Sync + 'static,
{
    /// Resolves the authenticated username into a principal with team,
    /// tenant and role.
    async fn resolve_principal(&self, username: &str) -> Result<Principal>;

    /// Cluster connection details for one environment of a tenant.
    async fn cluster_config(
        &self,
        tenant_id: TenantId,
        environment_id: &EnvironmentId,
    ) -> Result<ClusterConfig>;

    /// Usernames belonging to a team, used as notification recipients.
    async fn team_members(&self, tenant_id: TenantId, team_id: TeamId) -> Result<Vec<String>>;

    async fn team_name(&self, tenant_id: TenantId, team_id: TeamId) -> Result<String>;
}
