use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    api::{GovernanceError, Result},
    request_context::{Principal, RequestContext},
    service::{
        AuthorizationGuard, Capability, ClusterConfig, EnvironmentId, TeamId, TenantDirectory,
        TenantId,
    },
};

/// In-memory tenant directory seeded programmatically.
#[derive(Debug, Clone, Default)]
pub struct MemoryTenantDirectory {
    inner: Arc<RwLock<DirectoryInner>>,
}

#[derive(Debug, Default)]
struct DirectoryInner {
    users: HashMap<String, Principal>,
    team_names: HashMap<(TenantId, TeamId), String>,
    clusters: HashMap<(TenantId, EnvironmentId), ClusterConfig>,
}

impl MemoryTenantDirectory {
    pub async fn add_user(&self, principal: Principal) {
        let mut inner = self.inner.write().await;
        inner.users.insert(principal.username.clone(), principal);
    }

    pub async fn add_team(&self, tenant_id: TenantId, team_id: TeamId, name: &str) {
        let mut inner = self.inner.write().await;
        inner.team_names.insert((tenant_id, team_id), name.to_string());
    }

    pub async fn add_cluster(&self, tenant_id: TenantId, cluster: ClusterConfig) {
        let mut inner = self.inner.write().await;
        inner
            .clusters
            .insert((tenant_id, cluster.environment_id.clone()), cluster);
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn resolve_principal(&self, username: &str) -> Result<Principal> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(username)
            .cloned()
            .ok_or_else(|| GovernanceError::not_found(format!("User '{username}' not found.")))
    }

    async fn cluster_config(
        &self,
        tenant_id: TenantId,
        environment_id: &EnvironmentId,
    ) -> Result<ClusterConfig> {
        let inner = self.inner.read().await;
        inner
            .clusters
            .get(&(tenant_id, environment_id.clone()))
            .cloned()
            .ok_or_else(|| {
                GovernanceError::not_found(format!("Environment '{environment_id}' not found."))
            })
    }

    async fn team_members(&self, tenant_id: TenantId, team_id: TeamId) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let mut members = inner
            .users
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.team_id == team_id)
            .map(|p| p.username.clone())
            .collect::<Vec<_>>();
        members.sort();
        Ok(members)
    }

    async fn team_name(&self, tenant_id: TenantId, team_id: TeamId) -> Result<String> {
        let inner = self.inner.read().await;
        inner
            .team_names
            .get(&(tenant_id, team_id))
            .cloned()
            .ok_or_else(|| GovernanceError::not_found(format!("Team '{team_id}' not found.")))
    }
}

/// Guard backed by a static role-to-capability mapping plus per-team
/// environment allowlists.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizationGuard {
    inner: Arc<RwLock<GuardInner>>,
}

#[derive(Debug, Default)]
struct GuardInner {
    role_capabilities: HashMap<String, HashSet<Capability>>,
    team_environments: HashMap<(TenantId, TeamId), HashSet<EnvironmentId>>,
}

impl StaticAuthorizationGuard {
    pub async fn grant_role(
        &self,
        role: &str,
        capabilities: impl IntoIterator<Item = Capability>,
    ) {
        let mut inner = self.inner.write().await;
        inner
            .role_capabilities
            .entry(role.to_string())
            .or_default()
            .extend(capabilities);
    }

    pub async fn allow_environments(
        &self,
        tenant_id: TenantId,
        team_id: TeamId,
        environments: impl IntoIterator<Item = EnvironmentId>,
    ) {
        let mut inner = self.inner.write().await;
        inner
            .team_environments
            .entry((tenant_id, team_id))
            .or_default()
            .extend(environments);
    }
}

#[async_trait]
impl AuthorizationGuard for StaticAuthorizationGuard {
    async fn is_authorized(&self, ctx: &RequestContext, capability: Capability) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .role_capabilities
            .get(&ctx.principal().role)
            .is_some_and(|caps| caps.contains(&capability)))
    }

    async fn allowed_environments(&self, ctx: &RequestContext) -> Result<HashSet<EnvironmentId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .team_environments
            .get(&(ctx.tenant_id(), ctx.team_id()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(username: &str, role: &str) -> Principal {
        Principal {
            username: username.to_string(),
            team_id: TeamId::new(1001),
            tenant_id: TenantId::new(101),
            role: role.to_string(),
        }
    }

    #[tokio::test]
    async fn test_capabilities_follow_the_principal_role() {
        let guard = StaticAuthorizationGuard::default();
        guard
            .grant_role("USER", [Capability::RequestCreateTopics])
            .await;

        let user = RequestContext::new(principal("alice", "USER"));
        let admin = RequestContext::new(principal("carol", "APPROVER"));
        assert!(guard
            .is_authorized(&user, Capability::RequestCreateTopics)
            .await
            .unwrap());
        assert!(!guard
            .is_authorized(&user, Capability::ApproveTopics)
            .await
            .unwrap());
        assert!(!guard
            .is_authorized(&admin, Capability::RequestCreateTopics)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_team_has_no_environments() {
        let guard = StaticAuthorizationGuard::default();
        let ctx = RequestContext::new(principal("alice", "USER"));
        assert!(guard.allowed_environments(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_team_members_come_from_registered_users() {
        let directory = MemoryTenantDirectory::default();
        directory.add_user(principal("alice", "USER")).await;
        directory.add_user(principal("bob", "USER")).await;
        let mut other = principal("carol", "USER");
        other.team_id = TeamId::new(2002);
        directory.add_user(other).await;

        let members = directory
            .team_members(TenantId::new(101), TeamId::new(1001))
            .await
            .unwrap();
        assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);
    }
}
