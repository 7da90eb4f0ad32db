use async_trait::async_trait;

use crate::{
    api::Result,
    service::{
        AclBinding, AclPermission, EnvironmentId, SotAcl, SotConnector, SotSchemaVersion,
        SotTopic, TeamId, TenantId,
    },
};

/// Idempotent mirror of the resources as they exist on the real clusters.
/// Rows are written only as a side effect of an approved request whose
/// remote execution succeeded. Resource ids come from a tenant-scoped
/// counter maintained by the store, independent of request ids.
#[async_trait]
pub trait SyncStateStore
where
    Self: Clone + std::fmt::Debug + Send + Sync + 'static,
{
    // ---------------- Topics ----------------

    /// Inserts or replaces the row identified by
    /// `(name, environment_id, tenant_id)`. Re-applying the same approved
    /// operation must not create a second row.
    async fn upsert_topic(&self, topic: SotTopic) -> Result<SotTopic>;

    async fn remove_topic(
        &self,
        tenant_id: TenantId,
        name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<()>;

    async fn find_topic(
        &self,
        tenant_id: TenantId,
        name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Option<SotTopic>>;

    /// All environments' rows for one topic name.
    async fn topics_by_name(&self, tenant_id: TenantId, name: &str) -> Result<Vec<SotTopic>>;

    async fn list_topics(&self, tenant_id: TenantId) -> Result<Vec<SotTopic>>;

    /// Transfers ownership of every row carrying `name` to `team_id`,
    /// returning the number of rows touched.
    async fn reassign_topic_owner(
        &self,
        tenant_id: TenantId,
        name: &str,
        team_id: TeamId,
    ) -> Result<usize>;

    async fn update_topic_documentation(
        &self,
        tenant_id: TenantId,
        name: &str,
        documentation: Option<String>,
    ) -> Result<usize>;

    // ---------------- ACLs ----------------

    /// Inserts or replaces the row identified by
    /// `(topic_name, environment_id, tenant_id, permission, binding)`.
    async fn upsert_acl(&self, acl: SotAcl) -> Result<SotAcl>;

    async fn find_acl(
        &self,
        tenant_id: TenantId,
        topic_name: &str,
        environment_id: &EnvironmentId,
        permission: AclPermission,
        binding: &AclBinding,
    ) -> Result<Option<SotAcl>>;

    async fn remove_acl(
        &self,
        tenant_id: TenantId,
        topic_name: &str,
        environment_id: &EnvironmentId,
        permission: AclPermission,
        binding: &AclBinding,
    ) -> Result<()>;

    /// Live subscriptions on a topic; a non-empty result blocks topic
    /// deletion.
    async fn acls_for_topic(
        &self,
        tenant_id: TenantId,
        topic_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<SotAcl>>;

    // ---------------- Schemas ----------------

    async fn upsert_schema_version(
        &self,
        schema: SotSchemaVersion,
    ) -> Result<SotSchemaVersion>;

    /// Versions for one topic and environment, ascending.
    async fn schema_versions(
        &self,
        tenant_id: TenantId,
        topic_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<SotSchemaVersion>>;

    // ---------------- Connectors ----------------

    async fn upsert_connector(&self, connector: SotConnector) -> Result<SotConnector>;

    async fn remove_connector(
        &self,
        tenant_id: TenantId,
        name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<()>;

    async fn find_connector(
        &self,
        tenant_id: TenantId,
        name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Option<SotConnector>>;

    async fn list_connectors(&self, tenant_id: TenantId) -> Result<Vec<SotConnector>>;

    async fn reassign_connector_owner(
        &self,
        tenant_id: TenantId,
        name: &str,
        team_id: TeamId,
    ) -> Result<usize>;

    async fn update_connector_documentation(
        &self,
        tenant_id: TenantId,
        name: &str,
        documentation: Option<String>,
    ) -> Result<usize>;
}
