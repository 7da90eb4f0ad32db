use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    api::Result,
    service::{
        AclBinding, AclPermission, EnvironmentId, ResourceId, SotAcl, SotConnector,
        SotSchemaVersion, SotTopic, SyncStateStore, TeamId, TenantId,
    },
};

/// In-memory source-of-truth mirror. Upserts match on the row's logical
/// identity, so re-applying an approved operation replaces rather than
/// duplicates; fresh rows get ids from a tenant-scoped counter.
#[derive(Debug, Clone, Default)]
pub struct MemorySyncStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    topics: Vec<SotTopic>,
    acls: Vec<SotAcl>,
    schemas: Vec<SotSchemaVersion>,
    connectors: Vec<SotConnector>,
    counters: HashMap<TenantId, i32>,
}

impl StoreInner {
    fn next_resource_id(&mut self, tenant_id: TenantId) -> ResourceId {
        let counter = self.counters.entry(tenant_id).or_insert(0);
        *counter += 1;
        ResourceId::new(*counter)
    }
}

#[async_trait]
impl SyncStateStore for MemorySyncStore {
    async fn upsert_topic(&self, mut topic: SotTopic) -> Result<SotTopic> {
        let mut inner = self.inner.write().await;
        let existing = inner.topics.iter().position(|t| {
            t.tenant_id == topic.tenant_id
                && t.name == topic.name
                && t.environment_id == topic.environment_id
        });
        match existing {
            Some(i) => {
                topic.resource_id = inner.topics[i].resource_id;
                inner.topics[i] = topic.clone();
            }
            None => {
                topic.resource_id = inner.next_resource_id(topic.tenant_id);
                inner.topics.push(topic.clone());
            }
        }
        Ok(topic)
    }

    async fn remove_topic(
        &self,
        tenant_id: TenantId,
        name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.topics.retain(|t| {
            !(t.tenant_id == tenant_id && t.name == name && &t.environment_id == environment_id)
        });
        Ok(())
    }

    async fn find_topic(
        &self,
        tenant_id: TenantId,
        name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Option<SotTopic>> {
        let inner = self.inner.read().await;
        Ok(inner
            .topics
            .iter()
            .find(|t| {
                t.tenant_id == tenant_id && t.name == name && &t.environment_id == environment_id
            })
            .cloned())
    }

    async fn topics_by_name(&self, tenant_id: TenantId, name: &str) -> Result<Vec<SotTopic>> {
        let inner = self.inner.read().await;
        Ok(inner
            .topics
            .iter()
            .filter(|t| t.tenant_id == tenant_id && t.name == name)
            .cloned()
            .collect())
    }

    async fn list_topics(&self, tenant_id: TenantId) -> Result<Vec<SotTopic>> {
        let inner = self.inner.read().await;
        Ok(inner
            .topics
            .iter()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn reassign_topic_owner(
        &self,
        tenant_id: TenantId,
        name: &str,
        team_id: TeamId,
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut touched = 0;
        for topic in inner
            .topics
            .iter_mut()
            .filter(|t| t.tenant_id == tenant_id && t.name == name)
        {
            topic.team_id = team_id;
            touched += 1;
        }
        Ok(touched)
    }

    async fn update_topic_documentation(
        &self,
        tenant_id: TenantId,
        name: &str,
        documentation: Option<String>,
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut touched = 0;
        for topic in inner
            .topics
            .iter_mut()
            .filter(|t| t.tenant_id == tenant_id && t.name == name)
        {
            topic.documentation = documentation.clone();
            touched += 1;
        }
        Ok(touched)
    }

    async fn upsert_acl(&self, mut acl: SotAcl) -> Result<SotAcl> {
        let mut inner = self.inner.write().await;
        let existing = inner.acls.iter().position(|a| {
            a.tenant_id == acl.tenant_id
                && a.topic_name == acl.topic_name
                && a.environment_id == acl.environment_id
                && a.permission == acl.permission
                && a.binding == acl.binding
        });
        match existing {
            Some(i) => {
                acl.resource_id = inner.acls[i].resource_id;
                inner.acls[i] = acl.clone();
            }
            None => {
                acl.resource_id = inner.next_resource_id(acl.tenant_id);
                inner.acls.push(acl.clone());
            }
        }
        Ok(acl)
    }

    async fn find_acl(
        &self,
        tenant_id: TenantId,
        topic_name: &str,
        environment_id: &EnvironmentId,
        permission: AclPermission,
        binding: &AclBinding,
    ) -> Result<Option<SotAcl>> {
        let inner = self.inner.read().await;
        Ok(inner
            .acls
            .iter()
            .find(|a| {
                a.tenant_id == tenant_id
                    && a.topic_name == topic_name
                    && &a.environment_id == environment_id
                    && a.permission == permission
                    && &a.binding == binding
            })
            .cloned())
    }

    async fn remove_acl(
        &self,
        tenant_id: TenantId,
        topic_name: &str,
        environment_id: &EnvironmentId,
        permission: AclPermission,
        binding: &AclBinding,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.acls.retain(|a| {
            !(a.tenant_id == tenant_id
                && a.topic_name == topic_name
                && &a.environment_id == environment_id
                && a.permission == permission
                && &a.binding == binding)
        });
        Ok(())
    }

    async fn acls_for_topic(
        &self,
        tenant_id: TenantId,
        topic_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<SotAcl>> {
        let inner = self.inner.read().await;
        Ok(inner
            .acls
            .iter()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && a.topic_name == topic_name
                    && &a.environment_id == environment_id
            })
            .cloned()
            .collect())
    }

    async fn upsert_schema_version(&self, mut schema: SotSchemaVersion) -> Result<SotSchemaVersion> {
        let mut inner = self.inner.write().await;
        let existing = inner.schemas.iter().position(|s| {
            s.tenant_id == schema.tenant_id
                && s.topic_name == schema.topic_name
                && s.environment_id == schema.environment_id
                && s.version == schema.version
        });
        match existing {
            Some(i) => {
                schema.resource_id = inner.schemas[i].resource_id;
                inner.schemas[i] = schema.clone();
            }
            None => {
                schema.resource_id = inner.next_resource_id(schema.tenant_id);
                inner.schemas.push(schema.clone());
            }
        }
        Ok(schema)
    }

    async fn schema_versions(
        &self,
        tenant_id: TenantId,
        topic_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<SotSchemaVersion>> {
        let inner = self.inner.read().await;
        let mut versions = inner
            .schemas
            .iter()
            .filter(|s| {
                s.tenant_id == tenant_id
                    && s.topic_name == topic_name
                    && &s.environment_id == environment_id
            })
            .cloned()
            .collect::<Vec<_>>();
        versions.sort_by_key(|s| s.version);
        Ok(versions)
    }

    async fn upsert_connector(&self, mut connector: SotConnector) -> Result<SotConnector> {
        let mut inner = self.inner.write().await;
        let existing = inner.connectors.iter().position(|c| {
            c.tenant_id == connector.tenant_id
                && c.name == connector.name
                && c.environment_id == connector.environment_id
        });
        match existing {
            Some(i) => {
                connector.resource_id = inner.connectors[i].resource_id;
                inner.connectors[i] = connector.clone();
            }
            None => {
                connector.resource_id = inner.next_resource_id(connector.tenant_id);
                inner.connectors.push(connector.clone());
            }
        }
        Ok(connector)
    }

    async fn remove_connector(
        &self,
        tenant_id: TenantId,
        name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.connectors.retain(|c| {
            !(c.tenant_id == tenant_id && c.name == name && &c.environment_id == environment_id)
        });
        Ok(())
    }

    async fn find_connector(
        &self,
        tenant_id: TenantId,
        name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Option<SotConnector>> {
        let inner = self.inner.read().await;
        Ok(inner
            .connectors
            .iter()
            .find(|c| {
                c.tenant_id == tenant_id && c.name == name && &c.environment_id == environment_id
            })
            .cloned())
    }

    async fn list_connectors(&self, tenant_id: TenantId) -> Result<Vec<SotConnector>> {
        let inner = self.inner.read().await;
        Ok(inner
            .connectors
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn reassign_connector_owner(
        &self,
        tenant_id: TenantId,
        name: &str,
        team_id: TeamId,
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut touched = 0;
        for connector in inner
            .connectors
            .iter_mut()
            .filter(|c| c.tenant_id == tenant_id && c.name == name)
        {
            connector.team_id = team_id;
            touched += 1;
        }
        Ok(touched)
    }

    async fn update_connector_documentation(
        &self,
        tenant_id: TenantId,
        name: &str,
        documentation: Option<String>,
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut touched = 0;
        for connector in inner
            .connectors
            .iter_mut()
            .filter(|c| c.tenant_id == tenant_id && c.name == name)
        {
            connector.documentation = documentation.clone();
            touched += 1;
        }
        Ok(touched)
    }
}
