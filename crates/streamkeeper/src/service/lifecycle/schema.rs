use std::collections::BTreeMap;

use crate::{
    api::{GovernanceError, Result},
    request_context::RequestContext,
    service::{
        config_keys, AuthorizationGuard, ClusterGateway, EnvironmentId, NewRequest, Notifier,
        OperationType, RemoteOperation, Request, RequestId, RequestLedger, ResourceId,
        ResourceKind, SotSchemaVersion, SyncStateStore, TenantDirectory,
    },
};

use super::{config_flag, required_config, RequestLifecycleService};

/// Payload of a schema registration submission.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct SchemaRequestInput {
    #[builder(setter(into))]
    pub topic_name: String,
    #[builder(setter(into))]
    pub environment_id: EnvironmentId,
    #[builder(setter(into))]
    pub schema_json: String,
    #[builder(default)]
    pub force_register: bool,
    #[builder(default)]
    pub remarks: Option<String>,
}

impl<A, D, L, S, G, N> RequestLifecycleService<A, D, L, S, G, N>
where
    A: AuthorizationGuard,
    D: TenantDirectory,
    L: RequestLedger,
    S: SyncStateStore,
    G: ClusterGateway,
    N: Notifier,
{
    /// Requests registration of a new schema version on an owned topic.
    pub async fn request_schema(
        &self,
        ctx: &RequestContext,
        input: SchemaRequestInput,
    ) -> Result<Request> {
        self.state
            .authz
            .require_environment(ctx, &input.environment_id)
            .await?;
        serde_json::from_str::<serde_json::Value>(&input.schema_json).map_err(|e| {
            GovernanceError::validation("Schema payload is not valid JSON.").with_source(e)
        })?;
        self.owned_topic(ctx, &input.topic_name, &input.environment_id)
            .await?;

        let mut extra_config = BTreeMap::new();
        extra_config.insert(
            config_keys::SCHEMA_JSON.to_string(),
            input.schema_json.clone(),
        );
        if input.force_register {
            extra_config.insert(config_keys::FORCE_REGISTER.to_string(), "true".to_string());
        }

        let new_request = NewRequest::builder()
            .tenant_id(ctx.tenant_id())
            .kind(ResourceKind::Schema)
            .resource_name(input.topic_name.clone())
            .environment_id(input.environment_id.clone())
            .requesting_team_id(ctx.team_id())
            .requestor(ctx.username())
            .operation(OperationType::Create)
            .extra_config(extra_config)
            .remarks(input.remarks.clone())
            .build();
        self.submit(ctx, new_request).await
    }

    /// Registers the schema remotely and mirrors it as the next version
    /// for the topic and environment.
    pub async fn approve_schema_request(
        &self,
        ctx: &RequestContext,
        id: RequestId,
    ) -> Result<Request> {
        let request = self.begin_approval(ctx, id, ResourceKind::Schema).await?;
        let entry = self.approval_audit_entry(ctx, &request).await?;
        let cluster = self.cluster(ctx, &request.environment_id).await?;

        let schema_json = required_config(&request, config_keys::SCHEMA_JSON)?.to_string();
        let operation = RemoteOperation::RegisterSchema {
            topic_name: request.resource_name.clone(),
            schema_json: schema_json.clone(),
            force_register: config_flag(&request, config_keys::FORCE_REGISTER),
        };
        self.state.gateway.execute(&cluster, &operation).await?;

        let existing = self
            .state
            .sot
            .schema_versions(ctx.tenant_id(), &request.resource_name, &request.environment_id)
            .await?;
        let next_version = existing.iter().map(|s| s.version).max().unwrap_or(0) + 1;
        self.state
            .sot
            .upsert_schema_version(SotSchemaVersion {
                resource_id: ResourceId::new(0),
                tenant_id: ctx.tenant_id(),
                topic_name: request.resource_name.clone(),
                environment_id: request.environment_id.clone(),
                team_id: request.requesting_team_id,
                version: next_version,
                schema_json,
            })
            .await?;

        self.finalize_approved(ctx, &request, entry).await
    }

    /// Mirrored schema versions for one topic and environment, ascending.
    pub async fn schema_versions(
        &self,
        ctx: &RequestContext,
        topic_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<SotSchemaVersion>> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        self.state
            .sot
            .schema_versions(ctx.tenant_id(), topic_name, environment_id)
            .await
    }

    /// Schema versions as the registry itself reports them.
    pub async fn remote_schema_versions(
        &self,
        ctx: &RequestContext,
        topic_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<BTreeMap<u32, serde_json::Value>> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let cluster = self.cluster(ctx, environment_id).await?;
        self.state
            .gateway
            .schema_versions(&cluster, topic_name)
            .await
    }
}
