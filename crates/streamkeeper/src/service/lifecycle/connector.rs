use std::collections::BTreeMap;

use crate::{
    api::{GovernanceError, Result},
    request_context::RequestContext,
    service::{
        config_keys, paginate, AuthorizationGuard, Capability, ClusterGateway, EnvironmentId,
        NewRequest, Notifier, OperationType, Page, RemoteOperation, Request, RequestId,
        RequestLedger, ResourceId, ResourceKind, SotConnector, SyncStateStore, TenantDirectory,
        RESOURCES_PAGE_SIZE,
    },
};

use super::{required_config, RequestLifecycleService};

/// Payload of a connector create or update submission.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct ConnectorRequestInput {
    #[builder(setter(into))]
    pub connector_name: String,
    #[builder(setter(into))]
    pub environment_id: EnvironmentId,
    /// Full connector configuration, a JSON object forwarded verbatim.
    #[builder(setter(into))]
    pub config_json: String,
    #[builder(default)]
    pub description: Option<String>,
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
    // ---------------- Submissions ----------------

    pub async fn request_connector_create(
        &self,
        ctx: &RequestContext,
        input: ConnectorRequestInput,
    ) -> Result<Request> {
        validate_connector_config(&input.config_json)?;
        self.state
            .authz
            .require_environment(ctx, &input.environment_id)
            .await?;
        if self
            .state
            .sot
            .find_connector(ctx.tenant_id(), &input.connector_name, &input.environment_id)
            .await?
            .is_some()
        {
            return Err(GovernanceError::validation(format!(
                "Connector '{}' already exists in this environment.",
                input.connector_name
            )));
        }
        self.submit(
            ctx,
            new_connector_request(ctx, &input, OperationType::Create),
        )
        .await
    }

    pub async fn request_connector_update(
        &self,
        ctx: &RequestContext,
        input: ConnectorRequestInput,
    ) -> Result<Request> {
        validate_connector_config(&input.config_json)?;
        self.state
            .authz
            .require_environment(ctx, &input.environment_id)
            .await?;
        let current = self
            .owned_connector(ctx, &input.connector_name, &input.environment_id)
            .await?;

        let mut new_request = new_connector_request(ctx, &input, OperationType::Update);
        new_request.history = current.history;
        self.submit(ctx, new_request).await
    }

    pub async fn request_connector_delete(
        &self,
        ctx: &RequestContext,
        connector_name: &str,
        environment_id: &EnvironmentId,
        remarks: Option<String>,
    ) -> Result<Request> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let current = self
            .owned_connector(ctx, connector_name, environment_id)
            .await?;

        let input = ConnectorRequestInput {
            connector_name: current.name,
            environment_id: environment_id.clone(),
            config_json: current.config_json,
            description: None,
            remarks,
        };
        let mut new_request = new_connector_request(ctx, &input, OperationType::Delete);
        new_request.history = current.history;
        self.submit(ctx, new_request).await
    }

    pub async fn request_connector_claim(
        &self,
        ctx: &RequestContext,
        connector_name: &str,
        environment_id: &EnvironmentId,
        remarks: Option<String>,
    ) -> Result<Request> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let current = self
            .state
            .sot
            .find_connector(ctx.tenant_id(), connector_name, environment_id)
            .await?
            .ok_or_else(|| {
                GovernanceError::not_found(format!("Connector '{connector_name}' not found."))
            })?;
        if current.team_id == ctx.team_id() {
            return Err(GovernanceError::validation(format!(
                "Connector '{connector_name}' is already owned by your team."
            )));
        }

        let new_request = NewRequest::builder()
            .tenant_id(ctx.tenant_id())
            .kind(ResourceKind::Connector)
            .resource_name(connector_name)
            .environment_id(environment_id.clone())
            .requesting_team_id(ctx.team_id())
            .requestor(ctx.username())
            .operation(OperationType::Claim)
            .owning_team_id(Some(current.team_id))
            .remarks(remarks)
            .build();
        self.submit(ctx, new_request).await
    }

    // ---------------- Approval ----------------

    pub async fn approve_connector_request(
        &self,
        ctx: &RequestContext,
        id: RequestId,
    ) -> Result<Request> {
        let request = self.begin_approval(ctx, id, ResourceKind::Connector).await?;
        let entry = self.approval_audit_entry(ctx, &request).await?;
        let mut history = request.history.clone();
        history.push(entry.clone());

        match request.operation {
            OperationType::Create | OperationType::Promote => {
                let cluster = self.cluster(ctx, &request.environment_id).await?;
                let config_json =
                    required_config(&request, config_keys::CONNECTOR_CONFIG)?.to_string();
                let operation = RemoteOperation::CreateConnector {
                    name: request.resource_name.clone(),
                    config_json: config_json.clone(),
                };
                self.state.gateway.execute(&cluster, &operation).await?;

                self.state
                    .sot
                    .upsert_connector(SotConnector {
                        resource_id: ResourceId::new(0),
                        tenant_id: ctx.tenant_id(),
                        name: request.resource_name.clone(),
                        environment_id: request.environment_id.clone(),
                        team_id: request.requesting_team_id,
                        config_json,
                        documentation: None,
                        history: history.clone(),
                    })
                    .await?;
            }
            OperationType::Update => {
                let cluster = self.cluster(ctx, &request.environment_id).await?;
                let config_json =
                    required_config(&request, config_keys::CONNECTOR_CONFIG)?.to_string();
                let operation = RemoteOperation::UpdateConnector {
                    name: request.resource_name.clone(),
                    config_json: config_json.clone(),
                };
                self.state.gateway.execute(&cluster, &operation).await?;

                let mut current = self
                    .state
                    .sot
                    .find_connector(
                        ctx.tenant_id(),
                        &request.resource_name,
                        &request.environment_id,
                    )
                    .await?
                    .ok_or_else(|| {
                        GovernanceError::not_found(format!(
                            "Connector '{}' not found.",
                            request.resource_name
                        ))
                    })?;
                current.config_json = config_json;
                current.history = history.clone();
                self.state.sot.upsert_connector(current).await?;
            }
            OperationType::Delete => {
                let cluster = self.cluster(ctx, &request.environment_id).await?;
                let operation = RemoteOperation::DeleteConnector {
                    name: request.resource_name.clone(),
                };
                self.state.gateway.execute(&cluster, &operation).await?;
                self.state
                    .sot
                    .remove_connector(
                        ctx.tenant_id(),
                        &request.resource_name,
                        &request.environment_id,
                    )
                    .await?;
            }
            OperationType::Claim => {
                let reassigned = self
                    .state
                    .sot
                    .reassign_connector_owner(
                        ctx.tenant_id(),
                        &request.resource_name,
                        request.requesting_team_id,
                    )
                    .await?;
                if reassigned == 0 {
                    return Err(GovernanceError::not_found(format!(
                        "Connector '{}' not found.",
                        request.resource_name
                    )));
                }
            }
        }

        self.finalize_approved(ctx, &request, entry).await
    }

    // ---------------- Reads and direct SOT updates ----------------

    /// Free-text documentation update on an owned connector, applied
    /// directly to the source of truth without a request.
    pub async fn update_connector_documentation(
        &self,
        ctx: &RequestContext,
        connector_name: &str,
        documentation: Option<String>,
    ) -> Result<()> {
        self.state
            .authz
            .require(ctx, Capability::UpdateDocumentation)
            .await?;
        let rows = self
            .state
            .sot
            .list_connectors(ctx.tenant_id())
            .await?
            .into_iter()
            .filter(|c| c.name == connector_name)
            .collect::<Vec<_>>();
        let Some(first) = rows.first() else {
            return Err(GovernanceError::not_found(format!(
                "Connector '{connector_name}' not found."
            )));
        };
        if first.team_id != ctx.team_id() {
            return Err(GovernanceError::not_authorized(format!(
                "Connector '{connector_name}' is owned by another team."
            )));
        }

        self.state
            .sot
            .update_connector_documentation(ctx.tenant_id(), connector_name, documentation)
            .await?;
        Ok(())
    }

    /// Connector overview across the caller's environments. Name order,
    /// page size 21.
    pub async fn list_connector_overview(
        &self,
        ctx: &RequestContext,
        page: u32,
        search: Option<&str>,
    ) -> Result<Page<SotConnector>> {
        let allowed = self.state.authz.allowed_environments(ctx).await?;
        let needle = search.map(str::to_lowercase);
        let mut connectors = self
            .state
            .sot
            .list_connectors(ctx.tenant_id())
            .await?
            .into_iter()
            .filter(|c| allowed.contains(&c.environment_id))
            .filter(|c| {
                needle
                    .as_deref()
                    .is_none_or(|needle| c.name.to_lowercase().contains(needle))
            })
            .collect::<Vec<_>>();
        connectors.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.environment_id.cmp(&b.environment_id))
        });
        Ok(paginate(connectors, page, RESOURCES_PAGE_SIZE))
    }

    /// Runtime status straight from the connect cluster.
    pub async fn connector_status(
        &self,
        ctx: &RequestContext,
        environment_id: &EnvironmentId,
        connector_name: &str,
    ) -> Result<serde_json::Value> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let cluster = self.cluster(ctx, environment_id).await?;
        self.state
            .gateway
            .connector_status(&cluster, connector_name)
            .await
    }

    // ---------------- Internals ----------------

    async fn owned_connector(
        &self,
        ctx: &RequestContext,
        connector_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<SotConnector> {
        let connector = self
            .state
            .sot
            .find_connector(ctx.tenant_id(), connector_name, environment_id)
            .await?
            .ok_or_else(|| {
                GovernanceError::not_found(format!("Connector '{connector_name}' not found."))
            })?;
        if connector.team_id != ctx.team_id() {
            return Err(GovernanceError::not_authorized(format!(
                "Connector '{connector_name}' is owned by another team."
            )));
        }
        Ok(connector)
    }
}

fn new_connector_request(
    ctx: &RequestContext,
    input: &ConnectorRequestInput,
    operation: OperationType,
) -> NewRequest {
    let mut extra_config = BTreeMap::new();
    extra_config.insert(
        config_keys::CONNECTOR_CONFIG.to_string(),
        input.config_json.clone(),
    );

    NewRequest::builder()
        .tenant_id(ctx.tenant_id())
        .kind(ResourceKind::Connector)
        .resource_name(input.connector_name.clone())
        .environment_id(input.environment_id.clone())
        .requesting_team_id(ctx.team_id())
        .requestor(ctx.username())
        .operation(operation)
        .extra_config(extra_config)
        .description(input.description.clone())
        .remarks(input.remarks.clone())
        .build()
}

fn validate_connector_config(config_json: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(config_json).map_err(|e| {
        GovernanceError::validation("Connector configuration is not valid JSON.").with_source(e)
    })?;
    if !value.is_object() {
        return Err(GovernanceError::validation(
            "Connector configuration must be a JSON object.",
        ));
    }
    Ok(())
}
