use std::collections::BTreeMap;
use std::str::FromStr;

use crate::{
    api::{GovernanceError, Result},
    request_context::RequestContext,
    service::{
        config_keys, split_acl_values, AclBinding, AclBindingKind, AclPermission, AclSpec,
        AuthorizationGuard, Capability, ClusterGateway, EnvironmentId, NewRequest, Notifier,
        OperationType, RemoteOperation, Request, RequestId, RequestLedger, ResourceId,
        ResourceKind, SotAcl, SyncStateStore, TenantDirectory, ACL_VALUE_DELIMITER,
    },
};

use super::{config_flag, required_config, RequestLifecycleService};

/// Payload of an ACL create or delete submission. `values` may carry
/// several delimiter-separated IPs or principals; each becomes an
/// independent remote operation and source-of-truth row.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct AclRequestInput {
    #[builder(setter(into))]
    pub topic_name: String,
    #[builder(setter(into))]
    pub environment_id: EnvironmentId,
    pub permission: AclPermission,
    pub binding_kind: AclBindingKind,
    #[builder(setter(into))]
    pub values: String,
    #[builder(default)]
    pub consumer_group: Option<String>,
    #[builder(default)]
    pub prefixed: bool,
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

    /// Requests a subscription on an existing topic. The topic may belong
    /// to any team; the subscription belongs to the caller's.
    pub async fn request_acl_create(
        &self,
        ctx: &RequestContext,
        input: AclRequestInput,
    ) -> Result<Request> {
        self.state
            .authz
            .require_environment(ctx, &input.environment_id)
            .await?;
        let values = validated_values(&input)?;
        if self
            .state
            .sot
            .find_topic(ctx.tenant_id(), &input.topic_name, &input.environment_id)
            .await?
            .is_none()
        {
            return Err(GovernanceError::not_found(format!(
                "Topic '{}' not found.",
                input.topic_name
            )));
        }

        self.submit(ctx, new_acl_request(ctx, &input, &values, OperationType::Create))
            .await
    }

    /// Requests removal of an existing subscription. Mirrors the create
    /// shape; every delimited value must correspond to a source-of-truth
    /// row owned by the caller's team.
    pub async fn request_acl_delete(
        &self,
        ctx: &RequestContext,
        input: AclRequestInput,
    ) -> Result<Request> {
        self.state
            .authz
            .require_environment(ctx, &input.environment_id)
            .await?;
        let values = validated_values(&input)?;
        for value in &values {
            let binding = AclBinding::new(input.binding_kind, value.clone());
            let row = self
                .state
                .sot
                .find_acl(
                    ctx.tenant_id(),
                    &input.topic_name,
                    &input.environment_id,
                    input.permission,
                    &binding,
                )
                .await?
                .ok_or_else(|| {
                    GovernanceError::not_found(format!(
                        "No subscription on '{}' for '{value}'.",
                        input.topic_name
                    ))
                })?;
            if row.team_id != ctx.team_id() {
                return Err(GovernanceError::not_authorized(format!(
                    "Subscription on '{}' for '{value}' belongs to another team.",
                    input.topic_name
                )));
            }
        }

        self.submit(ctx, new_acl_request(ctx, &input, &values, OperationType::Delete))
            .await
    }

    // ---------------- Approval ----------------

    /// Approves an ACL request, expanding the multi-value list into one
    /// remote call and one source-of-truth row per value. The calls run
    /// sequentially; the first remote failure aborts with the request
    /// still CREATED, and re-approval resumes idempotently.
    pub async fn approve_acl_request(
        &self,
        ctx: &RequestContext,
        id: RequestId,
    ) -> Result<Request> {
        let request = self.begin_approval(ctx, id, ResourceKind::Acl).await?;
        let entry = self.approval_audit_entry(ctx, &request).await?;
        let cluster = self.cluster(ctx, &request.environment_id).await?;

        let permission = parse_extra::<AclPermission>(&request, config_keys::ACL_PERMISSION)?;
        let binding_kind = parse_extra::<AclBindingKind>(&request, config_keys::ACL_BINDING_KIND)?;
        let values = split_acl_values(required_config(&request, config_keys::ACL_VALUES)?);
        let consumer_group = request.extra_config.get(config_keys::CONSUMER_GROUP).cloned();
        let prefixed = config_flag(&request, config_keys::PREFIXED);

        for value in values {
            let binding = AclBinding::new(binding_kind, value);
            match request.operation {
                OperationType::Delete => {
                    let Some(row) = self
                        .state
                        .sot
                        .find_acl(
                            ctx.tenant_id(),
                            &request.resource_name,
                            &request.environment_id,
                            permission,
                            &binding,
                        )
                        .await?
                    else {
                        // Already gone, e.g. a resumed approval after a
                        // partial failure.
                        continue;
                    };
                    let spec = AclSpec {
                        topic_name: request.resource_name.clone(),
                        permission,
                        binding: binding.clone(),
                        consumer_group: row.consumer_group.clone(),
                        prefixed: row.prefixed,
                        remote_acl_id: row.remote_acl_id.clone(),
                    };
                    self.state
                        .gateway
                        .execute(&cluster, &RemoteOperation::DeleteAcl(spec))
                        .await?;
                    self.state
                        .sot
                        .remove_acl(
                            ctx.tenant_id(),
                            &request.resource_name,
                            &request.environment_id,
                            permission,
                            &binding,
                        )
                        .await?;
                }
                _ => {
                    let spec = AclSpec {
                        topic_name: request.resource_name.clone(),
                        permission,
                        binding: binding.clone(),
                        consumer_group: consumer_group.clone(),
                        prefixed,
                        remote_acl_id: None,
                    };
                    let outcome = self
                        .state
                        .gateway
                        .execute(&cluster, &RemoteOperation::CreateAcl(spec))
                        .await?;
                    self.state
                        .sot
                        .upsert_acl(SotAcl {
                            resource_id: ResourceId::new(0),
                            tenant_id: ctx.tenant_id(),
                            topic_name: request.resource_name.clone(),
                            environment_id: request.environment_id.clone(),
                            team_id: request.requesting_team_id,
                            permission,
                            binding,
                            consumer_group: consumer_group.clone(),
                            prefixed,
                            remote_acl_id: outcome.remote_id,
                        })
                        .await?;
                }
            }
        }

        self.finalize_approved(ctx, &request, entry).await
    }

    // ---------------- Reads ----------------

    /// Subscriptions currently mirrored for one topic and environment.
    pub async fn topic_subscriptions(
        &self,
        ctx: &RequestContext,
        topic_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<SotAcl>> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        self.state
            .sot
            .acls_for_topic(ctx.tenant_id(), topic_name, environment_id)
            .await
    }

    /// Raw ACL bindings as the real cluster reports them. Reserved for
    /// reconciliation views.
    pub async fn list_cluster_acls(
        &self,
        ctx: &RequestContext,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<BTreeMap<String, String>>> {
        self.state.authz.require(ctx, Capability::SyncAcls).await?;
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let cluster = self.cluster(ctx, environment_id).await?;
        self.state.gateway.list_acls(&cluster).await
    }
}

fn validated_values(input: &AclRequestInput) -> Result<Vec<String>> {
    let values = split_acl_values(&input.values);
    if values.is_empty() {
        return Err(GovernanceError::validation(
            "At least one IP or principal value is required.",
        ));
    }
    if input.permission == AclPermission::Consumer && input.consumer_group.is_none() {
        return Err(GovernanceError::validation(
            "Consumer subscriptions require a consumer group.",
        ));
    }
    Ok(values)
}

fn new_acl_request(
    ctx: &RequestContext,
    input: &AclRequestInput,
    values: &[String],
    operation: OperationType,
) -> NewRequest {
    let mut extra_config = BTreeMap::new();
    extra_config.insert(
        config_keys::ACL_PERMISSION.to_string(),
        input.permission.to_string(),
    );
    extra_config.insert(
        config_keys::ACL_BINDING_KIND.to_string(),
        input.binding_kind.to_string(),
    );
    extra_config.insert(
        config_keys::ACL_VALUES.to_string(),
        values.join(ACL_VALUE_DELIMITER),
    );
    if let Some(consumer_group) = &input.consumer_group {
        extra_config.insert(
            config_keys::CONSUMER_GROUP.to_string(),
            consumer_group.clone(),
        );
    }
    if input.prefixed {
        extra_config.insert(config_keys::PREFIXED.to_string(), "true".to_string());
    }

    NewRequest::builder()
        .tenant_id(ctx.tenant_id())
        .kind(ResourceKind::Acl)
        .resource_name(input.topic_name.clone())
        .environment_id(input.environment_id.clone())
        .requesting_team_id(ctx.team_id())
        .requestor(ctx.username())
        .operation(operation)
        .extra_config(extra_config)
        .remarks(input.remarks.clone())
        .build()
}

fn parse_extra<T>(request: &Request, key: &str) -> Result<T>
where
    T: FromStr,
{
    let raw = required_config(request, key)?;
    T::from_str(raw).map_err(|_| {
        GovernanceError::internal(format!(
            "Request '{}' carries an unknown '{key}' payload entry.",
            request.id
        ))
    })
}
