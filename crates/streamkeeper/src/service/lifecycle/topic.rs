use std::collections::BTreeMap;

use crate::{
    api::{GovernanceError, Result},
    request_context::RequestContext,
    service::{
        cache, config_keys, paginate, AuthorizationGuard, Capability, ClusterGateway,
        EnvironmentId, NewRequest, Notifier, OperationType, Page, RemoteClusterStatus,
        RemoteOperation, Request, RequestId, RequestLedger, ResourceId, ResourceKind, SotTopic,
        SyncStateStore, TenantDirectory, RESOURCES_PAGE_SIZE,
    },
};

use super::{advanced_config_of, config_i16, config_i32, RequestLifecycleService};

/// Payload of a topic create, update or promote submission.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct TopicRequestInput {
    #[builder(setter(into))]
    pub topic_name: String,
    #[builder(setter(into))]
    pub environment_id: EnvironmentId,
    pub partitions: i32,
    pub replication_factor: i16,
    #[builder(default)]
    pub advanced_config: BTreeMap<String, String>,
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

    pub async fn request_topic_create(
        &self,
        ctx: &RequestContext,
        input: TopicRequestInput,
    ) -> Result<Request> {
        validate_topic_name(&input.topic_name)?;
        validate_topic_sizing(input.partitions, input.replication_factor)?;
        self.state
            .authz
            .require_environment(ctx, &input.environment_id)
            .await?;
        if self
            .state
            .sot
            .find_topic(ctx.tenant_id(), &input.topic_name, &input.environment_id)
            .await?
            .is_some()
        {
            return Err(GovernanceError::validation(format!(
                "Topic '{}' already exists in this environment.",
                input.topic_name
            )));
        }

        self.submit(ctx, new_topic_request(ctx, &input, OperationType::Create))
            .await
    }

    /// Creates the topic in a new environment from its configuration in
    /// `source_environment_id`. Approval routes to the create call.
    pub async fn request_topic_promote(
        &self,
        ctx: &RequestContext,
        topic_name: &str,
        source_environment_id: &EnvironmentId,
        target_environment_id: &EnvironmentId,
        remarks: Option<String>,
    ) -> Result<Request> {
        self.state
            .authz
            .require_environment(ctx, source_environment_id)
            .await?;
        let source = self
            .owned_topic(ctx, topic_name, source_environment_id)
            .await?;
        if self
            .state
            .sot
            .find_topic(ctx.tenant_id(), topic_name, target_environment_id)
            .await?
            .is_some()
        {
            return Err(GovernanceError::validation(format!(
                "Topic '{topic_name}' already exists in the target environment."
            )));
        }

        let input = TopicRequestInput {
            topic_name: source.name,
            environment_id: target_environment_id.clone(),
            partitions: source.partitions,
            replication_factor: source.replication_factor,
            advanced_config: source.advanced_config,
            description: source.description,
            remarks,
        };
        self.submit(ctx, new_topic_request(ctx, &input, OperationType::Promote))
            .await
    }

    pub async fn request_topic_update(
        &self,
        ctx: &RequestContext,
        input: TopicRequestInput,
    ) -> Result<Request> {
        validate_topic_sizing(input.partitions, input.replication_factor)?;
        self.state
            .authz
            .require_environment(ctx, &input.environment_id)
            .await?;
        let current = self
            .owned_topic(ctx, &input.topic_name, &input.environment_id)
            .await?;

        let mut new_request = new_topic_request(ctx, &input, OperationType::Update);
        // The request carries the resource's audit trail so the approval
        // entry extends it rather than restarting it.
        new_request.history = current.history;
        self.submit(ctx, new_request).await
    }

    /// Submits a topic deletion. Rejected while the topic still has live
    /// ACL subscriptions; no request record is created in that case.
    pub async fn request_topic_delete(
        &self,
        ctx: &RequestContext,
        topic_name: &str,
        environment_id: &EnvironmentId,
        remarks: Option<String>,
    ) -> Result<Request> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let current = self.owned_topic(ctx, topic_name, environment_id).await?;
        let dependents = self
            .state
            .sot
            .acls_for_topic(ctx.tenant_id(), topic_name, environment_id)
            .await?;
        if !dependents.is_empty() {
            return Err(GovernanceError::has_dependents(format!(
                "Topic '{topic_name}' has {} live subscription(s); delete those first.",
                dependents.len()
            )));
        }

        // Deletion executes with the topic's current sizing.
        let input = TopicRequestInput {
            topic_name: current.name,
            environment_id: environment_id.clone(),
            partitions: current.partitions,
            replication_factor: current.replication_factor,
            advanced_config: BTreeMap::new(),
            description: current.description,
            remarks,
        };
        let mut new_request = new_topic_request(ctx, &input, OperationType::Delete);
        new_request.history = current.history;
        self.submit(ctx, new_request).await
    }

    /// Requests ownership transfer of a topic another team owns. The
    /// approval falls to the owning team; no remote call is involved.
    pub async fn request_topic_claim(
        &self,
        ctx: &RequestContext,
        topic_name: &str,
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
            .find_topic(ctx.tenant_id(), topic_name, environment_id)
            .await?
            .ok_or_else(|| {
                GovernanceError::not_found(format!("Topic '{topic_name}' not found."))
            })?;
        if current.team_id == ctx.team_id() {
            return Err(GovernanceError::validation(format!(
                "Topic '{topic_name}' is already owned by your team."
            )));
        }

        let new_request = NewRequest::builder()
            .tenant_id(ctx.tenant_id())
            .kind(ResourceKind::Topic)
            .resource_name(topic_name)
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

    pub async fn approve_topic_request(
        &self,
        ctx: &RequestContext,
        id: RequestId,
    ) -> Result<Request> {
        let request = self.begin_approval(ctx, id, ResourceKind::Topic).await?;
        let entry = self.approval_audit_entry(ctx, &request).await?;
        let mut history = request.history.clone();
        history.push(entry.clone());

        match request.operation {
            OperationType::Create | OperationType::Promote => {
                let cluster = self.cluster(ctx, &request.environment_id).await?;
                let operation = RemoteOperation::CreateTopic {
                    name: request.resource_name.clone(),
                    partitions: config_i32(&request, config_keys::PARTITIONS)?,
                    replication_factor: config_i16(&request, config_keys::REPLICATION_FACTOR)?,
                    advanced_config: advanced_config_of(&request)?,
                };
                self.state.gateway.execute(&cluster, &operation).await?;

                self.state
                    .sot
                    .upsert_topic(SotTopic {
                        resource_id: ResourceId::new(0),
                        tenant_id: ctx.tenant_id(),
                        name: request.resource_name.clone(),
                        environment_id: request.environment_id.clone(),
                        team_id: request.requesting_team_id,
                        partitions: config_i32(&request, config_keys::PARTITIONS)?,
                        replication_factor: config_i16(&request, config_keys::REPLICATION_FACTOR)?,
                        advanced_config: advanced_config_of(&request)?,
                        description: request.description.clone(),
                        documentation: None,
                        history: history.clone(),
                    })
                    .await?;
            }
            OperationType::Update => {
                let cluster = self.cluster(ctx, &request.environment_id).await?;
                let partitions = config_i32(&request, config_keys::PARTITIONS)?;
                let replication_factor = config_i16(&request, config_keys::REPLICATION_FACTOR)?;
                let operation = RemoteOperation::UpdateTopic {
                    name: request.resource_name.clone(),
                    partitions,
                    replication_factor,
                };
                self.state.gateway.execute(&cluster, &operation).await?;

                let mut current = self
                    .state
                    .sot
                    .find_topic(ctx.tenant_id(), &request.resource_name, &request.environment_id)
                    .await?
                    .ok_or_else(|| {
                        GovernanceError::not_found(format!(
                            "Topic '{}' not found.",
                            request.resource_name
                        ))
                    })?;
                current.partitions = partitions;
                current.replication_factor = replication_factor;
                if request.description.is_some() {
                    current.description = request.description.clone();
                }
                current.history = history.clone();
                self.state.sot.upsert_topic(current).await?;
            }
            OperationType::Delete => {
                let cluster = self.cluster(ctx, &request.environment_id).await?;
                let operation = RemoteOperation::DeleteTopic {
                    name: request.resource_name.clone(),
                };
                self.state.gateway.execute(&cluster, &operation).await?;
                self.state
                    .sot
                    .remove_topic(ctx.tenant_id(), &request.resource_name, &request.environment_id)
                    .await?;
            }
            OperationType::Claim => {
                let reassigned = self
                    .state
                    .sot
                    .reassign_topic_owner(
                        ctx.tenant_id(),
                        &request.resource_name,
                        request.requesting_team_id,
                    )
                    .await?;
                if reassigned == 0 {
                    return Err(GovernanceError::not_found(format!(
                        "Topic '{}' not found.",
                        request.resource_name
                    )));
                }
            }
        }

        self.finalize_approved(ctx, &request, entry).await
    }

    // ---------------- Reads and direct SOT updates ----------------

    /// Free-text documentation update on an owned topic, applied directly
    /// to the source of truth without a request.
    pub async fn update_topic_documentation(
        &self,
        ctx: &RequestContext,
        topic_name: &str,
        documentation: Option<String>,
    ) -> Result<()> {
        self.state
            .authz
            .require(ctx, Capability::UpdateDocumentation)
            .await?;
        let rows = self
            .state
            .sot
            .topics_by_name(ctx.tenant_id(), topic_name)
            .await?;
        let Some(first) = rows.first() else {
            return Err(GovernanceError::not_found(format!(
                "Topic '{topic_name}' not found."
            )));
        };
        if first.team_id != ctx.team_id() {
            return Err(GovernanceError::not_authorized(format!(
                "Topic '{topic_name}' is owned by another team."
            )));
        }

        self.state
            .sot
            .update_topic_documentation(ctx.tenant_id(), topic_name, documentation)
            .await?;
        cache::invalidate_tenant_metadata(ctx.tenant_id());
        Ok(())
    }

    /// Topic overview across the caller's environments. Name order, page
    /// size 21, served from the tenant metadata cache.
    pub async fn list_topic_overview(
        &self,
        ctx: &RequestContext,
        page: u32,
        search: Option<&str>,
    ) -> Result<Page<SotTopic>> {
        let allowed = self.state.authz.allowed_environments(ctx).await?;
        let cached = cache::topics_cached(&self.state.sot, ctx.tenant_id()).await?;

        let needle = search.map(str::to_lowercase);
        let mut topics = cached
            .iter()
            .filter(|t| allowed.contains(&t.environment_id))
            .filter(|t| {
                needle.as_deref().is_none_or(|needle| {
                    t.name.to_lowercase().contains(needle)
                        || t.documentation
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                })
            })
            .cloned()
            .collect::<Vec<_>>();
        topics.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.environment_id.cmp(&b.environment_id))
        });
        Ok(paginate(topics, page, RESOURCES_PAGE_SIZE))
    }

    /// Pulls the topics present on the real cluster into the source of
    /// truth. Rows already mirrored keep their owning team; new rows land
    /// with the caller's team. Returns the number of rows written.
    pub async fn sync_topics_from_cluster(
        &self,
        ctx: &RequestContext,
        environment_id: &EnvironmentId,
    ) -> Result<usize> {
        self.state.authz.require(ctx, Capability::SyncTopics).await?;
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;

        let cluster = self.cluster(ctx, environment_id).await?;
        let remote_topics = self.state.gateway.list_topics(&cluster).await?;

        let mut written = 0;
        for remote in remote_topics {
            let existing = self
                .state
                .sot
                .find_topic(ctx.tenant_id(), &remote.topic_name, environment_id)
                .await?;
            let row = match existing {
                Some(mut row) => {
                    row.partitions = remote.partitions;
                    row.replication_factor = remote.replication_factor;
                    row
                }
                None => SotTopic {
                    resource_id: ResourceId::new(0),
                    tenant_id: ctx.tenant_id(),
                    name: remote.topic_name.clone(),
                    environment_id: environment_id.clone(),
                    team_id: ctx.team_id(),
                    partitions: remote.partitions,
                    replication_factor: remote.replication_factor,
                    advanced_config: BTreeMap::new(),
                    description: None,
                    documentation: None,
                    history: Vec::new(),
                },
            };
            self.state.sot.upsert_topic(row).await?;
            written += 1;
        }
        tracing::info!(environment_id = %environment_id, written, "Synchronized topics from cluster");
        cache::invalidate_tenant_metadata(ctx.tenant_id());
        Ok(written)
    }

    pub async fn cluster_status(
        &self,
        ctx: &RequestContext,
        environment_id: &EnvironmentId,
    ) -> Result<RemoteClusterStatus> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let cluster = self.cluster(ctx, environment_id).await?;
        self.state.gateway.cluster_status(&cluster).await
    }

    pub async fn consumer_offsets(
        &self,
        ctx: &RequestContext,
        environment_id: &EnvironmentId,
        topic_name: &str,
        consumer_group: &str,
    ) -> Result<Vec<BTreeMap<String, String>>> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let cluster = self.cluster(ctx, environment_id).await?;
        self.state
            .gateway
            .consumer_offsets(&cluster, topic_name, consumer_group)
            .await
    }

    pub async fn topic_events(
        &self,
        ctx: &RequestContext,
        environment_id: &EnvironmentId,
        topic_name: &str,
        consumer_group: &str,
        offset_id: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.state
            .authz
            .require_environment(ctx, environment_id)
            .await?;
        let cluster = self.cluster(ctx, environment_id).await?;
        self.state
            .gateway
            .topic_events(&cluster, topic_name, consumer_group, offset_id)
            .await
    }

    /// Broker metrics by JMX object name. Addresses the broker directly
    /// rather than an environment, so the gate is the synchronization
    /// capability instead of an environment check.
    pub async fn jmx_metrics(
        &self,
        ctx: &RequestContext,
        jmx_url: &str,
        object_name: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.state.authz.require(ctx, Capability::SyncTopics).await?;
        self.state.gateway.jmx_metrics(jmx_url, object_name).await
    }

    // ---------------- Internals ----------------

    pub(crate) async fn owned_topic(
        &self,
        ctx: &RequestContext,
        topic_name: &str,
        environment_id: &EnvironmentId,
    ) -> Result<SotTopic> {
        let topic = self
            .state
            .sot
            .find_topic(ctx.tenant_id(), topic_name, environment_id)
            .await?
            .ok_or_else(|| {
                GovernanceError::not_found(format!("Topic '{topic_name}' not found."))
            })?;
        if topic.team_id != ctx.team_id() {
            return Err(GovernanceError::not_authorized(format!(
                "Topic '{topic_name}' is owned by another team."
            )));
        }
        Ok(topic)
    }
}

fn new_topic_request(
    ctx: &RequestContext,
    input: &TopicRequestInput,
    operation: OperationType,
) -> NewRequest {
    let mut extra_config = BTreeMap::new();
    extra_config.insert(
        config_keys::PARTITIONS.to_string(),
        input.partitions.to_string(),
    );
    extra_config.insert(
        config_keys::REPLICATION_FACTOR.to_string(),
        input.replication_factor.to_string(),
    );
    if !input.advanced_config.is_empty() {
        // Infallible: string-to-string map.
        if let Ok(raw) = serde_json::to_string(&input.advanced_config) {
            extra_config.insert(config_keys::ADVANCED_CONFIG.to_string(), raw);
        }
    }

    NewRequest::builder()
        .tenant_id(ctx.tenant_id())
        .kind(ResourceKind::Topic)
        .resource_name(input.topic_name.clone())
        .environment_id(input.environment_id.clone())
        .requesting_team_id(ctx.team_id())
        .requestor(ctx.username())
        .operation(operation)
        .extra_config(extra_config)
        .description(input.description.clone())
        .remarks(input.remarks.clone())
        .build()
}

fn validate_topic_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GovernanceError::validation("Topic name must not be empty."));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(GovernanceError::validation(format!(
            "Topic name '{name}' contains characters outside [a-zA-Z0-9._-]."
        )));
    }
    Ok(())
}

fn validate_topic_sizing(partitions: i32, replication_factor: i16) -> Result<()> {
    if partitions < 1 {
        return Err(GovernanceError::validation(
            "Partition count must be at least 1.",
        ));
    }
    if replication_factor < 1 {
        return Err(GovernanceError::validation(
            "Replication factor must be at least 1.",
        ));
    }
    Ok(())
}
