use std::collections::BTreeMap;

use chrono::Utc;

use crate::{
    api::{GovernanceError, Result},
    request_context::RequestContext,
    service::{
        approve_capability, cache, config_keys, paginate, request_capability, AuditEntry,
        AuthorizationGuard, Capability, ClusterConfig, ClusterGateway, EnvironmentId, NewRequest,
        NotificationKind, Notifier, OperationType, Page, Request, RequestFilter, RequestId,
        RequestLedger, RequestScope, RequestStatus, RequestTransition, ResourceKind, State,
        SyncStateStore, TenantDirectory, REQUESTS_PAGE_SIZE,
    },
    CONFIG,
};

mod acl;
mod connector;
mod schema;
mod topic;

pub use acl::AclRequestInput;
pub use connector::ConnectorRequestInput;
pub use schema::SchemaRequestInput;
pub use topic::TopicRequestInput;

/// Orchestrates the governance workflow: submit, approve, decline, cancel
/// and list, per resource kind. Kind-specific operations live in the
/// sibling modules; the shared state machine lives here.
#[derive(Clone, Debug)]
pub struct RequestLifecycleService<A, D, L, S, G, N>
where
    A: AuthorizationGuard,
    D: TenantDirectory,
    L: RequestLedger,
    S: SyncStateStore,
    G: ClusterGateway,
    N: Notifier,
{
    state: State<A, D, L, S, G, N>,
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
    #[must_use]
    pub fn new(state: State<A, D, L, S, G, N>) -> Self {
        Self { state }
    }

    // ---------------- Kind-independent operations ----------------

    /// Withdraws a pending request. Only the original requestor may cancel,
    /// and only while the request is still CREATED.
    pub async fn cancel_request(&self, ctx: &RequestContext, id: RequestId) -> Result<Request> {
        let request = self.scoped_request(ctx, id, None).await?;
        if request.requestor != ctx.username() {
            return Err(GovernanceError::not_authorized(
                "Only the requestor may cancel a request.",
            ));
        }

        let cancelled = self
            .state
            .ledger
            .finalize(
                ctx.tenant_id(),
                id,
                RequestTransition {
                    status: RequestStatus::Deleted,
                    actor: ctx.username().to_string(),
                    reason: None,
                    history: None,
                },
            )
            .await?;
        tracing::info!(request_id = %id, "Request cancelled by requestor");
        Ok(cancelled)
    }

    /// Declines a pending request with a reason. Same authorization and
    /// staleness rules as approval, but no remote call and no self-approval
    /// restriction.
    pub async fn decline_request(
        &self,
        ctx: &RequestContext,
        id: RequestId,
        reason: &str,
    ) -> Result<Request> {
        let request = self.scoped_request(ctx, id, None).await?;
        self.state
            .authz
            .require(ctx, approve_capability(request.kind))
            .await?;
        self.ensure_approving_team(ctx, &request).await?;

        let declined = self
            .state
            .ledger
            .finalize(
                ctx.tenant_id(),
                id,
                RequestTransition {
                    status: RequestStatus::Declined,
                    actor: ctx.username().to_string(),
                    reason: Some(reason.to_string()),
                    history: None,
                },
            )
            .await?;
        tracing::info!(request_id = %id, "Request declined");
        self.notify_user(
            &declined.resource_name,
            &declined.requestor,
            NotificationKind::RequestDeclined,
            Some(reason),
        )
        .await;
        Ok(declined)
    }

    /// Requests visible to the caller: their own, or their whole team's,
    /// restricted to allowed environments. Most recent first, page size 10.
    pub async fn list_requests(
        &self,
        ctx: &RequestContext,
        kind: ResourceKind,
        filter: &RequestFilter,
    ) -> Result<Page<Request>> {
        let allowed = self.state.authz.allowed_environments(ctx).await?;
        let mut requests = self.state.ledger.list(ctx.tenant_id(), filter).await?;
        requests.retain(|r| r.kind == kind && allowed.contains(&r.environment_id));
        match filter.scope {
            RequestScope::MyRequests => requests.retain(|r| r.requestor == ctx.username()),
            RequestScope::MyTeam => {
                requests.retain(|r| r.requesting_team_id == ctx.team_id());
            }
        }
        sort_most_recent_first(&mut requests);
        Ok(paginate(requests, filter.page, REQUESTS_PAGE_SIZE))
    }

    /// Pending requests the caller may act on: those falling to the
    /// caller's team, or to any team for holders of the approve-all-teams
    /// capability. Defaults to CREATED requests when no status filter is
    /// given.
    pub async fn list_requests_for_approval(
        &self,
        ctx: &RequestContext,
        kind: ResourceKind,
        filter: &RequestFilter,
    ) -> Result<Page<Request>> {
        self.state
            .authz
            .require(ctx, approve_capability(kind))
            .await?;
        let allowed = self.state.authz.allowed_environments(ctx).await?;
        let all_teams = self
            .state
            .authz
            .is_authorized(ctx, Capability::ApproveAllTeams)
            .await?;

        let mut requests = self.state.ledger.list(ctx.tenant_id(), filter).await?;
        requests.retain(|r| r.kind == kind && allowed.contains(&r.environment_id));
        if filter.status.is_none() {
            requests.retain(|r| r.status == RequestStatus::Created);
        }
        if !all_teams {
            requests.retain(|r| r.approving_team_id() == ctx.team_id());
        }
        sort_most_recent_first(&mut requests);
        Ok(paginate(requests, filter.page, REQUESTS_PAGE_SIZE))
    }

    // ---------------- Shared internals ----------------

    /// Loads a request under the caller's environment scope. A request in
    /// an environment the caller may not see reports not-found, as does a
    /// kind mismatch; existence never leaks across scopes.
    pub(crate) async fn scoped_request(
        &self,
        ctx: &RequestContext,
        id: RequestId,
        kind: Option<ResourceKind>,
    ) -> Result<Request> {
        let not_found = || GovernanceError::not_found(format!("Request '{id}' not found."));

        let request = self
            .state
            .ledger
            .get(ctx.tenant_id(), id)
            .await?
            .ok_or_else(not_found)?;
        if kind.is_some_and(|k| k != request.kind) {
            return Err(not_found());
        }
        let allowed = self.state.authz.allowed_environments(ctx).await?;
        if !allowed.contains(&request.environment_id) {
            return Err(not_found());
        }
        Ok(request)
    }

    /// Common submission tail: capability check, environment scope, atomic
    /// duplicate-guarded insert, notification to the approving team.
    pub(crate) async fn submit(
        &self,
        ctx: &RequestContext,
        new_request: NewRequest,
    ) -> Result<Request> {
        self.state
            .authz
            .require(ctx, request_capability(new_request.kind, new_request.operation))
            .await?;
        self.state
            .authz
            .require_environment(ctx, &new_request.environment_id)
            .await?;

        let request = self.state.ledger.create_if_absent(new_request).await?;
        tracing::info!(
            request_id = %request.id,
            kind = %request.kind,
            operation = %request.operation,
            resource_name = %request.resource_name,
            "Request submitted"
        );
        self.notify_team(&request, submission_notice(request.operation), None)
            .await;
        Ok(request)
    }

    /// Common approval head: capability, scope, staleness, self-approval
    /// and approving-team checks, re-validated against stored state.
    pub(crate) async fn begin_approval(
        &self,
        ctx: &RequestContext,
        id: RequestId,
        kind: ResourceKind,
    ) -> Result<Request> {
        self.state
            .authz
            .require(ctx, approve_capability(kind))
            .await?;
        let request = self.scoped_request(ctx, id, Some(kind)).await?;
        if request.status.is_terminal() {
            return Err(GovernanceError::stale_request(format!(
                "Request '{id}' has already been processed."
            )));
        }
        if request.requestor == ctx.username() {
            return Err(GovernanceError::self_approval(
                "A request cannot be approved by its requestor.",
            ));
        }
        self.ensure_approving_team(ctx, &request).await?;
        Ok(request)
    }

    async fn ensure_approving_team(&self, ctx: &RequestContext, request: &Request) -> Result<()> {
        if request.approving_team_id() == ctx.team_id() {
            return Ok(());
        }
        self.state
            .authz
            .require(ctx, Capability::ApproveAllTeams)
            .await
    }

    /// Terminal ledger transition for a successful approval: appends the
    /// audit entry, marks APPROVED, invalidates the tenant cache and
    /// notifies the requestor.
    pub(crate) async fn finalize_approved(
        &self,
        ctx: &RequestContext,
        request: &Request,
        entry: AuditEntry,
    ) -> Result<Request> {
        let mut history = request.history.clone();
        history.push(entry);

        let approved = self
            .state
            .ledger
            .finalize(
                ctx.tenant_id(),
                request.id,
                RequestTransition {
                    status: RequestStatus::Approved,
                    actor: ctx.username().to_string(),
                    reason: None,
                    history: Some(history),
                },
            )
            .await?;
        tracing::info!(request_id = %request.id, "Request approved");

        cache::invalidate_tenant_metadata(ctx.tenant_id());
        self.notify_user(
            &approved.resource_name,
            &approved.requestor,
            NotificationKind::RequestApproved,
            None,
        )
        .await;
        Ok(approved)
    }

    pub(crate) async fn approval_audit_entry(
        &self,
        ctx: &RequestContext,
        request: &Request,
    ) -> Result<AuditEntry> {
        let team_name = self
            .state
            .directory
            .team_name(ctx.tenant_id(), request.requesting_team_id)
            .await?;
        let cluster = self.cluster(ctx, &request.environment_id).await?;
        Ok(AuditEntry {
            team_name,
            environment_name: cluster.environment_name,
            requested_by: request.requestor.clone(),
            requested_at: request.requested_at,
            approved_by: ctx.username().to_string(),
            approved_at: Utc::now(),
            operation: request.operation,
        })
    }

    pub(crate) async fn cluster(
        &self,
        ctx: &RequestContext,
        environment_id: &EnvironmentId,
    ) -> Result<ClusterConfig> {
        self.state
            .directory
            .cluster_config(ctx.tenant_id(), environment_id)
            .await
    }

    async fn notify_team(
        &self,
        request: &Request,
        kind: NotificationKind,
        detail: Option<&str>,
    ) {
        let recipients = match self
            .state
            .directory
            .team_members(request.tenant_id, request.approving_team_id())
            .await
        {
            Ok(recipients) => recipients,
            Err(error) => {
                tracing::warn!(%error, request_id = %request.id, "Could not resolve notification recipients");
                return;
            }
        };
        for recipient in recipients {
            self.state
                .notifier
                .send(
                    &request.resource_name,
                    &recipient,
                    kind,
                    detail,
                    &CONFIG.base_login_url,
                )
                .await;
        }
    }

    async fn notify_user(
        &self,
        resource_name: &str,
        recipient: &str,
        kind: NotificationKind,
        detail: Option<&str>,
    ) {
        self.state
            .notifier
            .send(resource_name, recipient, kind, detail, &CONFIG.base_login_url)
            .await;
    }
}

fn sort_most_recent_first(requests: &mut [Request]) {
    requests.sort_by(|a, b| {
        b.requested_at
            .cmp(&a.requested_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn submission_notice(operation: OperationType) -> NotificationKind {
    match operation {
        OperationType::Create => NotificationKind::CreateRequested,
        OperationType::Update => NotificationKind::UpdateRequested,
        OperationType::Delete => NotificationKind::DeleteRequested,
        OperationType::Claim => NotificationKind::ClaimRequested,
        OperationType::Promote => NotificationKind::PromoteRequested,
    }
}

// ---------------- Request payload accessors ----------------
//
// `extra_config` values are written by the submit paths; a missing or
// unparsable entry at approval time means the record was tampered with or
// written by an incompatible version, so it reports as internal rather
// than validation.

pub(crate) fn required_config<'a>(request: &'a Request, key: &str) -> Result<&'a str> {
    request
        .extra_config
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| {
            GovernanceError::internal(format!(
                "Request '{}' is missing its '{key}' payload entry.",
                request.id
            ))
        })
}

pub(crate) fn config_i32(request: &Request, key: &str) -> Result<i32> {
    let raw = required_config(request, key)?;
    raw.parse().map_err(|_| {
        GovernanceError::internal(format!(
            "Request '{}' carries a non-numeric '{key}' payload entry.",
            request.id
        ))
    })
}

pub(crate) fn config_i16(request: &Request, key: &str) -> Result<i16> {
    let raw = required_config(request, key)?;
    raw.parse().map_err(|_| {
        GovernanceError::internal(format!(
            "Request '{}' carries a non-numeric '{key}' payload entry.",
            request.id
        ))
    })
}

pub(crate) fn config_flag(request: &Request, key: &str) -> bool {
    request
        .extra_config
        .get(key)
        .is_some_and(|v| v == "true")
}

/// Advanced topic configuration, stored as a JSON object string and
/// forwarded verbatim to the cluster API.
pub(crate) fn advanced_config_of(request: &Request) -> Result<BTreeMap<String, String>> {
    match request.extra_config.get(config_keys::ADVANCED_CONFIG) {
        None => Ok(BTreeMap::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            GovernanceError::internal(format!(
                "Request '{}' carries an unparsable advanced configuration.",
                request.id
            ))
            .with_source(e)
        }),
    }
}
