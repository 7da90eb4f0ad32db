//! Cross-component scenarios wiring the lifecycle service against the
//! in-memory backends and a scripted gateway.

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use strum::VariantArray as _;

use crate::{
    api::{GovernanceError, Result},
    implementations::memory::{
        MemoryRequestLedger, MemorySyncStore, MemoryTenantDirectory, StaticAuthorizationGuard,
    },
    request_context::{Principal, RequestContext},
    service::{
        Capability, ClusterConfig, ClusterGateway, ClusterProtocol, EnvironmentId, KafkaFlavor,
        LogNotifier, RemoteClusterStatus, RemoteOperation, RemoteOutcome, RemoteTopic,
        RequestLifecycleService, ResourceId, SotTopic, State, SyncStateStore, TeamId, TenantId,
    },
};

mod listing;
mod schema_connector_flow;

pub(crate) type TestService = RequestLifecycleService<
    StaticAuthorizationGuard,
    MemoryTenantDirectory,
    MemoryRequestLedger,
    MemorySyncStore,
    FakeGateway,
    LogNotifier,
>;

/// Gateway double recording executed operations. Failures and Aiven-style
/// remote ids are scripted per test.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeGateway {
    inner: Arc<Mutex<FakeGatewayInner>>,
}

#[derive(Debug, Default)]
struct FakeGatewayInner {
    executed: Vec<(EnvironmentId, RemoteOperation)>,
    calls_seen: usize,
    fail_next: usize,
    fail_at_call: Option<usize>,
    remote_ids: Vec<String>,
    remote_topics: Vec<RemoteTopic>,
}

impl FakeGateway {
    pub(crate) fn fail_next_calls(&self, count: usize) {
        self.inner.lock().unwrap().fail_next = count;
    }

    /// Fails exactly the nth upcoming execute call (1-based, counted
    /// across the gateway's lifetime), then clears the fault.
    pub(crate) fn fail_at_call(&self, call: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_at_call = Some(inner.calls_seen + call);
    }

    pub(crate) fn queue_remote_id(&self, id: &str) {
        self.inner.lock().unwrap().remote_ids.push(id.to_string());
    }

    pub(crate) fn set_remote_topics(&self, topics: Vec<RemoteTopic>) {
        self.inner.lock().unwrap().remote_topics = topics;
    }

    pub(crate) fn executed(&self) -> Vec<RemoteOperation> {
        self.inner
            .lock()
            .unwrap()
            .executed
            .iter()
            .map(|(_, op)| op.clone())
            .collect()
    }

    pub(crate) fn executed_environments(&self) -> Vec<EnvironmentId> {
        self.inner
            .lock()
            .unwrap()
            .executed
            .iter()
            .map(|(env, _)| env.clone())
            .collect()
    }
}

#[async_trait]
impl ClusterGateway for FakeGateway {
    async fn execute(
        &self,
        cluster: &ClusterConfig,
        operation: &RemoteOperation,
    ) -> Result<RemoteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls_seen += 1;
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(GovernanceError::remote_execution(
                "Simulated cluster API failure.",
            ));
        }
        if inner.fail_at_call == Some(inner.calls_seen) {
            inner.fail_at_call = None;
            return Err(GovernanceError::remote_execution(
                "Simulated cluster API failure.",
            ));
        }
        inner
            .executed
            .push((cluster.environment_id.clone(), operation.clone()));
        let remote_id = match operation {
            RemoteOperation::CreateAcl(_) if !inner.remote_ids.is_empty() => {
                Some(inner.remote_ids.remove(0))
            }
            _ => None,
        };
        Ok(RemoteOutcome { remote_id })
    }

    async fn cluster_status(&self, _cluster: &ClusterConfig) -> Result<RemoteClusterStatus> {
        Ok(RemoteClusterStatus::Online)
    }

    async fn list_topics(&self, _cluster: &ClusterConfig) -> Result<Vec<RemoteTopic>> {
        Ok(self.inner.lock().unwrap().remote_topics.clone())
    }

    async fn list_acls(
        &self,
        _cluster: &ClusterConfig,
    ) -> Result<Vec<std::collections::BTreeMap<String, String>>> {
        Ok(Vec::new())
    }

    async fn schema_versions(
        &self,
        _cluster: &ClusterConfig,
        _topic_name: &str,
    ) -> Result<std::collections::BTreeMap<u32, serde_json::Value>> {
        Ok(std::collections::BTreeMap::new())
    }

    async fn connector_status(
        &self,
        _cluster: &ClusterConfig,
        _connector_name: &str,
    ) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "connector_state": "RUNNING" }))
    }

    async fn consumer_offsets(
        &self,
        _cluster: &ClusterConfig,
        _topic_name: &str,
        _consumer_group: &str,
    ) -> Result<Vec<std::collections::BTreeMap<String, String>>> {
        Ok(Vec::new())
    }

    async fn topic_events(
        &self,
        _cluster: &ClusterConfig,
        _topic_name: &str,
        _consumer_group: &str,
        _offset_id: &str,
    ) -> Result<std::collections::BTreeMap<String, String>> {
        Ok(std::collections::BTreeMap::new())
    }

    async fn jmx_metrics(
        &self,
        _jmx_url: &str,
        _object_name: &str,
    ) -> Result<std::collections::BTreeMap<String, String>> {
        Ok(std::collections::BTreeMap::new())
    }
}

pub(crate) struct TestEnv {
    pub(crate) service: TestService,
    pub(crate) gateway: FakeGateway,
    pub(crate) sot: MemorySyncStore,
    pub(crate) guard: StaticAuthorizationGuard,
    pub(crate) tenant_id: TenantId,
    /// Team "Falcons" requestor.
    pub(crate) alice: RequestContext,
    /// Second Falcons member; approver for Falcons requests.
    pub(crate) bob: RequestContext,
    /// Team "Ospreys" member; cross-team approver scenarios.
    pub(crate) carol: RequestContext,
}

pub(crate) const TEAM_FALCONS: i32 = 1001;
pub(crate) const TEAM_OSPREYS: i32 = 2002;

/// Distinct tenants per test keep the process-wide metadata cache from
/// bleeding between concurrently running scenarios.
static NEXT_TENANT: AtomicI32 = AtomicI32::new(101);

fn cluster(environment_id: &str, name: &str, flavor: KafkaFlavor) -> ClusterConfig {
    let aiven = flavor == KafkaFlavor::Aiven;
    ClusterConfig {
        environment_id: environment_id.into(),
        environment_name: name.to_string(),
        flavor,
        bootstrap_servers: format!("kafka-{name}:9092"),
        protocol: if aiven {
            ClusterProtocol::Ssl
        } else {
            ClusterProtocol::Plaintext
        },
        cluster_name: format!("{name}-cluster"),
        project_name: aiven.then(|| "acme-project".to_string()),
        service_name: aiven.then(|| "acme-kafka".to_string()),
    }
}

pub(crate) async fn setup() -> TestEnv {
    let tenant_id = TenantId::new(NEXT_TENANT.fetch_add(1, Ordering::Relaxed));
    let falcons = TeamId::new(TEAM_FALCONS);
    let ospreys = TeamId::new(TEAM_OSPREYS);

    let directory = MemoryTenantDirectory::default();
    directory.add_team(tenant_id, falcons, "Falcons").await;
    directory.add_team(tenant_id, ospreys, "Ospreys").await;
    directory
        .add_cluster(tenant_id, cluster("dev", "dev", KafkaFlavor::Native))
        .await;
    directory
        .add_cluster(tenant_id, cluster("tst", "tst", KafkaFlavor::Aiven))
        .await;
    directory
        .add_cluster(tenant_id, cluster("prd", "prd", KafkaFlavor::ConfluentCloud))
        .await;

    let guard = StaticAuthorizationGuard::default();
    // Every capability except approve-all-teams; team membership and
    // identity stay the binding constraints in these scenarios.
    guard
        .grant_role(
            "MEMBER",
            Capability::VARIANTS
                .iter()
                .copied()
                .filter(|c| *c != Capability::ApproveAllTeams),
        )
        .await;
    guard
        .allow_environments(
            tenant_id,
            falcons,
            ["dev".into(), "tst".into()],
        )
        .await;
    guard
        .allow_environments(
            tenant_id,
            ospreys,
            ["dev".into(), "tst".into(), "prd".into()],
        )
        .await;

    let mut contexts = ["alice", "bob", "carol"].into_iter().map(|username| {
        let team_id = if username == "carol" { ospreys } else { falcons };
        Principal {
            username: username.to_string(),
            team_id,
            tenant_id,
            role: "MEMBER".to_string(),
        }
    });
    let alice = contexts.next().map(RequestContext::new).unwrap();
    let bob = contexts.next().map(RequestContext::new).unwrap();
    let carol = contexts.next().map(RequestContext::new).unwrap();
    for ctx in [&alice, &bob, &carol] {
        directory.add_user(ctx.principal().clone()).await;
    }

    let gateway = FakeGateway::default();
    let sot = MemorySyncStore::default();
    let service = RequestLifecycleService::new(State {
        authz: guard.clone(),
        directory: directory.clone(),
        ledger: MemoryRequestLedger::default(),
        sot: sot.clone(),
        gateway: gateway.clone(),
        notifier: LogNotifier,
    });

    TestEnv {
        service,
        gateway,
        sot,
        guard,
        tenant_id,
        alice,
        bob,
        carol,
    }
}

/// Seeds a mirrored topic row directly, bypassing the workflow.
pub(crate) async fn seed_topic(
    env: &TestEnv,
    name: &str,
    environment_id: &str,
    team_id: i32,
) -> SotTopic {
    env.sot
        .upsert_topic(SotTopic {
            resource_id: ResourceId::new(0),
            tenant_id: env.tenant_id,
            name: name.to_string(),
            environment_id: environment_id.into(),
            team_id: TeamId::new(team_id),
            partitions: 2,
            replication_factor: 1,
            advanced_config: std::collections::BTreeMap::new(),
            description: None,
            documentation: None,
            history: Vec::new(),
        })
        .await
        .unwrap()
}
