use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delimiter separating multiple IP or SSL-principal values inside one
/// logical ACL request. Each delimited value becomes an independent remote
/// ACL operation and an independent source-of-truth row.
pub const ACL_VALUE_DELIMITER: &str = "<ACL>";

/// Page size for request listings. Fixed UX contract.
pub const REQUESTS_PAGE_SIZE: usize = 10;
/// Page size for resource listings. Fixed UX contract.
pub const RESOURCES_PAGE_SIZE: usize = 21;

macro_rules! define_seq_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub fn new(value: i32) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::ops::Deref for $name {
            type Target = i32;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }
    };
}

define_seq_id!(TenantId);
define_seq_id!(TeamId);
// Per-tenant sequence over ledger records.
define_seq_id!(RequestId);
// Per-tenant sequence over source-of-truth rows, independent of RequestId.
define_seq_id!(ResourceId);

/// Named deployment target (e.g. dev/tst/prd) mapped to one real cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentId(String);

impl EnvironmentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EnvironmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Created,
    Approved,
    Declined,
    /// Cancelled by the original requestor before approval. A status, not a
    /// physical removal; the record is retained for audit.
    Deleted,
}

impl RequestStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Created)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    /// Ownership transfer of an already-synced resource; no remote call.
    Claim,
    /// Create in a new environment from an already-approved configuration.
    Promote,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Topic,
    Acl,
    Schema,
    Connector,
}

/// Remote cluster-management API dialect spoken by an environment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KafkaFlavor {
    Native,
    ConfluentCloud,
    Aiven,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterProtocol {
    Plaintext,
    Ssl,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AclPermission {
    Producer,
    Consumer,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AclBindingKind {
    IpAddress,
    Principal,
}

/// A single IP address or SSL principal an ACL row is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclBinding {
    pub kind: AclBindingKind,
    pub value: String,
}

impl AclBinding {
    #[must_use]
    pub fn new(kind: AclBindingKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Splits a delimiter-separated ACL value list into its independent values.
/// Empty fragments are dropped, surrounding whitespace is trimmed and
/// repeated values collapse to one.
#[must_use]
pub fn split_acl_values(raw: &str) -> Vec<String> {
    use itertools::Itertools as _;

    raw.split(ACL_VALUE_DELIMITER)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unique()
        .map(ToString::to_string)
        .collect()
}

/// One append-only snapshot in a resource's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub team_name: String,
    pub environment_name: String,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    pub operation: OperationType,
}

/// Well-known keys of the opaque, kind-specific `extra_config` map carried
/// by requests.
pub mod config_keys {
    pub const PARTITIONS: &str = "partitions";
    pub const REPLICATION_FACTOR: &str = "replication_factor";
    /// JSON object of advanced topic configuration, forwarded verbatim.
    pub const ADVANCED_CONFIG: &str = "advanced_config";
    pub const ACL_PERMISSION: &str = "acl_permission";
    pub const ACL_BINDING_KIND: &str = "acl_binding_kind";
    /// Delimiter-separated IP or principal values, see `ACL_VALUE_DELIMITER`.
    pub const ACL_VALUES: &str = "acl_values";
    pub const CONSUMER_GROUP: &str = "consumer_group";
    pub const PREFIXED: &str = "prefixed";
    pub const SCHEMA_JSON: &str = "schema_json";
    pub const FORCE_REGISTER: &str = "force_register";
    /// Full connector configuration as a JSON object string.
    pub const CONNECTOR_CONFIG: &str = "connector_config";
}

/// An approval object in the request ledger. Structurally identical for all
/// resource kinds; kind-specific payload lives in `extra_config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub tenant_id: TenantId,
    pub kind: ResourceKind,
    pub resource_name: String,
    pub environment_id: EnvironmentId,
    pub requesting_team_id: TeamId,
    pub requestor: String,
    pub operation: OperationType,
    pub status: RequestStatus,
    pub approver: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub extra_config: BTreeMap<String, String>,
    /// Audit trail seeded from the current SOT row on UPDATE, empty on
    /// CREATE; the approval entry is appended when the request terminates.
    pub history: Vec<AuditEntry>,
    /// For CLAIM requests: the team currently owning the resource. The
    /// approval falls to this team.
    pub owning_team_id: Option<TeamId>,
    pub description: Option<String>,
    pub remarks: Option<String>,
}

impl Request {
    /// The team whose members may approve this request.
    #[must_use]
    pub fn approving_team_id(&self) -> TeamId {
        match self.operation {
            OperationType::Claim => self.owning_team_id.unwrap_or(self.requesting_team_id),
            _ => self.requesting_team_id,
        }
    }
}

/// Input to `RequestLedger::create_if_absent`. The ledger assigns the
/// per-tenant id, the CREATED status and the request timestamp.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct NewRequest {
    pub tenant_id: TenantId,
    pub kind: ResourceKind,
    #[builder(setter(into))]
    pub resource_name: String,
    pub environment_id: EnvironmentId,
    pub requesting_team_id: TeamId,
    #[builder(setter(into))]
    pub requestor: String,
    pub operation: OperationType,
    #[builder(default)]
    pub extra_config: BTreeMap<String, String>,
    #[builder(default)]
    pub history: Vec<AuditEntry>,
    #[builder(default)]
    pub owning_team_id: Option<TeamId>,
    #[builder(default)]
    pub description: Option<String>,
    #[builder(default)]
    pub remarks: Option<String>,
}

/// Terminal transition applied to a CREATED request. The ledger rejects the
/// transition when the stored status is no longer CREATED.
#[derive(Debug, Clone)]
pub struct RequestTransition {
    pub status: RequestStatus,
    pub actor: String,
    pub reason: Option<String>,
    /// Replacement audit history; `None` leaves the stored history as is.
    pub history: Option<Vec<AuditEntry>>,
}

// ---------------- Source-of-truth rows ----------------

/// A topic as believed to exist on the real cluster. Identity for
/// idempotent writes is `(name, environment_id, tenant_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SotTopic {
    pub resource_id: ResourceId,
    pub tenant_id: TenantId,
    pub name: String,
    pub environment_id: EnvironmentId,
    pub team_id: TeamId,
    pub partitions: i32,
    pub replication_factor: i16,
    #[serde(default)]
    pub advanced_config: BTreeMap<String, String>,
    pub description: Option<String>,
    pub documentation: Option<String>,
    #[serde(default)]
    pub history: Vec<AuditEntry>,
}

/// One ACL row per IP or SSL principal. Identity for idempotent writes is
/// `(topic_name, environment_id, tenant_id, permission, binding)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SotAcl {
    pub resource_id: ResourceId,
    pub tenant_id: TenantId,
    pub topic_name: String,
    pub environment_id: EnvironmentId,
    pub team_id: TeamId,
    pub permission: AclPermission,
    pub binding: AclBinding,
    pub consumer_group: Option<String>,
    pub prefixed: bool,
    /// Remote-side ACL id (Aiven flavor). Required to delete the row on an
    /// Aiven cluster.
    pub remote_acl_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SotSchemaVersion {
    pub resource_id: ResourceId,
    pub tenant_id: TenantId,
    pub topic_name: String,
    pub environment_id: EnvironmentId,
    pub team_id: TeamId,
    pub version: u32,
    pub schema_json: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SotConnector {
    pub resource_id: ResourceId,
    pub tenant_id: TenantId,
    pub name: String,
    pub environment_id: EnvironmentId,
    pub team_id: TeamId,
    pub config_json: String,
    pub documentation: Option<String>,
    #[serde(default)]
    pub history: Vec<AuditEntry>,
}

/// Cluster connection details for one environment, resolved through the
/// tenant-configuration collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub environment_id: EnvironmentId,
    pub environment_name: String,
    pub flavor: KafkaFlavor,
    pub bootstrap_servers: String,
    pub protocol: ClusterProtocol,
    pub cluster_name: String,
    /// Aiven flavor only.
    pub project_name: Option<String>,
    /// Aiven flavor only.
    pub service_name: Option<String>,
}

// ---------------- Listing ----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestScope {
    /// Requests raised by the caller.
    MyRequests,
    /// Requests raised by anyone in the caller's team.
    #[default]
    MyTeam,
}

#[derive(Debug, Clone, Default, typed_builder::TypedBuilder)]
pub struct RequestFilter {
    #[builder(default)]
    pub environment: Option<EnvironmentId>,
    #[builder(default)]
    pub status: Option<RequestStatus>,
    #[builder(default)]
    pub operation: Option<OperationType>,
    /// Case-insensitive substring match over the resource name.
    #[builder(default)]
    pub search: Option<String>,
    #[builder(default)]
    pub scope: RequestScope,
    #[builder(default = 1)]
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total_items: usize,
}

/// Slices `items` into the requested page. Page numbers are 1-based;
/// out-of-range pages clamp to the last page.
#[must_use]
pub fn paginate<T>(items: Vec<T>, page: u32, page_size: usize) -> Page<T> {
    let total_items = items.len();
    let total_pages = u32::try_from(total_items.div_ceil(page_size)).unwrap_or(u32::MAX);
    let page = page.clamp(1, total_pages.max(1));

    let start = (page as usize - 1) * page_size;
    let items = items
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect::<Vec<_>>();

    Page {
        items,
        page,
        total_pages,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_split_acl_values_handles_multi_value_lists() {
        assert_eq!(
            split_acl_values("1.1.1.1<ACL>2.2.2.2<ACL>3.3.3.3"),
            vec!["1.1.1.1", "2.2.2.2", "3.3.3.3"]
        );
        assert_eq!(split_acl_values("CN=myhost"), vec!["CN=myhost"]);
        assert_eq!(split_acl_values(" 1.1.1.1 <ACL> "), vec!["1.1.1.1"]);
        assert_eq!(
            split_acl_values("1.1.1.1<ACL>1.1.1.1<ACL>2.2.2.2"),
            vec!["1.1.1.1", "2.2.2.2"]
        );
        assert!(split_acl_values("").is_empty());
    }

    #[test]
    fn test_paginate_clamps_out_of_range_pages() {
        let items = (0..25).collect::<Vec<_>>();

        let first = paginate(items.clone(), 1, REQUESTS_PAGE_SIZE);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_pages, 3);

        let beyond = paginate(items.clone(), 99, REQUESTS_PAGE_SIZE);
        assert_eq!(beyond.page, 3);
        assert_eq!(beyond.items, (20..25).collect::<Vec<_>>());

        let zero = paginate(items, 0, REQUESTS_PAGE_SIZE);
        assert_eq!(zero.page, 1);
    }

    #[test]
    fn test_paginate_empty_input() {
        let page = paginate(Vec::<i32>::new(), 1, RESOURCES_PAGE_SIZE);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!RequestStatus::Created.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Declined.is_terminal());
        assert!(RequestStatus::Deleted.is_terminal());
    }

    #[test]
    fn test_flavor_serialization_matches_wire_contract() {
        assert_eq!(
            serde_json::to_string(&KafkaFlavor::ConfluentCloud).unwrap(),
            "\"CONFLUENT_CLOUD\""
        );
        assert_eq!(KafkaFlavor::Aiven.to_string(), "AIVEN");
    }

    #[test]
    fn test_claim_request_approving_team_is_the_owning_team() {
        let request = Request {
            id: RequestId::new(1),
            tenant_id: TenantId::new(101),
            kind: ResourceKind::Topic,
            resource_name: "orders".to_string(),
            environment_id: EnvironmentId::new("dev"),
            requesting_team_id: TeamId::new(1002),
            requestor: "dana".to_string(),
            operation: OperationType::Claim,
            status: RequestStatus::Created,
            approver: None,
            requested_at: Utc::now(),
            approved_at: None,
            decline_reason: None,
            extra_config: BTreeMap::new(),
            history: Vec::new(),
            owning_team_id: Some(TeamId::new(1001)),
            description: None,
            remarks: None,
        };
        assert_eq!(request.approving_team_id(), TeamId::new(1001));
    }
}
