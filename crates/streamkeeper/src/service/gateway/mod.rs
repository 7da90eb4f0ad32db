use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    api::Result,
    service::{AclBinding, AclPermission, ClusterConfig},
};

mod payload;
mod rest;
mod token;

pub use rest::RestClusterGateway;
pub use token::TokenSigner;

/// One IP or SSL principal binding to apply or remove remotely. A logical
/// ACL request with a multi-value list expands into one spec per value
/// before reaching the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct AclSpec {
    pub topic_name: String,
    pub permission: AclPermission,
    pub binding: AclBinding,
    pub consumer_group: Option<String>,
    pub prefixed: bool,
    /// Remote-side ACL id; required to delete on Aiven clusters.
    pub remote_acl_id: Option<String>,
}

/// Abstract mutation translated into a cluster-flavor-specific call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOperation {
    CreateTopic {
        name: String,
        partitions: i32,
        replication_factor: i16,
        advanced_config: BTreeMap<String, String>,
    },
    UpdateTopic {
        name: String,
        partitions: i32,
        replication_factor: i16,
    },
    DeleteTopic {
        name: String,
    },
    CreateAcl(AclSpec),
    DeleteAcl(AclSpec),
    RegisterSchema {
        topic_name: String,
        schema_json: String,
        force_register: bool,
    },
    CreateConnector {
        name: String,
        config_json: String,
    },
    UpdateConnector {
        name: String,
        config_json: String,
    },
    DeleteConnector {
        name: String,
    },
}

/// Result of a successful remote mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteOutcome {
    /// Remote-side identity of the created resource, when the flavor
    /// reports one (Aiven ACL ids).
    pub remote_id: Option<String>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteClusterStatus {
    Online,
    Offline,
    NotKnown,
}

/// A topic as reported by the real cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTopic {
    pub topic_name: String,
    pub partitions: i32,
    pub replication_factor: i16,
}

/// Signed, synchronous calls against the remote cluster-operations service.
/// One blocking call per operation, no internal retry; a failure surfaces
/// as `RemoteExecution` and retry is a deliberate re-invocation of the
/// approval.
#[async_trait]
pub trait ClusterGateway
where
    Self: Clone + std::fmt::Debug + Send + Sync + 'static,
{
    /// Executes one mutation against the cluster behind `cluster`.
    async fn execute(
        &self,
        cluster: &ClusterConfig,
        operation: &RemoteOperation,
    ) -> Result<RemoteOutcome>;

    // Read-side queries; no local state mutation.

    async fn cluster_status(&self, cluster: &ClusterConfig) -> Result<RemoteClusterStatus>;

    async fn list_topics(&self, cluster: &ClusterConfig) -> Result<Vec<RemoteTopic>>;

    async fn list_acls(
        &self,
        cluster: &ClusterConfig,
    ) -> Result<Vec<BTreeMap<String, String>>>;

    /// All schema versions registered for a topic, keyed by version number.
    async fn schema_versions(
        &self,
        cluster: &ClusterConfig,
        topic_name: &str,
    ) -> Result<BTreeMap<u32, serde_json::Value>>;

    async fn connector_status(
        &self,
        cluster: &ClusterConfig,
        connector_name: &str,
    ) -> Result<serde_json::Value>;

    async fn consumer_offsets(
        &self,
        cluster: &ClusterConfig,
        topic_name: &str,
        consumer_group: &str,
    ) -> Result<Vec<BTreeMap<String, String>>>;

    async fn topic_events(
        &self,
        cluster: &ClusterConfig,
        topic_name: &str,
        consumer_group: &str,
        offset_id: &str,
    ) -> Result<BTreeMap<String, String>>;

    async fn jmx_metrics(
        &self,
        jmx_url: &str,
        object_name: &str,
    ) -> Result<BTreeMap<String, String>>;
}
