use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    api::{GovernanceError, Result},
    service::{
        AclBindingKind, AclPermission, ClusterConfig, ClusterProtocol, KafkaFlavor, OperationType,
    },
};

use super::AclSpec;

/// Wire payload for topic create/update/delete calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterTopicPayload<'a> {
    pub(crate) env: &'a str,
    pub(crate) protocol: ClusterProtocol,
    pub(crate) cluster_name: &'a str,
    pub(crate) topic_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) partitions: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) replication_factor: Option<i16>,
    /// Forwarded verbatim; the governance side never interprets individual
    /// broker settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) advanced_topic_configuration: Option<&'a BTreeMap<String, String>>,
    pub(crate) acls_native_type: KafkaFlavor,
}

impl<'a> ClusterTopicPayload<'a> {
    pub(crate) fn new(cluster: &'a ClusterConfig, topic_name: &'a str) -> Self {
        Self {
            env: &cluster.bootstrap_servers,
            protocol: cluster.protocol,
            cluster_name: &cluster.cluster_name,
            topic_name,
            partitions: None,
            replication_factor: None,
            advanced_topic_configuration: None,
            acls_native_type: cluster.flavor,
        }
    }
}

/// Wire payload for ACL create/delete calls. The populated field set
/// depends on the cluster flavor; Aiven clusters speak service-user terms
/// while native and Confluent clusters speak Kafka ACL terms.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterAclPayload {
    pub(crate) acl_native_type: KafkaFlavor,
    pub(crate) request_operation_type: OperationType,
    pub(crate) topic_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) protocol: Option<ClusterProtocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cluster_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) acl_type: Option<AclPermission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) acl_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) acl_ssl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) consumer_group: Option<String>,
    pub(crate) is_prefix_acl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) username: Option<String>,
    /// Aiven permission string, `read` or `write`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) permission: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) aiven_acl_id: Option<String>,
}

/// Translates one expanded ACL spec into the flavor-specific wire shape.
///
/// # Errors
/// `Validation` for binding kinds a flavor cannot express, `Configuration`
/// when an Aiven environment is missing its project or service name,
/// `RemoteExecution` when an Aiven delete has no remote ACL id to address.
pub(crate) fn acl_payload(
    cluster: &ClusterConfig,
    spec: &AclSpec,
    operation: OperationType,
) -> Result<ClusterAclPayload> {
    let mut payload = ClusterAclPayload {
        acl_native_type: cluster.flavor,
        request_operation_type: operation,
        topic_name: spec.topic_name.clone(),
        env: None,
        protocol: None,
        cluster_name: None,
        acl_type: None,
        acl_ip: None,
        acl_ssl: None,
        consumer_group: None,
        is_prefix_acl: spec.prefixed,
        project_name: None,
        service_name: None,
        username: None,
        permission: None,
        aiven_acl_id: None,
    };

    match cluster.flavor {
        KafkaFlavor::Native | KafkaFlavor::ConfluentCloud => {
            payload.env = Some(cluster.bootstrap_servers.clone());
            payload.protocol = Some(cluster.protocol);
            payload.cluster_name = Some(cluster.cluster_name.clone());
            payload.acl_type = Some(spec.permission);
            payload.consumer_group = spec.consumer_group.clone();
            match spec.binding.kind {
                AclBindingKind::IpAddress => payload.acl_ip = Some(spec.binding.value.clone()),
                AclBindingKind::Principal => payload.acl_ssl = Some(spec.binding.value.clone()),
            }
        }
        KafkaFlavor::Aiven => {
            if spec.binding.kind == AclBindingKind::IpAddress {
                return Err(GovernanceError::validation(
                    "Aiven clusters support service-user principals only, not IP bindings.",
                ));
            }
            payload.project_name = Some(aiven_field(cluster, cluster.project_name.as_deref(), "project name")?);
            payload.service_name = Some(aiven_field(cluster, cluster.service_name.as_deref(), "service name")?);
            payload.username = Some(spec.binding.value.clone());
            payload.permission = Some(match spec.permission {
                AclPermission::Producer => "write",
                AclPermission::Consumer => "read",
            });
            if operation == OperationType::Delete {
                let remote_acl_id = spec.remote_acl_id.clone().ok_or_else(|| {
                    GovernanceError::remote_execution(
                        "Cannot delete an Aiven ACL without its remote ACL id.",
                    )
                    .append_detail(format!("topic: {}", spec.topic_name))
                })?;
                payload.aiven_acl_id = Some(remote_acl_id);
            }
        }
    }

    Ok(payload)
}

fn aiven_field(cluster: &ClusterConfig, value: Option<&str>, what: &str) -> Result<String> {
    value.map(ToString::to_string).ok_or_else(|| {
        GovernanceError::configuration(format!(
            "Aiven environment `{}` has no {what} configured.",
            cluster.environment_id
        ))
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterSchemaPayload<'a> {
    pub(crate) env: &'a str,
    pub(crate) protocol: ClusterProtocol,
    pub(crate) cluster_name: &'a str,
    pub(crate) topic_name: &'a str,
    pub(crate) full_schema: &'a str,
    pub(crate) force_register: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterConnectorPayload<'a> {
    pub(crate) env: &'a str,
    pub(crate) protocol: ClusterProtocol,
    pub(crate) cluster_name: &'a str,
    pub(crate) connector_name: &'a str,
    /// Full connector configuration, a JSON object forwarded verbatim.
    pub(crate) connector_config: &'a str,
}
