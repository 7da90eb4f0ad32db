use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::{
    api::{GovernanceError, Result},
    service::{ClusterConfig, RemoteOperation},
    CONFIG,
};

use super::{
    payload::{acl_payload, ClusterConnectorPayload, ClusterSchemaPayload, ClusterTopicPayload},
    token::TokenSigner,
    RemoteClusterStatus, RemoteOutcome, RemoteTopic,
};

const PATH_TOPICS_CREATE: &str = "topics/create";
const PATH_TOPICS_UPDATE: &str = "topics/update";
const PATH_TOPICS_DELETE: &str = "topics/delete";
const PATH_ACLS_CREATE: &str = "acls/create";
const PATH_ACLS_DELETE: &str = "acls/delete";
const PATH_SCHEMAS_REGISTER: &str = "schemas/register";
const PATH_CONNECTORS_CREATE: &str = "connectors/create";
const PATH_CONNECTORS_UPDATE: &str = "connectors/update";
const PATH_CONNECTORS_DELETE: &str = "connectors/delete";

const API_RESULT_SUCCESS: &str = "success";

#[derive(Debug, thiserror::Error)]
pub(crate) enum RemoteCallError {
    #[error("transport failure calling the cluster API")]
    Transport(#[source] reqwest::Error),
    #[error("cluster API answered HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("cluster API rejected the operation: {message}")]
    Rejected { message: String },
}

impl From<RemoteCallError> for GovernanceError {
    fn from(err: RemoteCallError) -> Self {
        GovernanceError::remote_execution("Cluster API call failed.").with_source(err)
    }
}

/// Response envelope used by the cluster-operations service for mutations.
#[derive(Debug, Clone, Deserialize)]
struct ClusterApiResponse {
    result: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// `ClusterGateway` over the remote cluster-operations REST service. Each
/// outbound call carries a freshly minted short-lived bearer token; calls
/// are synchronous and never retried here.
#[derive(Debug, Clone)]
pub struct RestClusterGateway {
    client: reqwest::Client,
    base_url: Url,
    signer: TokenSigner,
}

impl RestClusterGateway {
    /// Builds the gateway from process configuration.
    ///
    /// # Errors
    /// `Configuration` when the shared secret is unset, the base URL does
    /// not parse, or the mTLS identity bundle cannot be loaded. All of
    /// these fail here, at startup, never on the first approval.
    pub fn from_config() -> Result<Self> {
        let cluster_api = &CONFIG.cluster_api;
        let signer = TokenSigner::from_config(cluster_api)?;

        let mut base = cluster_api.url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            GovernanceError::configuration(format!(
                "Cluster API URL `{}` is not a valid URL.",
                cluster_api.url
            ))
            .with_source(e)
        })?;

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(cluster_api.timeout_secs))
            .pool_max_idle_per_host(cluster_api.pool_max_idle);

        if let Some(pem_path) = &cluster_api.client_identity_pem {
            let pem = std::fs::read(pem_path).map_err(|e| {
                GovernanceError::configuration(format!(
                    "Could not read client identity bundle `{}`.",
                    pem_path.display()
                ))
                .with_source(e)
            })?;
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                GovernanceError::configuration(format!(
                    "Client identity bundle `{}` is not a usable PEM.",
                    pem_path.display()
                ))
                .with_source(e)
            })?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|e| {
            GovernanceError::configuration("Could not build the cluster API HTTP client.")
                .with_source(e)
        })?;

        Ok(Self {
            client,
            base_url,
            signer,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            GovernanceError::internal(format!("Could not build cluster API URL for `{path}`."))
                .with_source(e)
        })
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<ClusterApiResponse> {
        let url = self.endpoint(path)?;
        let token = self.signer.bearer_token()?;
        tracing::debug!(%url, "Calling cluster API");

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(RemoteCallError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteCallError::Status { status, body }.into());
        }

        let envelope: ClusterApiResponse = response
            .json()
            .await
            .map_err(RemoteCallError::Transport)?;
        if envelope.result != API_RESULT_SUCCESS {
            let message = envelope
                .message
                .unwrap_or_else(|| envelope.result.clone());
            return Err(RemoteCallError::Rejected { message }.into());
        }
        Ok(envelope)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        let token = self.signer.bearer_token()?;
        tracing::debug!(%url, "Querying cluster API");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(RemoteCallError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteCallError::Status { status, body }.into());
        }
        Ok(response.json().await.map_err(RemoteCallError::Transport)?)
    }
}

fn cluster_query(cluster: &ClusterConfig) -> Vec<(&'static str, &str)> {
    vec![
        ("env", cluster.bootstrap_servers.as_str()),
        ("protocol", protocol_str(cluster)),
        ("clusterName", cluster.cluster_name.as_str()),
    ]
}

fn protocol_str(cluster: &ClusterConfig) -> &'static str {
    match cluster.protocol {
        crate::service::ClusterProtocol::Plaintext => "PLAINTEXT",
        crate::service::ClusterProtocol::Ssl => "SSL",
    }
}

fn remote_id_from(data: Option<&serde_json::Value>) -> Option<String> {
    data?.get("aivenAclId")?.as_str().map(ToString::to_string)
}

#[async_trait]
impl super::ClusterGateway for RestClusterGateway {
    async fn execute(
        &self,
        cluster: &ClusterConfig,
        operation: &RemoteOperation,
    ) -> Result<RemoteOutcome> {
        let envelope = match operation {
            RemoteOperation::CreateTopic {
                name,
                partitions,
                replication_factor,
                advanced_config,
            } => {
                let mut payload = ClusterTopicPayload::new(cluster, name);
                payload.partitions = Some(*partitions);
                payload.replication_factor = Some(*replication_factor);
                if !advanced_config.is_empty() {
                    payload.advanced_topic_configuration = Some(advanced_config);
                }
                self.post(PATH_TOPICS_CREATE, &payload).await?
            }
            RemoteOperation::UpdateTopic {
                name,
                partitions,
                replication_factor,
            } => {
                let mut payload = ClusterTopicPayload::new(cluster, name);
                payload.partitions = Some(*partitions);
                payload.replication_factor = Some(*replication_factor);
                self.post(PATH_TOPICS_UPDATE, &payload).await?
            }
            RemoteOperation::DeleteTopic { name } => {
                let payload = ClusterTopicPayload::new(cluster, name);
                self.post(PATH_TOPICS_DELETE, &payload).await?
            }
            RemoteOperation::CreateAcl(spec) => {
                let payload = acl_payload(cluster, spec, crate::service::OperationType::Create)?;
                self.post(PATH_ACLS_CREATE, &payload).await?
            }
            RemoteOperation::DeleteAcl(spec) => {
                let payload = acl_payload(cluster, spec, crate::service::OperationType::Delete)?;
                self.post(PATH_ACLS_DELETE, &payload).await?
            }
            RemoteOperation::RegisterSchema {
                topic_name,
                schema_json,
                force_register,
            } => {
                let payload = ClusterSchemaPayload {
                    env: &cluster.bootstrap_servers,
                    protocol: cluster.protocol,
                    cluster_name: &cluster.cluster_name,
                    topic_name,
                    full_schema: schema_json,
                    force_register: *force_register,
                };
                self.post(PATH_SCHEMAS_REGISTER, &payload).await?
            }
            RemoteOperation::CreateConnector { name, config_json } => {
                let payload = ClusterConnectorPayload {
                    env: &cluster.bootstrap_servers,
                    protocol: cluster.protocol,
                    cluster_name: &cluster.cluster_name,
                    connector_name: name,
                    connector_config: config_json,
                };
                self.post(PATH_CONNECTORS_CREATE, &payload).await?
            }
            RemoteOperation::UpdateConnector { name, config_json } => {
                let payload = ClusterConnectorPayload {
                    env: &cluster.bootstrap_servers,
                    protocol: cluster.protocol,
                    cluster_name: &cluster.cluster_name,
                    connector_name: name,
                    connector_config: config_json,
                };
                self.post(PATH_CONNECTORS_UPDATE, &payload).await?
            }
            RemoteOperation::DeleteConnector { name } => {
                let payload = ClusterConnectorPayload {
                    env: &cluster.bootstrap_servers,
                    protocol: cluster.protocol,
                    cluster_name: &cluster.cluster_name,
                    connector_name: name,
                    connector_config: "",
                };
                self.post(PATH_CONNECTORS_DELETE, &payload).await?
            }
        };

        Ok(RemoteOutcome {
            remote_id: remote_id_from(envelope.data.as_ref()),
        })
    }

    async fn cluster_status(&self, cluster: &ClusterConfig) -> Result<RemoteClusterStatus> {
        self.get("cluster/status", &cluster_query(cluster)).await
    }

    async fn list_topics(&self, cluster: &ClusterConfig) -> Result<Vec<RemoteTopic>> {
        self.get("topics", &cluster_query(cluster)).await
    }

    async fn list_acls(
        &self,
        cluster: &ClusterConfig,
    ) -> Result<Vec<BTreeMap<String, String>>> {
        self.get("acls", &cluster_query(cluster)).await
    }

    async fn schema_versions(
        &self,
        cluster: &ClusterConfig,
        topic_name: &str,
    ) -> Result<BTreeMap<u32, serde_json::Value>> {
        let mut query = cluster_query(cluster);
        query.push(("topicName", topic_name));
        self.get("schemas", &query).await
    }

    async fn connector_status(
        &self,
        cluster: &ClusterConfig,
        connector_name: &str,
    ) -> Result<serde_json::Value> {
        let mut query = cluster_query(cluster);
        query.push(("connectorName", connector_name));
        self.get("connectors/status", &query).await
    }

    async fn consumer_offsets(
        &self,
        cluster: &ClusterConfig,
        topic_name: &str,
        consumer_group: &str,
    ) -> Result<Vec<BTreeMap<String, String>>> {
        let mut query = cluster_query(cluster);
        query.push(("topicName", topic_name));
        query.push(("consumerGroupId", consumer_group));
        self.get("consumers/offsets", &query).await
    }

    async fn topic_events(
        &self,
        cluster: &ClusterConfig,
        topic_name: &str,
        consumer_group: &str,
        offset_id: &str,
    ) -> Result<BTreeMap<String, String>> {
        let mut query = cluster_query(cluster);
        query.push(("topicName", topic_name));
        query.push(("consumerGroupId", consumer_group));
        query.push(("offsetId", offset_id));
        self.get("topics/events", &query).await
    }

    async fn jmx_metrics(
        &self,
        jmx_url: &str,
        object_name: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.get(
            "metrics/jmx",
            &[("jmxUrl", jmx_url), ("objectName", object_name)],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_id_extraction() {
        let data = serde_json::json!({ "aivenAclId": "acl44abc" });
        assert_eq!(remote_id_from(Some(&data)), Some("acl44abc".to_string()));
        assert_eq!(remote_id_from(None), None);
        assert_eq!(remote_id_from(Some(&serde_json::json!({}))), None);
    }

    #[test]
    fn test_envelope_failure_detection() {
        let envelope: ClusterApiResponse = serde_json::from_str(
            r#"{"result":"failure","message":"Topic already exists."}"#,
        )
        .unwrap();
        assert_ne!(envelope.result, API_RESULT_SUCCESS);
        assert_eq!(envelope.message.as_deref(), Some("Topic already exists."));
    }

    #[test]
    fn test_rejection_maps_to_remote_execution() {
        let err: GovernanceError = RemoteCallError::Rejected {
            message: "Topic already exists.".to_string(),
        }
        .into();
        assert_eq!(err.kind, crate::api::ErrorKind::RemoteExecution);
        assert!(format!("{err}").contains("Topic already exists."));
    }
}
