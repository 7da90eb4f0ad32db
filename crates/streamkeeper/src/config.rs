use std::{path::PathBuf, sync::LazyLock};

use serde::{Deserialize, Serialize};

pub static CONFIG: LazyLock<DynAppConfig> = LazyLock::new(get_config);

/// Process-wide configuration, populated from `STREAMKEEPER__` prefixed
/// environment variables layered over defaults.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct DynAppConfig {
    /// Base URL of the UI login page, embedded in outgoing notifications.
    pub base_login_url: String,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub cluster_api: ClusterApiConfig,
}

impl Default for DynAppConfig {
    fn default() -> Self {
        Self {
            base_login_url: "http://localhost:9097/login".to_string(),
            cache: CacheConfig::default(),
            cluster_api: ClusterApiConfig::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: u64,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1000,
            ttl_secs: 30,
        }
    }
}

/// Connection settings for the remote cluster-operations service.
#[derive(Clone, Serialize, Deserialize, veil::Redact)]
pub struct ClusterApiConfig {
    /// Base URL of the cluster-operations service.
    pub url: String,
    /// Identity embedded as the `sub` claim of signed outbound tokens.
    pub service_identity: String,
    /// Base64-encoded shared HMAC secret. Outbound calls are impossible
    /// without it; gateway construction fails eagerly when unset.
    #[redact]
    pub base64_secret: Option<String>,
    pub timeout_secs: u64,
    pub pool_max_idle: usize,
    /// Optional PEM bundle (client certificate + key) for mutual TLS.
    pub client_identity_pem: Option<PathBuf>,
}

impl Default for ClusterApiConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9343".to_string(),
            service_identity: "streamkeeper".to_string(),
            base64_secret: None,
            timeout_secs: 25,
            pool_max_idle: 10,
            client_identity_pem: None,
        }
    }
}

fn get_config() -> DynAppConfig {
    let defaults = figment::providers::Serialized::defaults(DynAppConfig::default());

    #[cfg(not(test))]
    let prefix = "STREAMKEEPER__";
    #[cfg(test)]
    let prefix = "STREAMKEEPER_TEST__";

    let env = figment::providers::Env::prefixed(prefix).split("__");
    match figment::Figment::from(defaults).merge(env).extract() {
        Ok(config) => config,
        Err(e) => panic!("Failed to extract streamkeeper config: {e}"),
    }
}
