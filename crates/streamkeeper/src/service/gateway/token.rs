use base64::{prelude::BASE64_STANDARD, Engine as _};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{GovernanceError, Result},
    config::ClusterApiConfig,
};

/// Lifetime of an outbound bearer token. Tokens are minted per call and
/// expire three minutes after issuance.
pub(crate) const TOKEN_VALIDITY_SECS: i64 = 180;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClusterApiClaims {
    pub(crate) sub: String,
    pub(crate) jti: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

/// Signs short-lived HS256 bearer tokens for cluster API calls with the
/// shared secret from configuration.
#[derive(Clone)]
pub struct TokenSigner {
    key: EncodingKey,
    service_identity: String,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"<redacted>")
            .field("service_identity", &self.service_identity)
            .finish()
    }
}

impl TokenSigner {
    /// Builds a signer from the cluster API settings.
    ///
    /// # Errors
    /// `Configuration` when the shared secret is unset or not valid base64.
    /// Callers construct the signer eagerly so that a misconfigured
    /// deployment fails at startup rather than on the first approval.
    pub fn from_config(config: &ClusterApiConfig) -> Result<Self> {
        let secret = config
            .base64_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                GovernanceError::configuration(
                    "Cluster API shared secret is not configured. Set `STREAMKEEPER__CLUSTER_API__BASE64_SECRET`.",
                )
            })?;
        let raw = BASE64_STANDARD.decode(secret).map_err(|e| {
            GovernanceError::configuration("Cluster API shared secret is not valid base64.")
                .with_source(e)
        })?;

        Ok(Self {
            key: EncodingKey::from_secret(&raw),
            service_identity: config.service_identity.clone(),
        })
    }

    /// Mints a fresh token. Every call produces a distinct `jti`.
    pub fn bearer_token(&self) -> Result<String> {
        let iat = chrono::Utc::now().timestamp();
        let claims = ClusterApiClaims {
            sub: self.service_identity.clone(),
            jti: Uuid::new_v4().to_string(),
            iat,
            exp: iat + TOKEN_VALIDITY_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(|e| {
            GovernanceError::internal("Failed to sign cluster API token.").with_source(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation};

    use super::*;
    use crate::api::ErrorKind;

    fn config_with_secret() -> ClusterApiConfig {
        ClusterApiConfig {
            base64_secret: Some(BASE64_STANDARD.encode(b"a-shared-secret")),
            ..ClusterApiConfig::default()
        }
    }

    #[test]
    fn test_missing_secret_is_a_configuration_error() {
        let err = TokenSigner::from_config(&ClusterApiConfig::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_garbage_secret_is_a_configuration_error() {
        let config = ClusterApiConfig {
            base64_secret: Some("not base64 !!".to_string()),
            ..ClusterApiConfig::default()
        };
        let err = TokenSigner::from_config(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_token_verifies_and_expires_after_three_minutes() {
        let signer = TokenSigner::from_config(&config_with_secret()).unwrap();
        let token = signer.bearer_token().unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.required_spec_claims.insert("sub".to_string());
        let decoded = jsonwebtoken::decode::<ClusterApiClaims>(
            &token,
            &DecodingKey::from_secret(b"a-shared-secret"),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, "streamkeeper");
        assert_eq!(decoded.claims.exp - decoded.claims.iat, TOKEN_VALIDITY_SECS);
    }

    #[test]
    fn test_every_token_carries_a_fresh_jti() {
        let signer = TokenSigner::from_config(&config_with_secret()).unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let decode = |token: &str| {
            jsonwebtoken::decode::<ClusterApiClaims>(
                token,
                &DecodingKey::from_secret(b"a-shared-secret"),
                &validation,
            )
            .unwrap()
            .claims
        };
        let first = decode(&signer.bearer_token().unwrap());
        let second = decode(&signer.bearer_token().unwrap());
        assert_ne!(first.jti, second.jti);
    }
}
