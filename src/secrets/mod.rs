//! Warehouse credential resolution
//!
//! A named secret resolves to the cluster the statements run on and the ARN
//! the execution service authenticates with.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(feature = "aws")]
pub use self::aws::SecretsManagerResolver;

/// Key of the cluster identifier in the secret document
pub const CLUSTER_IDENTIFIER_KEY: &str = "dbClusterIdentifier";

/// Error type for secret resolution
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Secret {reference} has no '{field}' field")]
    MissingField {
        reference: String,
        field: &'static str,
    },

    #[error("Secret {reference} is malformed: {message}")]
    Malformed { reference: String, message: String },

    #[error("Secret store error: {0}")]
    Upstream(String),
}

/// Result type for secret resolution
pub type SecretResult<T> = Result<T, SecretError>;

/// Credential binding for the statement executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseCredentials {
    pub cluster_identifier: String,
    pub secret_arn: String,
}

#[derive(Deserialize)]
struct SecretDocument {
    #[serde(rename = "dbClusterIdentifier")]
    db_cluster_identifier: Option<String>,
}

impl WarehouseCredentials {
    /// Parse a JSON secret document
    pub fn from_secret_document(
        reference: &str,
        secret_arn: &str,
        document: &str,
    ) -> SecretResult<Self> {
        let parsed: SecretDocument =
            serde_json::from_str(document).map_err(|e| SecretError::Malformed {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        let cluster_identifier = parsed
            .db_cluster_identifier
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SecretError::MissingField {
                reference: reference.to_string(),
                field: CLUSTER_IDENTIFIER_KEY,
            })?;

        Ok(Self {
            cluster_identifier,
            secret_arn: secret_arn.to_string(),
        })
    }
}

/// Resolves a secret reference to warehouse credentials
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> SecretResult<WarehouseCredentials>;
}

/// Resolver returning fixed credentials regardless of the reference
#[derive(Debug, Clone)]
pub struct StaticSecretResolver {
    credentials: WarehouseCredentials,
}

impl StaticSecretResolver {
    pub fn new(credentials: WarehouseCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn resolve(&self, _reference: &str) -> SecretResult<WarehouseCredentials> {
        Ok(self.credentials.clone())
    }
}
