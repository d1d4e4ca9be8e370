//! AWS Secrets Manager resolver

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use tracing::debug;

use super::{SecretError, SecretResolver, SecretResult, WarehouseCredentials};

/// Reads the secret document with `GetSecretValue`
#[derive(Clone)]
pub struct SecretsManagerResolver {
    client: Client,
}

impl SecretsManagerResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build from a shared SDK configuration
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl SecretResolver for SecretsManagerResolver {
    async fn resolve(&self, reference: &str) -> SecretResult<WarehouseCredentials> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(reference)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception());
                if not_found {
                    SecretError::NotFound(reference.to_string())
                } else {
                    SecretError::Upstream(DisplayErrorContext(&e).to_string())
                }
            })?;

        let arn = output.arn().ok_or_else(|| SecretError::MissingField {
            reference: reference.to_string(),
            field: "ARN",
        })?;
        let document = output
            .secret_string()
            .ok_or_else(|| SecretError::MissingField {
                reference: reference.to_string(),
                field: "SecretString",
            })?;

        debug!(secret_arn = %arn, "Resolved warehouse secret");
        WarehouseCredentials::from_secret_document(reference, arn, document)
    }
}
