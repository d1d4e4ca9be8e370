//! Pipeline driver
//!
//! Glues the catalog walk, the flattener, the extract writer and the table
//! refresh into the extract and load phases. Each phase takes its
//! collaborators as trait objects, so the same driver runs against the cloud
//! adapters or in-memory fakes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blob::{BlobError, BlobLocation, BlobStore};
use crate::catalog::{CatalogError, CatalogService, CatalogTraverser};
use crate::config::{ConfigError, ExtractSettings, LoadSettings, SyncConfig};
use crate::extract::{ExportError, write_csv_file};
use crate::flatten::{FlatRecord, flatten};
use crate::secrets::{SecretError, SecretResolver};
use crate::warehouse::{
    ExecutionTarget, RefreshError, RefreshPlan, RefreshReport, StatementExecutor,
    StatementService, StatementWaiter, TableRefresher, WarehouseError,
};

/// Error from any pipeline phase
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Extract error: {0}")]
    Export(#[from] ExportError),

    #[error("Storage error: {0}")]
    Blob(#[from] BlobError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

/// Result type for pipeline phases
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Outcome of the extract phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSummary {
    pub run_id: Uuid,
    pub project_id: String,
    pub records: usize,
    pub location: BlobLocation,
    /// Hex SHA-256 of the uploaded file
    pub sha256: String,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of a combined run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub extract: ExtractSummary,
    pub refresh: RefreshReport,
}

/// Builds the extract file and uploads it
pub struct SubscriptionExtractor {
    catalog: Arc<dyn CatalogService>,
    blob_store: Arc<dyn BlobStore>,
}

impl SubscriptionExtractor {
    pub fn new(catalog: Arc<dyn CatalogService>, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            catalog,
            blob_store,
        }
    }

    /// Walk the approver project and flatten every subscription
    ///
    /// Returns the resolved project identifier with the records.
    pub async fn extract_records(
        &self,
        domain_id: &str,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<(String, Vec<FlatRecord>)> {
        let traverser =
            CatalogTraverser::new(Arc::clone(&self.catalog)).with_cancellation(cancel.clone());
        let mut walk = traverser.traverse(domain_id, project_name).await?;
        let project_id = walk.project_id().to_string();
        info!("Processing project ID: {}", project_id);

        let mut records = Vec::new();
        while let Some(node) = walk.next().await {
            records.push(flatten(&node?));
        }

        if records.is_empty() {
            warn!(project_id = %project_id, "Project approves no subscriptions");
        }
        Ok((project_id, records))
    }

    /// Run the extract phase
    pub async fn run(
        &self,
        settings: &ExtractSettings,
        cancel: &CancellationToken,
    ) -> PipelineResult<ExtractSummary> {
        let run_id = Uuid::new_v4();
        info!(%run_id, domain_id = %settings.domain_id, "Starting extract");

        let (project_id, records) = self
            .extract_records(&settings.domain_id, &settings.project_name, cancel)
            .await?;
        let file = write_csv_file(&records, &settings.local_path).await?;
        self.blob_store
            .upload(&file.path, &settings.location)
            .await?;

        info!(
            "Subscription details have been written to {}",
            settings.location
        );
        Ok(ExtractSummary {
            run_id,
            project_id,
            records: file.rows,
            location: settings.location.clone(),
            sha256: file.sha256,
            completed_at: Utc::now(),
        })
    }
}

/// Loads an uploaded extract into the warehouse table
pub struct WarehouseLoader {
    statements: Arc<dyn StatementService>,
    secrets: Arc<dyn SecretResolver>,
}

impl WarehouseLoader {
    pub fn new(statements: Arc<dyn StatementService>, secrets: Arc<dyn SecretResolver>) -> Self {
        Self {
            statements,
            secrets,
        }
    }

    /// Run the load phase
    pub async fn run(
        &self,
        settings: &LoadSettings,
        cancel: &CancellationToken,
    ) -> PipelineResult<RefreshReport> {
        let credentials = self.secrets.resolve(&settings.secret_name).await?;
        info!(
            cluster = %credentials.cluster_identifier,
            service = self.statements.service_type(),
            "Resolved warehouse target"
        );

        let plan = RefreshPlan::new(
            settings.database.as_str(),
            settings.schema.as_str(),
            settings.table.as_str(),
            settings.source.clone(),
            settings.access_role.as_str(),
        )?;

        let target = ExecutionTarget::new(settings.database.as_str(), &credentials);
        let refresher = TableRefresher::new(
            StatementExecutor::new(Arc::clone(&self.statements), target),
            StatementWaiter::new(Arc::clone(&self.statements), settings.wait),
        );

        let report = refresher.refresh(&plan, cancel).await?;
        Ok(report)
    }
}

/// Extract then load; the load is skipped when the extract fails
pub async fn run_pipeline(
    extractor: &SubscriptionExtractor,
    loader: &WarehouseLoader,
    config: &SyncConfig,
    cancel: &CancellationToken,
) -> PipelineResult<RunSummary> {
    let extract_settings = config.extract_settings()?;
    let load_settings = config.load_settings()?;

    let extract = extractor.run(&extract_settings, cancel).await?;
    let refresh = loader.run(&load_settings, cancel).await?;
    Ok(RunSummary { extract, refresh })
}
