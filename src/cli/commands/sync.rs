//! Sync CLI commands
//!
//! Runs the extract phase, the load phase, or both against DataZone (or a
//! configured REST gateway) and the AWS services named in the configuration.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::blob::{BlobStore, LocalBlobStore, S3BlobStore};
use crate::catalog::{CatalogService, DataZoneCatalog, HttpCatalogClient};
use crate::cli::error::CliError;
use crate::config::SyncConfig;
use crate::pipeline::{PipelineError, SubscriptionExtractor, WarehouseLoader, run_pipeline};
use crate::secrets::SecretsManagerResolver;
use crate::warehouse::RedshiftDataService;

/// Sync command arguments
#[derive(Debug, Clone, Default)]
pub struct SyncArgs {
    /// Configuration file
    pub config: Option<PathBuf>,
    /// Store the extract under this directory instead of S3
    pub local_blob_dir: Option<PathBuf>,
    /// Print the summary as JSON
    pub json: bool,
}

fn load_config(args: &SyncArgs) -> Result<SyncConfig, CliError> {
    if let Some(path) = &args.config
        && !path.exists()
    {
        return Err(CliError::FileNotFound(path.clone()));
    }
    Ok(SyncConfig::load(args.config.as_deref())?)
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

/// Token cancelled on Ctrl-C
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            trigger.cancel();
        }
    });
    cancel
}

fn extractor(
    config: &SyncConfig,
    args: &SyncArgs,
    sdk_config: &aws_config::SdkConfig,
) -> Result<SubscriptionExtractor, CliError> {
    let catalog: Arc<dyn CatalogService> = match config.catalog.endpoint.as_deref() {
        Some(endpoint) if !endpoint.trim().is_empty() => Arc::new(
            HttpCatalogClient::new(endpoint, config.catalog.token.clone())
                .map_err(PipelineError::from)?,
        ),
        _ => Arc::new(DataZoneCatalog::from_conf(sdk_config)),
    };

    let blob_store: Arc<dyn BlobStore> = match &args.local_blob_dir {
        Some(dir) => Arc::new(LocalBlobStore::new(dir.clone())),
        None => Arc::new(S3BlobStore::from_conf(sdk_config)),
    };

    Ok(SubscriptionExtractor::new(catalog, blob_store))
}

fn loader(sdk_config: &aws_config::SdkConfig) -> WarehouseLoader {
    WarehouseLoader::new(
        Arc::new(RedshiftDataService::from_conf(sdk_config)),
        Arc::new(SecretsManagerResolver::from_conf(sdk_config)),
    )
}

fn print_summary<T: serde::Serialize + std::fmt::Debug>(summary: &T, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{:?}", summary),
        }
    }
}

fn interrupted(cancel: &CancellationToken, error: PipelineError) -> CliError {
    if cancel.is_cancelled() {
        CliError::Interrupted
    } else {
        CliError::PipelineError(error)
    }
}

/// Extract subscriptions and upload the file
pub fn handle_extract(args: &SyncArgs) -> Result<(), CliError> {
    let config = load_config(args)?;
    let settings = config.extract_settings()?;

    runtime()?.block_on(async {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let extractor = extractor(&config, args, &sdk_config)?;
        let cancel = interrupt_token();

        let summary = extractor
            .run(&settings, &cancel)
            .await
            .map_err(|e| interrupted(&cancel, e))?;

        println!(
            "Extracted {} subscriptions to {}",
            summary.records, summary.location
        );
        print_summary(&summary, args.json);
        Ok::<(), CliError>(())
    })
}

/// Refresh the warehouse table from the uploaded file
pub fn handle_load(args: &SyncArgs) -> Result<(), CliError> {
    let config = load_config(args)?;
    let settings = config.load_settings()?;

    runtime()?.block_on(async {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let cancel = interrupt_token();

        let report = loader(&sdk_config)
            .run(&settings, &cancel)
            .await
            .map_err(|e| interrupted(&cancel, e))?;

        println!(
            "Loaded {} into {} ({} statements)",
            settings.source,
            report.table,
            report.statements.len()
        );
        print_summary(&report, args.json);
        Ok::<(), CliError>(())
    })
}

/// Extract then load
pub fn handle_run(args: &SyncArgs) -> Result<(), CliError> {
    let config = load_config(args)?;

    runtime()?.block_on(async {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let extractor = extractor(&config, args, &sdk_config)?;
        let loader = loader(&sdk_config);
        let cancel = interrupt_token();

        let summary = run_pipeline(&extractor, &loader, &config, &cancel)
            .await
            .map_err(|e| interrupted(&cancel, e))?;

        println!(
            "Extracted {} subscriptions and loaded them into {}",
            summary.extract.records, summary.refresh.table
        );
        print_summary(&summary, args.json);
        Ok::<(), CliError>(())
    })
}
