//! Catalog Subscription Sync - subscription approval extract and warehouse refresh
//!
//! Provides:
//! - Catalog traversal from an approver project to every subscription it
//!   approved, with asset filters and requester/approver identities resolved
//! - Flattening of each subscription into a fixed-schema extract row
//! - CSV extract writing and upload to blob storage
//! - An asynchronous statement executor and poll loop for the warehouse
//! - An idempotent table refresh (existence check, truncate, bulk load)
//!
//! Vendor adapters sit behind features: `aws` for DataZone, S3, Secrets
//! Manager and the Redshift Data API, and `api-backend` for a catalog REST
//! gateway client.

pub mod blob;
pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod extract;
pub mod flatten;
pub mod models;
pub mod pipeline;
pub mod secrets;
pub mod warehouse;

// Re-export commonly used types
pub use blob::{BlobError, BlobLocation, BlobStore, LocalBlobStore};
#[cfg(feature = "aws")]
pub use catalog::DataZoneCatalog;
#[cfg(feature = "api-backend")]
pub use catalog::HttpCatalogClient;
pub use catalog::{CatalogError, CatalogService, CatalogTraverser, SubscriptionWalk};
pub use config::{ConfigError, ExtractSettings, LoadSettings, SyncConfig};
pub use extract::{CSV_HEADER, ExportError, ExtractFile, write_csv, write_csv_file};
pub use flatten::{FULL_ACCESS, FlatRecord, flatten};
pub use models::{AccessScope, FilterRef, SubscriptionNode};
pub use pipeline::{
    ExtractSummary, PipelineError, RunSummary, SubscriptionExtractor, WarehouseLoader,
    run_pipeline,
};
pub use secrets::{SecretError, SecretResolver, StaticSecretResolver, WarehouseCredentials};
pub use warehouse::{
    AsyncStatement, DEFAULT_POLL_INTERVAL, PollOutcome, RefreshError, RefreshPlan, RefreshReport,
    StatementExecutor, StatementService, StatementWaiter, TableRefresher, WaitPolicy,
    WarehouseError,
};
