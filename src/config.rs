//! Pipeline configuration
//!
//! Handles parsing of `catalog-sync.toml` configuration files and
//! environment variable overrides. Environment variables win over the file.
//! Each pipeline phase validates only the keys it needs and reports the first
//! missing one by its environment variable name.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::blob::BlobLocation;
use crate::warehouse::WaitPolicy;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "catalog-sync.toml";

/// Name of the extract file inside the work directory
pub const LOCAL_EXTRACT_FILENAME: &str = "subscriptions.csv";

/// Environment variable for the catalog domain identifier
pub const ENV_DOMAIN_ID: &str = "domain_id";

/// Environment variable for the approver project name
pub const ENV_PROJECT_NAME: &str = "project_id";

/// Environment variable for the extract bucket
pub const ENV_BUCKET_NAME: &str = "bucket_name";

/// Environment variable for the extract object key
pub const ENV_OBJECT_KEY: &str = "csv_file_path";

/// Environment variable for the warehouse secret name
pub const ENV_SECRET_NAME: &str = "secret_name";

/// Environment variable for the warehouse database
pub const ENV_DATABASE: &str = "redshift_database";

/// Environment variable for the destination schema
pub const ENV_SCHEMA: &str = "redshift_schema";

/// Environment variable for the destination table
pub const ENV_TABLE: &str = "redshift_table";

/// Environment variable for the role the load assumes
pub const ENV_ACCESS_ROLE: &str = "redshift_iam_role";

/// Environment variable for the catalog REST endpoint
pub const ENV_CATALOG_ENDPOINT: &str = "catalog_endpoint";

/// Environment variable for the catalog bearer token
pub const ENV_CATALOG_TOKEN: &str = "catalog_token";

/// Environment variable for the local work directory
pub const ENV_WORK_DIR: &str = "work_dir";

/// Environment variable for the statement poll interval in milliseconds
pub const ENV_POLL_INTERVAL_MS: &str = "poll_interval_ms";

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Result type for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Catalog configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSection {
    #[serde(default)]
    pub domain_id: Option<String>,

    /// Display name of the approver project
    #[serde(default)]
    pub project_name: Option<String>,

    /// REST endpoint of the catalog, the AWS SDK client is used when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
}

/// Extract storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub object_key: Option<String>,

    /// Directory holding the local extract file
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            bucket: None,
            object_key: None,
            work_dir: default_work_dir(),
        }
    }
}

/// Warehouse configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseSection {
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub table: Option<String>,

    /// Secret holding the cluster identifier
    #[serde(default)]
    pub secret_name: Option<String>,

    #[serde(default)]
    pub access_role: Option<String>,
}

/// Statement wait configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Unbounded when absent
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Unbounded when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for WaitSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: None,
            timeout_secs: None,
        }
    }
}

impl WaitSection {
    /// Convert to a wait policy, rejecting a zero interval
    pub fn policy(&self) -> ConfigResult<WaitPolicy> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_POLL_INTERVAL_MS,
                message: "poll interval must be positive".to_string(),
            });
        }

        let mut policy = WaitPolicy::every(Duration::from_millis(self.poll_interval_ms));
        if let Some(max) = self.max_attempts {
            policy = policy.with_max_attempts(max);
        }
        if let Some(secs) = self.timeout_secs {
            policy = policy.with_timeout(Duration::from_secs(secs));
        }
        Ok(policy)
    }
}

/// Main configuration structure
///
/// Represents the `catalog-sync.toml` configuration file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub catalog: CatalogSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub warehouse: WarehouseSection,

    #[serde(default)]
    pub wait: WaitSection,
}

/// Values the extract phase runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    pub domain_id: String,
    pub project_name: String,
    pub location: BlobLocation,
    pub local_path: PathBuf,
}

/// Values the load phase runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSettings {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub secret_name: String,
    pub access_role: String,
    pub source: BlobLocation,
    pub wait: WaitPolicy,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration
    ///
    /// Reads `path` when given, otherwise `catalog-sync.toml` in the current
    /// directory when it exists, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILENAME);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    ///
    /// A value that does not parse for a numeric key is an error.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut Option<String>); 11] = [
            (ENV_DOMAIN_ID, &mut self.catalog.domain_id),
            (ENV_PROJECT_NAME, &mut self.catalog.project_name),
            (ENV_CATALOG_ENDPOINT, &mut self.catalog.endpoint),
            (ENV_CATALOG_TOKEN, &mut self.catalog.token),
            (ENV_BUCKET_NAME, &mut self.storage.bucket),
            (ENV_OBJECT_KEY, &mut self.storage.object_key),
            (ENV_SECRET_NAME, &mut self.warehouse.secret_name),
            (ENV_DATABASE, &mut self.warehouse.database),
            (ENV_SCHEMA, &mut self.warehouse.schema),
            (ENV_TABLE, &mut self.warehouse.table),
            (ENV_ACCESS_ROLE, &mut self.warehouse.access_role),
        ];
        for (key, target) in targets {
            if let Some(value) = lookup(key) {
                *target = Some(value);
            }
        }

        if let Some(dir) = lookup(ENV_WORK_DIR) {
            self.storage.work_dir = PathBuf::from(dir);
        }

        if let Some(interval) = lookup(ENV_POLL_INTERVAL_MS) {
            self.wait.poll_interval_ms =
                interval.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: ENV_POLL_INTERVAL_MS,
                    message: format!("'{}': {}", interval, e),
                })?;
        }
        Ok(())
    }

    /// Extract location in blob storage
    pub fn location(&self) -> ConfigResult<BlobLocation> {
        Ok(BlobLocation::new(
            require(ENV_BUCKET_NAME, &self.storage.bucket)?,
            require(ENV_OBJECT_KEY, &self.storage.object_key)?,
        ))
    }

    /// Validate and collect the extract phase settings
    pub fn extract_settings(&self) -> ConfigResult<ExtractSettings> {
        Ok(ExtractSettings {
            domain_id: require(ENV_DOMAIN_ID, &self.catalog.domain_id)?,
            project_name: require(ENV_PROJECT_NAME, &self.catalog.project_name)?,
            location: self.location()?,
            local_path: self.storage.work_dir.join(LOCAL_EXTRACT_FILENAME),
        })
    }

    /// Validate and collect the load phase settings
    pub fn load_settings(&self) -> ConfigResult<LoadSettings> {
        Ok(LoadSettings {
            source: self.location()?,
            secret_name: require(ENV_SECRET_NAME, &self.warehouse.secret_name)?,
            database: require(ENV_DATABASE, &self.warehouse.database)?,
            schema: require(ENV_SCHEMA, &self.warehouse.schema)?,
            table: require(ENV_TABLE, &self.warehouse.table)?,
            access_role: require(ENV_ACCESS_ROLE, &self.warehouse.access_role)?,
            wait: self.wait.policy()?,
        })
    }
}

/// Present and non-blank value, or the name of the missing key
fn require(key: &'static str, value: &Option<String>) -> ConfigResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(key))
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Catalog Subscription Sync Configuration
# Every value can be overridden by the environment variable named in the
# comment above it.

[catalog]
# domain_id
domain_id = "dzd_example"
# project_id (display name of the approver project)
project_name = "sales"
# catalog_endpoint (REST gateway; the AWS SDK client is used when unset)
# endpoint = "https://catalog.example.com"
# catalog_token
# token = ""

[storage]
# bucket_name
bucket = "subscription-extracts"
# csv_file_path
object_key = "datazone/subscriptions.csv"
# work_dir
work_dir = "/tmp"

[warehouse]
# redshift_database
database = "dev"
# redshift_schema
schema = "governance"
# redshift_table
table = "subscriptions"
# secret_name
secret_name = "redshift-cluster-secret"
# redshift_iam_role
access_role = "arn:aws:iam::123456789012:role/redshift-copy"

[wait]
# poll_interval_ms
poll_interval_ms = 2000
# Unbounded unless set
# max_attempts = 300
# timeout_secs = 900
"#
}
