//! Configuration CLI commands
//!
//! Writes a sample configuration file and checks an existing one.

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, SyncConfig, sample_config};

/// Config init command arguments
#[derive(Debug, Clone)]
pub struct ConfigInitArgs {
    /// Target file, `catalog-sync.toml` in the current directory when absent
    pub output: Option<PathBuf>,
    /// Overwrite an existing file
    pub force: bool,
}

/// Config check command arguments
#[derive(Debug, Clone)]
pub struct ConfigCheckArgs {
    pub config: Option<PathBuf>,
}

/// Write the sample configuration
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), CliError> {
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

    if path.exists() && !args.force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    std::fs::write(&path, sample_config())
        .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;

    println!("Wrote sample configuration to {}", path.display());
    Ok(())
}

/// Load the configuration and validate both phases
pub fn handle_config_check(args: &ConfigCheckArgs) -> Result<(), CliError> {
    if let Some(path) = &args.config
        && !path.exists()
    {
        return Err(CliError::FileNotFound(path.clone()));
    }

    let config = SyncConfig::load(args.config.as_deref())?;
    let extract = config.extract_settings()?;
    let load = config.load_settings()?;

    println!("Configuration is valid");
    println!("  Domain:          {}", extract.domain_id);
    println!("  Project:         {}", extract.project_name);
    println!("  Extract:         {}", extract.location);
    println!("  Local file:      {}", extract.local_path.display());
    println!(
        "  Destination:     {}.{}.{}",
        load.database, load.schema, load.table
    );
    println!("  Secret:          {}", load.secret_name);
    println!("  Poll interval:   {}ms", load.wait.poll_interval.as_millis());
    if config.catalog.endpoint.is_none() {
        println!("  Catalog endpoint not set; extract will fail");
    }
    Ok(())
}
