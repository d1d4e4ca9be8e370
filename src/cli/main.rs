//! CLI binary entry point for catalog-sync

#[cfg(feature = "cli")]
use catalog_subscription_sync::cli::commands::config::{
    ConfigCheckArgs, ConfigInitArgs, handle_config_check, handle_config_init,
};
#[cfg(feature = "cli")]
use catalog_subscription_sync::cli::commands::sync::{
    SyncArgs, handle_extract, handle_load, handle_run,
};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Extract catalog subscription approvals and load them into the warehouse")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./catalog-sync.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Walk the approver project's subscriptions and upload the extract
    Extract {
        /// Copy the extract into this directory instead of uploading to S3
        #[arg(long)]
        local_blob_dir: Option<PathBuf>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Truncate the destination table and bulk load the uploaded extract
    Load {
        /// Print the refresh report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract, then load; the load is skipped if the extract fails
    Run {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a sample configuration file
    Init {
        /// Output path
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the configuration for both phases
    Check,
}

#[cfg(feature = "cli")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Extract {
            local_blob_dir,
            json,
        } => handle_extract(&SyncArgs {
            config: cli.config,
            local_blob_dir,
            json,
        }),
        Commands::Load { json } => handle_load(&SyncArgs {
            config: cli.config,
            local_blob_dir: None,
            json,
        }),
        Commands::Run { json } => handle_run(&SyncArgs {
            config: cli.config,
            local_blob_dir: None,
            json,
        }),
        Commands::Config { command } => match command {
            ConfigCommands::Init { output, force } => {
                handle_config_init(&ConfigInitArgs { output, force })
            }
            ConfigCommands::Check => handle_config_check(&ConfigCheckArgs { config: cli.config }),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
