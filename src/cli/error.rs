//! CLI-specific error types

use crate::config::ConfigError;
use crate::pipeline::PipelineError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("{0}")]
    PipelineError(#[from] PipelineError),

    #[error("Interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    IoError(String),
}

impl CliError {
    /// Process exit code for the error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Interrupted => 130,
            CliError::InvalidArgument(_) | CliError::ConfigError(_) => 2,
            _ => 1,
        }
    }
}
