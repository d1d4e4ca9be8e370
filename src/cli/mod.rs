//! Command line interface for the sync pipeline

pub mod commands;
pub mod error;
