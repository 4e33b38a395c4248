//! Arbitration log analyzer CLI library.
//!
//! This crate provides the CLI interface for analyzing, uploading and
//! storing arbitration runs.

mod cli;
pub mod commands;
mod config;

pub use cli::{AnalyzeArgs, Cli, Commands, UploadArgs};
pub use config::{Config, GatewaySettings, UploadSettings};
