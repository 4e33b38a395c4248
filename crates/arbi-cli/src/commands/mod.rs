//! CLI subcommand implementations.

pub mod analyze;
pub mod import;
pub mod runs;
pub mod upload;
