//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Arbitration mission log analyzer.
///
/// Reads the game's mission log, reconstructs the most recent arbitration
/// run and reports drone kills, rotations, enemy saturation and yield odds.
#[derive(Debug, Parser)]
#[command(name = "arbi", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a mission log and print a run summary.
    Analyze(AnalyzeArgs),

    /// Parse a mission log and upload the run.
    Upload(UploadArgs),

    /// Validate a run payload and store it locally.
    Import {
        /// Payload JSON file; reads stdin when omitted.
        file: Option<PathBuf>,
    },

    /// List locally stored runs.
    Runs {
        /// Maximum number of runs to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Path to the mission log.
    pub log: PathBuf,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,

    /// Vitus actually collected, for the luck percentile.
    #[arg(long)]
    pub actual_vitus: Option<f64>,

    /// Use this drone count instead of the parsed one.
    #[arg(long)]
    pub drones: Option<u32>,

    /// Live-enemy threshold for the saturation share.
    #[arg(long)]
    pub threshold: Option<u32>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Path to the mission log.
    pub log: PathBuf,

    /// Vitus actually collected.
    #[arg(long)]
    pub actual_vitus: f64,

    /// Use this drone count instead of the parsed one.
    #[arg(long)]
    pub drones: Option<u32>,

    /// Player alias shown with the run.
    #[arg(long, default_value = "")]
    pub alias: String,

    /// Free-text notes.
    #[arg(long, default_value = "")]
    pub notes: String,

    /// Gateway URL, overriding `upload.endpoint`.
    #[arg(long)]
    pub endpoint: Option<String>,
}
