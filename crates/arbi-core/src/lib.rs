//! Core parsing logic for arbitration mission logs.
//!
//! This crate contains:
//! - Line classification: turning raw log lines into gameplay events
//! - Session accumulation and segmentation: one record per mission attempt
//! - Chunked reading: bounded-memory parsing with cooperative cancellation
//! - Post-passes: spawn refinement, saturation histograms and yield odds

mod classify;
pub mod config;
pub mod reader;
mod saturation;
mod segment;
pub mod session;
mod spawns;
mod summary;
pub mod yield_model;

pub use classify::{
    ClassifiedLine, LogEvent, SpawnKind, SpawnObservation, WaveMarker, classify_line,
    parse_timestamp,
};
pub use config::{DRONE_AGENT, ParserConfig, SaturationConfig, SelectionConfig};
pub use reader::{ChunkSource, FileSource, ParseError, Progress, ReadStats, SliceSource};
pub use saturation::{Saturation, SaturationSegment, bucketize};
pub use segment::{SessionSegmenter, select_session};
pub use session::{LiveSample, PauseInterval, Session, UNKNOWN_MISSION};
pub use spawns::{
    AgentEvidence, SpawnClassifyError, SpawnRefinement, classify_spawns, refine_session,
};
pub use summary::{LogParser, Summary, parse_log};
pub use tokio_util::sync::CancellationToken;
pub use yield_model::{LuckTier, YieldEstimate};
