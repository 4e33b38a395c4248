//! End-to-end parse: bytes in, one mission summary out.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::classify::classify_line;
use crate::config::ParserConfig;
use crate::reader::{ChunkSource, FileSource, ParseError, Progress, read_lines, read_lines_async};
use crate::saturation::{Saturation, bucketize};
use crate::segment::{SessionSegmenter, select_session};
use crate::session::Session;
use crate::spawns::{AgentEvidence, refine_session};

/// Statistics for the selected mission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub session: Session,
    /// Mission attempts found in the log, including the selected one.
    pub sessions_found: usize,
    /// Enemy spawns as counted during the scan.
    pub raw_enemy_spawns: u32,
    /// Enemy spawns after removing non-ticking agents.
    pub enemy_spawns: u32,
    pub total_enemies: u32,
    pub true_non_ticking: Vec<String>,
    pub agent_evidence: BTreeMap<String, AgentEvidence>,
    pub start_time: f64,
    pub end_time: f64,
    pub duration_secs: f64,
    pub waves: Option<u32>,
    pub avg_drone_interval: Option<f64>,
    pub drones_per_rotation: Vec<u32>,
    pub drones_per_minute: Vec<f64>,
    pub wave_durations: BTreeMap<u32, f64>,
    pub saturation: Saturation,
}

impl Summary {
    pub fn from_session(session: Session, sessions_found: usize, config: &ParserConfig) -> Self {
        let raw_enemy_spawns = session.enemy_spawns;
        let (enemy_spawns, true_non_ticking, agent_evidence) =
            match refine_session(&session, &config.force_valid_agents) {
                Ok(refined) => (refined.enemy_spawns, refined.true_non_ticking, refined.evidence),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        mission = %session.mission_name,
                        "spawn post-pass skipped, using raw enemy count"
                    );
                    (raw_enemy_spawns, Vec::new(), BTreeMap::new())
                }
            };

        let start_time = session.window_start();
        let end_time = session.window_end();
        let saturation = bucketize(
            &session.live_counts,
            &session.pause_intervals,
            start_time,
            end_time,
            &config.saturation,
        );

        Self {
            sessions_found,
            raw_enemy_spawns,
            enemy_spawns,
            total_enemies: enemy_spawns.saturating_add(session.drone_kills),
            true_non_ticking,
            agent_evidence,
            start_time,
            end_time,
            duration_secs: (end_time - start_time).max(0.0),
            waves: session.waves(),
            avg_drone_interval: session.avg_drone_interval(),
            drones_per_rotation: session.drones_per_rotation(),
            drones_per_minute: session.drones_per_minute(),
            wave_durations: session.wave_durations(),
            saturation,
            session,
        }
    }

    pub fn mission_name(&self) -> &str {
        &self.session.mission_name
    }

    pub const fn drone_kills(&self) -> u32 {
        self.session.drone_kills
    }

    pub const fn rounds(&self) -> u32 {
        self.session.rounds
    }
}

/// Parses mission logs with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct LogParser {
    config: ParserConfig,
}

impl LogParser {
    pub const fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn parse<S: ChunkSource>(&self, source: S) -> Result<Summary, ParseError> {
        let mut segmenter = SessionSegmenter::new(&self.config);
        let stats = read_lines(source, &self.config, |line| {
            segmenter.push(&classify_line(line, &self.config));
        })?;
        tracing::debug!(chunks = stats.chunks, "read log");
        Ok(self.summarize(segmenter.finish()))
    }

    pub fn parse_path(&self, path: &Path) -> Result<Summary, ParseError> {
        tracing::info!(path = %path.display(), "parsing log");
        self.parse(FileSource::open(path)?)
    }

    /// Parses without monopolising the runtime.
    ///
    /// `on_progress` is called after every chunk. Cancelling `cancel`
    /// abandons the parse with [`ParseError::Cancelled`].
    pub async fn parse_async<S, P>(
        &self,
        source: S,
        cancel: &CancellationToken,
        on_progress: P,
    ) -> Result<Summary, ParseError>
    where
        S: ChunkSource,
        P: FnMut(Progress),
    {
        let mut segmenter = SessionSegmenter::new(&self.config);
        let stats = read_lines_async(source, &self.config, cancel, on_progress, |line| {
            segmenter.push(&classify_line(line, &self.config));
        })
        .await?;
        tracing::debug!(chunks = stats.chunks, yields = stats.yields, "read log");
        Ok(self.summarize(segmenter.finish()))
    }

    fn summarize(&self, sessions: Vec<Session>) -> Summary {
        let found = sessions.len();
        let selected = select_session(&sessions, &self.config.selection);
        tracing::info!(
            sessions = found,
            mission = %selected.mission_name,
            drones = selected.drone_kills,
            rounds = selected.rounds,
            "selected session"
        );
        Summary::from_session(selected, found, &self.config)
    }
}

/// Parses `source` with the default configuration.
pub fn parse_log<S: ChunkSource>(source: S) -> Result<Summary, ParseError> {
    LogParser::default().parse(source)
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;

    use super::*;
    use crate::reader::SliceSource;

    fn parse(text: &str) -> Summary {
        parse_log(SliceSource::new(text.as_bytes())).unwrap()
    }

    fn drone_line(t: f64) -> String {
        format!("{t:.3} AI [Info]: OnAgentCreated /Npc/CorpusEliteShieldDroneAgent12\n")
    }

    #[test]
    fn test_single_rotation_run() {
        let mut log = String::from("0.500 Script [Info]: ThemedSquadOverlay.lua: Mission name: Arbitration: Hydron (Sedna)\n");
        for i in 1..=25 {
            log.push_str(&drone_line(f64::from(i) * 10.0));
        }
        log.push_str("260.000 Script [Info]: Sys [Info]: Created /Lotus/Interface/DefenseReward.swf\n");

        let summary = parse(&log);
        assert_eq!(summary.mission_name(), "Hydron (Sedna)");
        assert_eq!(summary.drone_kills(), 25);
        assert_eq!(summary.rounds(), 1);
        assert_eq!(summary.sessions_found, 1);
        assert!((summary.avg_drone_interval.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(summary.drones_per_rotation, vec![25]);
        assert_eq!(summary.total_enemies, 25);
        assert!((summary.duration_secs - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_later_complete_session_wins() {
        let mut log = String::new();
        log.push_str("1.000 Script [Info]: ThemedSquadOverlay.lua: Mission name: Arbitration: Alpha (Earth)\n");
        for i in 0..30 {
            log.push_str(&drone_line(10.0 + f64::from(i)));
        }
        log.push_str("100.000 Script [Info]: Sys [Info]: Created /Lotus/Interface/DefenseReward.swf\n");
        log.push_str("500.000 Script [Info]: ThemedSquadOverlay.lua: Mission name: Arbitration: Beta (Mars)\n");
        for i in 0..40 {
            log.push_str(&drone_line(510.0 + f64::from(i)));
        }
        writeln!(
            log,
            "600.000 Script [Info]: Sys [Info]: Created /Lotus/Interface/DefenseReward.swf"
        )
        .unwrap();

        let summary = parse(&log);
        assert_eq!(summary.sessions_found, 2);
        assert_eq!(summary.mission_name(), "Beta (Mars)");
        assert_eq!(summary.drone_kills(), 40);
    }

    #[test]
    fn test_empty_log_gives_default_session() {
        let summary = parse("");
        assert_eq!(summary.session, Session::default());
        assert_eq!(summary.sessions_found, 0);
        assert_eq!(summary.total_enemies, 0);
        assert!(summary.saturation.is_empty());
    }

    #[test]
    fn test_non_arbitration_missions_are_ignored() {
        let log = "1.0 Script [Info]: ThemedSquadOverlay.lua: Mission name: Hydron (Sedna)\n";
        let summary = parse(log);
        assert_eq!(summary.sessions_found, 0);
        assert_eq!(summary.mission_name(), crate::UNKNOWN_MISSION);
    }

    #[test]
    fn test_truncated_spawns_fall_back_to_raw_count() {
        let config = ParserConfig {
            max_retained_spawns: 1,
            ..ParserConfig::default()
        };
        let log = "\
1.0 Script [Info]: ThemedSquadOverlay.lua: Mission name: Arbitration: Hydron (Sedna)
2.0 AI [Info]: OnAgentCreated /Npc/GrineerLancer3 MonitoredTicking 1
3.0 AI [Info]: OnAgentCreated /Npc/GrineerLancer4 MonitoredTicking 1
4.0 AI [Info]: OnAgentCreated /Npc/GrineerLancer5 MonitoredTicking 1
";
        let summary = LogParser::new(config)
            .parse(SliceSource::new(log.as_bytes()))
            .unwrap();
        assert_eq!(summary.raw_enemy_spawns, 3);
        assert_eq!(summary.enemy_spawns, 3);
        assert!(summary.true_non_ticking.is_empty());
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let summary = parse("");
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["session"]["mission_name"], crate::UNKNOWN_MISSION);
        assert!(json["saturation"]["buckets"].is_array());
    }

    #[tokio::test]
    async fn test_async_parse_matches_sync_parse() {
        let mut log = String::from("0.5 Script [Info]: ThemedSquadOverlay.lua: Mission name: Arbitration: Hydron (Sedna)\n");
        for i in 1..=5 {
            log.push_str(&drone_line(f64::from(i)));
        }
        let parser = LogParser::new(ParserConfig {
            chunk_size: 16,
            yield_interval_ms: 0,
            ..ParserConfig::default()
        });
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let async_summary = parser
            .parse_async(SliceSource::new(log.as_bytes()), &cancel, |_| calls += 1)
            .await
            .unwrap();
        let sync_summary = parser.parse(SliceSource::new(log.as_bytes())).unwrap();
        assert_eq!(async_summary, sync_summary);
        assert!(calls > 1);
    }
}
