//! Tuning constants and lookup tables for the log parser.
//!
//! Every field has a default, so a partial TOML table (or none at all)
//! deserializes into a usable configuration.

use serde::{Deserialize, Serialize};

/// Agent subtype counted as a drone kill.
pub const DRONE_AGENT: &str = "CorpusEliteShieldDroneAgent";

/// Configuration for a parse run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Bytes read from the source per chunk.
    /// Default: 10 MiB.
    pub chunk_size: usize,

    /// Longest line fragment kept while waiting for a newline.
    /// Default: 1 MiB.
    pub max_line_bytes: usize,

    /// Minimum wall-clock time between cooperative yields in the async reader.
    /// Default: 50 ms.
    pub yield_interval_ms: u64,

    /// Lines containing any of these substrings are dropped before classification.
    pub noise_markers: Vec<String>,

    /// Node names that run the alternate defense ruleset.
    pub mirror_defense_nodes: Vec<String>,

    /// Case-insensitive agent name fragments that never count as enemies.
    pub excluded_agents: Vec<String>,

    /// Agent names that always count, whatever their tick evidence says.
    pub force_valid_agents: Vec<String>,

    /// Reward markers closer together than this are one rotation.
    /// Default: 30 seconds.
    pub min_reward_gap_secs: f64,

    /// Upper bound on spawn observations kept for the post-pass.
    pub max_retained_spawns: usize,

    pub saturation: SaturationConfig,

    pub selection: SelectionConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10 * 1024 * 1024,
            max_line_bytes: 1024 * 1024,
            yield_interval_ms: 50,
            noise_markers: vec![
                "Game [Warning]:".to_string(),
                "DamagePct exceeds limits".to_string(),
            ],
            mirror_defense_nodes: vec![
                "Tyana Pass (Mars)".to_string(),
                "Munio (Deimos)".to_string(),
            ],
            excluded_agents: [
                "companion",
                "sentinel",
                "kubrow",
                "kavat",
                "allied",
                "specter",
                "turret",
                "dropship",
                "replicant",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            force_valid_agents: vec![DRONE_AGENT.to_string()],
            min_reward_gap_secs: 30.0,
            max_retained_spawns: 2_000_000,
            saturation: SaturationConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

impl ParserConfig {
    /// Whether `name` is one of the configured mirror defense nodes.
    pub fn is_mirror_defense(&self, name: &str) -> bool {
        let name = name.trim();
        self.mirror_defense_nodes
            .iter()
            .any(|node| node.trim().eq_ignore_ascii_case(name))
    }

    /// Whether an agent path such as `/Npc/AutoTurretAgent` is in the exclusion set.
    pub fn is_excluded_agent(&self, agent: &str) -> bool {
        let lower = agent.to_ascii_lowercase();
        self.excluded_agents
            .iter()
            .any(|fragment| lower.contains(&fragment.to_ascii_lowercase()))
    }

    /// Whether the line matches one of the noise markers.
    pub fn is_noise(&self, line: &str) -> bool {
        self.noise_markers.iter().any(|marker| line.contains(marker))
    }
}

/// Bucket layout for the saturation histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaturationConfig {
    /// Width of each bucket in live enemies.
    pub step: u32,

    /// Values at or above this land in the top bucket.
    pub max: u32,

    /// Sample gaps longer than this are not credited to any bucket.
    /// Default: 29 seconds.
    pub max_gap_secs: f64,
}

impl Default for SaturationConfig {
    fn default() -> Self {
        Self {
            step: 5,
            max: 50,
            max_gap_secs: 29.0,
        }
    }
}

impl SaturationConfig {
    /// Index of the top (open-ended) bucket.
    pub const fn top_bucket(&self) -> usize {
        (self.max / self.step()) as usize
    }

    /// Bucket index for a live-enemy value.
    pub const fn bucket_for(&self, val: u32) -> usize {
        if val >= self.max {
            self.top_bucket()
        } else {
            (val / self.step()) as usize
        }
    }

    /// Step, never zero.
    pub const fn step(&self) -> u32 {
        if self.step == 0 { 1 } else { self.step }
    }
}

/// Thresholds a session must beat to be picked over later, shorter attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Rounds must be strictly greater than this.
    pub min_rounds: u32,

    /// Drone kills must be strictly greater than this.
    pub min_drone_kills: u32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_rounds: 0,
            min_drone_kills: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_for_clamps_to_top() {
        let config = SaturationConfig::default();
        assert_eq!(config.bucket_for(0), 0);
        assert_eq!(config.bucket_for(4), 0);
        assert_eq!(config.bucket_for(5), 1);
        assert_eq!(config.bucket_for(49), 9);
        assert_eq!(config.bucket_for(50), 10);
        assert_eq!(config.bucket_for(500), 10);
    }

    #[test]
    fn test_bucket_for_step_three() {
        let config = SaturationConfig {
            step: 3,
            ..SaturationConfig::default()
        };
        assert_eq!(config.bucket_for(10), 3);
        assert_eq!(config.top_bucket(), 16);
    }

    #[test]
    fn test_zero_step_does_not_divide_by_zero() {
        let config = SaturationConfig {
            step: 0,
            max: 10,
            max_gap_secs: 29.0,
        };
        assert_eq!(config.bucket_for(3), 3);
        assert_eq!(config.top_bucket(), 10);
    }

    #[test]
    fn test_mirror_defense_lookup_ignores_case_and_padding() {
        let config = ParserConfig {
            mirror_defense_nodes: vec!["Tyana Pass (Mars)".to_string()],
            ..ParserConfig::default()
        };
        assert!(config.is_mirror_defense("  tyana pass (mars) "));
        assert!(!config.is_mirror_defense("Hydron (Sedna)"));
    }

    #[test]
    fn test_excluded_agent_is_case_insensitive() {
        let config = ParserConfig::default();
        assert!(config.is_excluded_agent("/Npc/AutoTurretAgentShipRemaster"));
        assert!(config.is_excluded_agent("/Npc/KUBROWPetAgent"));
        assert!(!config.is_excluded_agent("/Npc/CorpusTechAgent"));
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config: ParserConfig =
            serde_json::from_str(r#"{"min_reward_gap_secs": 12.5, "saturation": {"step": 2}}"#)
                .unwrap();
        assert!((config.min_reward_gap_secs - 12.5).abs() < f64::EPSILON);
        assert_eq!(config.saturation.step, 2);
        assert_eq!(config.saturation.max, 50);
        assert_eq!(config.chunk_size, 10 * 1024 * 1024);
    }
}
