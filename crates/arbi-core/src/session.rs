//! Mission attempt accumulation.
//!
//! A [`Session`] is one attempt at a mission, built up event by event from
//! classified log lines. Events are applied in log order; nothing here looks
//! at raw text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::{LogEvent, SpawnKind, SpawnObservation, WaveMarker};
use crate::config::ParserConfig;

/// Mission name of a session that never saw a mission-start line.
pub const UNKNOWN_MISSION: &str = "Unknown Node";

/// Waves per defense rotation.
pub const WAVES_PER_ROTATION: u32 = 3;

/// Floor on a rotation's length when computing drones per minute.
const MIN_ROTATION_SECS: f64 = 10.0;

/// One live-enemy telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveSample {
    pub t: f64,
    pub val: u32,
    /// Enemy cap in force when the sample was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<u32>,
}

/// A window during which the mission was idle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauseInterval {
    pub start: f64,
    pub end: f64,
}

impl PauseInterval {
    /// Whether `[start, end]` lies inside this pause or starts inside it.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        let contained = start >= self.start && end <= self.end;
        let starts_inside = start >= self.start && start < self.end;
        contained || starts_inside
    }
}

/// One mission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub mission_name: String,
    pub is_defense: bool,
    pub is_interception: bool,

    pub drone_kills: u32,
    /// Raw count of non-drone, non-excluded spawns.
    pub enemy_spawns: u32,
    pub rounds: u32,

    pub drone_timestamps: Vec<f64>,
    pub reward_timestamps: Vec<f64>,
    pub wave_starts: BTreeMap<u32, f64>,
    pub live_counts: Vec<LiveSample>,
    pub pause_intervals: Vec<PauseInterval>,

    /// Ordered spawn observations, kept only for the spawn post-pass.
    #[serde(skip)]
    pub all_spawns: Vec<SpawnObservation>,
    /// Set when `all_spawns` hit its retention cap.
    #[serde(skip)]
    pub spawns_truncated: bool,

    pub last_reward_time: Option<f64>,
    /// Latest timestamp seen in this session.
    pub last_activity_time: Option<f64>,
    pub current_pause_start: Option<f64>,
    pub current_sim_cap: Option<u32>,
    /// First authoritative "mission has begun" timestamp.
    pub precise_start_time: Option<f64>,
    pub has_data: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            mission_name: UNKNOWN_MISSION.to_string(),
            is_defense: false,
            is_interception: false,
            drone_kills: 0,
            enemy_spawns: 0,
            rounds: 0,
            drone_timestamps: Vec::new(),
            reward_timestamps: Vec::new(),
            wave_starts: BTreeMap::new(),
            live_counts: Vec::new(),
            pause_intervals: Vec::new(),
            all_spawns: Vec::new(),
            spawns_truncated: false,
            last_reward_time: None,
            last_activity_time: None,
            current_pause_start: None,
            current_sim_cap: None,
            precise_start_time: None,
            has_data: false,
        }
    }
}

impl Session {
    /// Opens a session for a freshly started mission.
    ///
    /// Mission type flags are inferred from the name up front so telemetry
    /// arriving before any wave marker is kept.
    pub fn start(name: &str, timestamp: Option<f64>, config: &ParserConfig) -> Self {
        let lower = name.to_lowercase();
        Self {
            mission_name: name.to_string(),
            is_defense: lower.contains("defense") || config.is_mirror_defense(name),
            is_interception: lower.contains("interception"),
            last_activity_time: timestamp,
            ..Self::default()
        }
    }

    /// A session is worth keeping if it saw gameplay or a real mission start.
    pub fn is_non_trivial(&self) -> bool {
        self.has_data || self.mission_name != UNKNOWN_MISSION
    }

    /// Whether live-count telemetry is meaningful for this mission type.
    pub const fn tracks_live_counts(&self) -> bool {
        self.is_defense || self.is_interception
    }

    /// Applies one classified event. Mission starts are handled by the segmenter.
    pub fn apply(&mut self, timestamp: Option<f64>, event: &LogEvent, config: &ParserConfig) {
        match event {
            LogEvent::MissionStart { .. } => {}
            LogEvent::AgentSpawn(kind) => self.apply_spawn(timestamp, kind, config),
            LogEvent::Reward => self.apply_reward(timestamp, config),
            LogEvent::WaveStart { wave, marker } => self.apply_wave(timestamp, *wave, *marker),
            LogEvent::PauseStart => {
                self.open_pause(timestamp);
                self.touch(timestamp);
            }
            LogEvent::Territory { captured } => {
                self.is_interception = true;
                self.close_pause(timestamp);
                if *captured {
                    self.mark_precise_start(timestamp);
                }
                self.touch(timestamp);
            }
            LogEvent::LiveCount { value } => {
                if let Some(t) = timestamp {
                    if self.tracks_live_counts() {
                        self.live_counts.push(LiveSample {
                            t,
                            val: *value,
                            cap: self.current_sim_cap,
                        });
                    }
                }
                self.touch(timestamp);
            }
            LogEvent::SimCap { cap } => {
                self.current_sim_cap = Some(*cap);
            }
        }
    }

    fn apply_spawn(&mut self, timestamp: Option<f64>, kind: &SpawnKind, config: &ParserConfig) {
        match kind {
            SpawnKind::Drone => {
                self.drone_kills = self.drone_kills.saturating_add(1);
                self.has_data = true;
                if let Some(t) = timestamp {
                    self.drone_timestamps.push(t);
                }
            }
            SpawnKind::Excluded => return,
            SpawnKind::Enemy(observation) => {
                self.enemy_spawns = self.enemy_spawns.saturating_add(1);
                if self.all_spawns.len() < config.max_retained_spawns {
                    self.all_spawns.push(observation.clone());
                } else {
                    self.spawns_truncated = true;
                }
            }
        }
        self.touch(timestamp);
    }

    fn apply_reward(&mut self, timestamp: Option<f64>, config: &ParserConfig) {
        let too_soon = matches!(
            (timestamp, self.last_reward_time),
            (Some(t), Some(last)) if t - last < config.min_reward_gap_secs
        );
        if !too_soon {
            self.rounds = self.rounds.saturating_add(1);
            self.has_data = true;
            if let Some(t) = timestamp {
                self.last_reward_time = Some(t);
                self.reward_timestamps.push(t);
            }
        }
        if self.tracks_live_counts() {
            self.open_pause(timestamp);
        }
        self.touch(timestamp);
    }

    fn apply_wave(&mut self, timestamp: Option<f64>, wave: u32, marker: WaveMarker) {
        if marker == WaveMarker::DefenseWave && wave == 1 {
            self.is_defense = true;
            self.mark_precise_start(timestamp);
        }
        if marker == WaveMarker::Starting && self.is_defense {
            self.close_pause(timestamp);
        }
        if let Some(t) = timestamp {
            self.wave_starts.insert(wave, t);
        }
        self.touch(timestamp);
    }

    fn touch(&mut self, timestamp: Option<f64>) {
        if let Some(t) = timestamp {
            self.last_activity_time = Some(self.last_activity_time.map_or(t, |last| last.max(t)));
        }
    }

    fn mark_precise_start(&mut self, timestamp: Option<f64>) {
        if self.precise_start_time.is_none() {
            self.precise_start_time = timestamp;
        }
    }

    fn open_pause(&mut self, timestamp: Option<f64>) {
        if self.current_pause_start.is_none() {
            self.current_pause_start = timestamp;
        }
    }

    fn close_pause(&mut self, timestamp: Option<f64>) {
        let (Some(start), Some(end)) = (self.current_pause_start, timestamp) else {
            return;
        };
        self.current_pause_start = None;
        if end >= start {
            self.pause_intervals.push(PauseInterval { start, end });
        }
    }

    /// Finalizes the session; an open pause runs to the last activity.
    pub fn close(&mut self) {
        self.close_pause(self.last_activity_time);
        self.current_pause_start = None;
    }

    /// Start of the mission's active window.
    pub fn window_start(&self) -> f64 {
        self.precise_start_time
            .or_else(|| self.drone_timestamps.first().copied())
            .unwrap_or(0.0)
    }

    /// End of the mission's active window.
    pub fn window_end(&self) -> f64 {
        self.last_activity_time.unwrap_or(0.0)
    }

    /// Total waves for defense missions (rotations times waves per rotation).
    pub const fn waves(&self) -> Option<u32> {
        if self.is_defense {
            Some(self.rounds.saturating_mul(WAVES_PER_ROTATION))
        } else {
            None
        }
    }

    /// Mean gap between consecutive drone spawns.
    pub fn avg_drone_interval(&self) -> Option<f64> {
        if self.drone_timestamps.len() < 2 {
            return None;
        }
        let total: f64 = self
            .drone_timestamps
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .sum();
        Some(total / (self.drone_timestamps.len() - 1) as f64)
    }

    /// Drone spawns counted up to each reward timestamp.
    pub fn drones_per_rotation(&self) -> Vec<u32> {
        self.rotation_spans()
            .into_iter()
            .map(|(_, _, count)| count)
            .collect()
    }

    /// Drone spawns per minute for each rotation.
    ///
    /// The first rotation starts at the first drone spawn.
    pub fn drones_per_minute(&self) -> Vec<f64> {
        self.rotation_spans()
            .into_iter()
            .map(|(start, end, count)| {
                let secs = (end - start).max(MIN_ROTATION_SECS);
                f64::from(count) / (secs / 60.0)
            })
            .collect()
    }

    /// `(start, end, drones)` for each rotation.
    fn rotation_spans(&self) -> Vec<(f64, f64, u32)> {
        let Some(&first_drone) = self.drone_timestamps.first() else {
            return self.reward_timestamps.iter().map(|&t| (t, t, 0)).collect();
        };
        let mut spans = Vec::with_capacity(self.reward_timestamps.len());
        let mut start = first_drone;
        let mut idx = 0;
        for &end in &self.reward_timestamps {
            let mut count = 0u32;
            while idx < self.drone_timestamps.len() && self.drone_timestamps[idx] <= end {
                count += 1;
                idx += 1;
            }
            spans.push((start, end, count));
            start = end;
        }
        spans
    }

    /// Duration of each wave: gap to the next wave start, or to the last reward
    /// for the final wave when the reward came after it.
    pub fn wave_durations(&self) -> BTreeMap<u32, f64> {
        let waves: Vec<(u32, f64)> = self.wave_starts.iter().map(|(&w, &t)| (w, t)).collect();
        let mut durations = BTreeMap::new();
        for (i, &(wave, start)) in waves.iter().enumerate() {
            if let Some(&(_, next)) = waves.get(i + 1) {
                durations.insert(wave, next - start);
            } else if let Some(last_reward) = self.last_reward_time {
                if last_reward > start {
                    durations.insert(wave, last_reward - start);
                }
            }
        }
        durations
    }
}
