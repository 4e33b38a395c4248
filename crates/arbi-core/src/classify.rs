//! Line classification.
//!
//! Each log line is turned into zero or more [`LogEvent`]s without touching
//! any session state. Applying events is the job of [`crate::Session`].

use std::sync::LazyLock;

use regex::Regex;

use crate::config::ParserConfig;

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+)").expect("timestamp regex"));
static MISSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Script \[Info\]: ThemedSquadOverlay\.lua: Mission name: (.*)")
        .expect("mission regex")
});
static AGENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"OnAgentCreated(?:\s+(\S+))?").expect("agent regex"));
static DRONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"OnAgentCreated.*?CorpusEliteShieldDroneAgent").expect("drone regex")
});
static REWARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Sys \[Info\]: Created /Lotus/Interface/DefenseReward\.swf").expect("reward regex")
});
static STARTING_WAVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"WaveDefend\.lua: Starting wave (\d+)").expect("starting wave regex")
});
static DEFENSE_WAVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"WaveDefend\.lua: Defense wave: (\d+)").expect("defense wave regex")
});
static SLEEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)sleep(?:ing)? between waves").expect("sleep regex"));
static TERRITORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TerritoryMission\.lua:(.*)").expect("territory regex"));
static CAPTURED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)captur|control").expect("captured regex"));
static TICKING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MonitoredTicking (\d+)").expect("ticking regex"));
static SIM_CAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MaxSimultaneousEnemies (\d+)").expect("sim cap regex"));

/// Which log marker announced a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveMarker {
    /// `WaveDefend.lua: Starting wave N`
    Starting,
    /// `WaveDefend.lua: Defense wave: N`
    DefenseWave,
}

/// How an agent creation line is counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnKind {
    /// The shield drone subtype; always counted.
    Drone,
    /// Companions, allies, turrets and the like; never counted.
    Excluded,
    /// Anything else. Counted, then revisited by the spawn post-pass.
    Enemy(SpawnObservation),
}

/// One agent creation with best-effort name and tick extraction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpawnObservation {
    pub name: Option<String>,
    pub tick: Option<u32>,
}

/// A recognized event on a log line.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// An arbitration mission began. The name has the `Arbitration:` prefix removed.
    MissionStart { name: String },
    AgentSpawn(SpawnKind),
    /// Rotation reward screen was created.
    Reward,
    WaveStart { wave: u32, marker: WaveMarker },
    /// The game is idling between waves.
    PauseStart,
    /// Interception territory update; `captured` marks a capture/control line.
    Territory { captured: bool },
    LiveCount { value: u32 },
    SimCap { cap: u32 },
}

/// A classified line: its timestamp (if any) and the events found on it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassifiedLine {
    pub timestamp: Option<f64>,
    pub events: Vec<LogEvent>,
}

/// Parse the leading `<digits>.<digits>` timestamp.
///
/// A zero timestamp is treated like a missing one.
pub fn parse_timestamp(line: &str) -> Option<f64> {
    TIMESTAMP_RE
        .captures(line)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|ts| *ts > 0.0)
}

/// Normalize an agent path such as `/Npc/CorpusTechAgent12` to `CorpusTechAgent`.
fn agent_name(raw: &str) -> Option<String> {
    let tail = raw.rsplit('/').next().unwrap_or(raw);
    let name = tail.trim_end_matches(|c: char| c.is_ascii_digit());
    (!name.is_empty()).then(|| name.to_string())
}

fn capture_u32(re: &Regex, line: &str) -> Option<u32> {
    re.captures(line).and_then(|caps| caps[1].parse().ok())
}

/// Classify a single line.
///
/// Noise lines are expected to have been filtered already. A mission-name
/// line consumes the whole line: nothing else on it is classified, and
/// non-arbitration missions yield no events at all.
pub fn classify_line(line: &str, config: &ParserConfig) -> ClassifiedLine {
    let timestamp = parse_timestamp(line);
    let mut events = Vec::new();

    if let Some(caps) = MISSION_RE.captures(line) {
        let raw = caps[1].trim();
        if raw.contains("Arbitration") {
            events.push(LogEvent::MissionStart {
                name: raw.replacen("Arbitration:", "", 1).trim().to_string(),
            });
        }
        return ClassifiedLine { timestamp, events };
    }

    let tick = capture_u32(&TICKING_RE, line);

    if let Some(caps) = AGENT_RE.captures(line) {
        let agent = caps.get(1).map(|m| m.as_str());
        let kind = if DRONE_RE.is_match(line) {
            SpawnKind::Drone
        } else if agent.is_some_and(|a| config.is_excluded_agent(a)) {
            SpawnKind::Excluded
        } else {
            SpawnKind::Enemy(SpawnObservation {
                name: agent.and_then(agent_name),
                tick,
            })
        };
        events.push(LogEvent::AgentSpawn(kind));
    }

    if REWARD_RE.is_match(line) {
        events.push(LogEvent::Reward);
    }

    if let Some(wave) = capture_u32(&STARTING_WAVE_RE, line) {
        events.push(LogEvent::WaveStart {
            wave,
            marker: WaveMarker::Starting,
        });
    } else if let Some(wave) = capture_u32(&DEFENSE_WAVE_RE, line) {
        events.push(LogEvent::WaveStart {
            wave,
            marker: WaveMarker::DefenseWave,
        });
    }

    if SLEEP_RE.is_match(line) {
        events.push(LogEvent::PauseStart);
    }

    if let Some(caps) = TERRITORY_RE.captures(line) {
        events.push(LogEvent::Territory {
            captured: CAPTURED_RE.is_match(&caps[1]),
        });
    }

    if let Some(cap) = capture_u32(&SIM_CAP_RE, line) {
        events.push(LogEvent::SimCap { cap });
    }

    if let Some(value) = tick {
        events.push(LogEvent::LiveCount { value });
    }

    ClassifiedLine { timestamp, events }
}
