//! Splitting a log into mission attempts and picking the one to report.

use crate::classify::{ClassifiedLine, LogEvent};
use crate::config::{ParserConfig, SelectionConfig};
use crate::session::Session;

/// Owns the completed sessions and the one currently being filled.
#[derive(Debug)]
pub struct SessionSegmenter<'a> {
    config: &'a ParserConfig,
    sessions: Vec<Session>,
    current: Session,
}

impl<'a> SessionSegmenter<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        Self {
            config,
            sessions: Vec::new(),
            current: Session::default(),
        }
    }

    /// Feeds one classified line.
    pub fn push(&mut self, line: &ClassifiedLine) {
        for event in &line.events {
            if let LogEvent::MissionStart { name } = event {
                self.start_mission(name, line.timestamp);
            } else {
                self.current.apply(line.timestamp, event, self.config);
            }
        }
    }

    fn start_mission(&mut self, name: &str, timestamp: Option<f64>) {
        if let (Some(ts), Some(last)) = (timestamp, self.current.last_activity_time) {
            if ts < last {
                tracing::debug!(
                    mission = name,
                    timestamp = ts,
                    last_activity = last,
                    "ignoring stale mission start"
                );
                return;
            }
        }

        let next = Session::start(name, timestamp, self.config);
        let previous = std::mem::replace(&mut self.current, next);
        self.retain(previous);
        tracing::debug!(mission = name, timestamp, "opened session");
    }

    fn retain(&mut self, mut session: Session) {
        if session.is_non_trivial() {
            session.close();
            tracing::debug!(
                mission = %session.mission_name,
                drones = session.drone_kills,
                rounds = session.rounds,
                "closed session"
            );
            self.sessions.push(session);
        }
    }

    /// Flushes the current session and returns every retained session.
    pub fn finish(mut self) -> Vec<Session> {
        let current = std::mem::take(&mut self.current);
        self.retain(current);
        self.sessions
    }
}

/// Picks the most recent session that looks complete.
///
/// Scans from the end for a session with enough rounds and drone kills,
/// then falls back to the last session, then to an empty one.
pub fn select_session(sessions: &[Session], rules: &SelectionConfig) -> Session {
    sessions
        .iter()
        .rev()
        .find(|s| s.rounds > rules.min_rounds && s.drone_kills > rules.min_drone_kills)
        .or_else(|| sessions.last())
        .cloned()
        .unwrap_or_default()
}
