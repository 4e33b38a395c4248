//! Spawn post-pass: separating real enemies from agents that never tick.
//!
//! Agents that sit in the level without ever advancing the monitored ticking
//! counter (decorative props, static emplacements) inflate the raw spawn
//! count. Walking adjacent named observations shows, for each agent name,
//! whether spawning it was followed by the counter going up.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::SpawnObservation;
use crate::session::Session;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnClassifyError {
    #[error("spawn observations were truncated at {retained} of {counted}")]
    Truncated { retained: usize, counted: u32 },
    #[error("{retained} spawn observations recorded but {counted} spawns counted")]
    CountMismatch { retained: usize, counted: u32 },
}

/// How often an agent's spawn was followed by the ticking counter moving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEvidence {
    /// Comparisons where the next tick was higher.
    pub advanced: u32,
    /// Comparisons where the next tick did not increase.
    pub stalled: u32,
}

impl AgentEvidence {
    /// Number of tick comparisons backing the verdict.
    pub const fn samples(&self) -> u32 {
        self.advanced + self.stalled
    }
}

/// Outcome of the spawn post-pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRefinement {
    /// Enemy spawns after removing non-ticking agents.
    pub enemy_spawns: u32,
    /// Agent names judged decorative, sorted.
    pub true_non_ticking: Vec<String>,
    /// Per-name tick evidence, for judging how much to trust the verdict.
    pub evidence: BTreeMap<String, AgentEvidence>,
}

/// Infers non-ticking agent names and recounts enemy spawns without them.
///
/// Names in `force_valid` are never removed. The result never exceeds the
/// number of observations.
pub fn classify_spawns(spawns: &[SpawnObservation], force_valid: &[String]) -> SpawnRefinement {
    let mut confirmed: HashSet<&str> = HashSet::new();
    let mut suspected: HashSet<&str> = HashSet::new();
    let mut evidence: BTreeMap<String, AgentEvidence> = BTreeMap::new();

    let named: Vec<(&str, Option<u32>)> = spawns
        .iter()
        .filter_map(|s| s.name.as_deref().map(|name| (name, s.tick)))
        .collect();

    for pair in named.windows(2) {
        let (prev_name, prev_tick) = pair[0];
        let (_, tick) = pair[1];
        let (Some(prev_tick), Some(tick)) = (prev_tick, tick) else {
            continue;
        };
        let entry = evidence.entry(prev_name.to_string()).or_default();
        if tick > prev_tick {
            confirmed.insert(prev_name);
            entry.advanced += 1;
        } else {
            suspected.insert(prev_name);
            entry.stalled += 1;
        }
    }

    let force_valid: HashSet<&str> = force_valid.iter().map(String::as_str).collect();
    let true_non_ticking: BTreeSet<&str> = suspected
        .difference(&confirmed)
        .copied()
        .filter(|name| !force_valid.contains(name))
        .collect();

    let kept = spawns
        .iter()
        .filter(|s| {
            s.name
                .as_deref()
                .is_none_or(|name| !true_non_ticking.contains(name))
        })
        .count();

    SpawnRefinement {
        enemy_spawns: u32::try_from(kept).unwrap_or(u32::MAX),
        true_non_ticking: true_non_ticking.into_iter().map(String::from).collect(),
        evidence,
    }
}

/// Runs the post-pass over a session, refusing input it cannot trust.
pub fn refine_session(
    session: &Session,
    force_valid: &[String],
) -> Result<SpawnRefinement, SpawnClassifyError> {
    let retained = session.all_spawns.len();
    let counted = session.enemy_spawns;
    if session.spawns_truncated {
        return Err(SpawnClassifyError::Truncated { retained, counted });
    }
    if u32::try_from(retained).ok() != Some(counted) {
        return Err(SpawnClassifyError::CountMismatch { retained, counted });
    }
    Ok(classify_spawns(&session.all_spawns, force_valid))
}
