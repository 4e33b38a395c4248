use arbi_core::{Summary, YieldEstimate};
use serde::{Deserialize, Serialize};

/// User-supplied values that complete a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub actual_vitus: f64,
    /// Replaces the parsed drone count, e.g. when the log missed kills.
    pub drone_override: Option<u32>,
    /// Live-count threshold for `thresholdSaturationPercent`.
    pub saturation_threshold: u32,
    pub player_alias: String,
    pub notes: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            actual_vitus: 0.0,
            drone_override: None,
            saturation_threshold: 20,
            player_alias: String::new(),
            notes: String::new(),
        }
    }
}

/// The record a gateway accepts, serialized in camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub mission_name: String,
    pub is_defense: bool,
    pub rounds_completed: u32,
    pub drone_kills: u32,
    pub total_enemies: u32,
    pub duration_seconds: f64,
    pub actual_vitus: f64,
    pub expected_vitus: f64,
    pub luck_percentile: f64,
    pub avg_drone_interval: Option<f64>,
    pub threshold_saturation_percent: f64,
    pub saturation_buckets: Vec<f64>,
    pub drones_per_rotation: Vec<u32>,
    pub player_alias: String,
    pub notes: String,
}

impl UploadPayload {
    pub fn from_summary(summary: &Summary, options: &UploadOptions) -> Self {
        let drone_kills = options.drone_override.unwrap_or_else(|| summary.drone_kills());
        let rounds = summary.rounds();
        let estimate = YieldEstimate::new(drone_kills, rounds);

        Self {
            mission_name: summary.mission_name().to_string(),
            is_defense: summary.session.is_defense,
            rounds_completed: rounds,
            drone_kills,
            total_enemies: summary.enemy_spawns.saturating_add(drone_kills),
            // Whole seconds keep the dedupe hash stable across re-parses.
            duration_seconds: summary.duration_secs.round(),
            actual_vitus: options.actual_vitus,
            expected_vitus: estimate.mean.round(),
            luck_percentile: estimate.percentile(options.actual_vitus),
            avg_drone_interval: summary.avg_drone_interval,
            threshold_saturation_percent: summary
                .saturation
                .percent_at_least(options.saturation_threshold),
            saturation_buckets: summary.saturation.percentages(),
            drones_per_rotation: summary.drones_per_rotation.clone(),
            player_alias: options.player_alias.clone(),
            notes: options.notes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbi_core::{ParserConfig, Session};

    fn summary() -> Summary {
        let session = Session {
            mission_name: "Hydron (Sedna)".to_string(),
            is_defense: true,
            drone_kills: 600,
            enemy_spawns: 900,
            rounds: 12,
            drone_timestamps: vec![10.0, 20.0, 40.0],
            reward_timestamps: vec![30.0, 60.0],
            last_activity_time: Some(910.4),
            precise_start_time: Some(10.0),
            has_data: true,
            ..Session::default()
        };
        Summary::from_session(session, 1, &ParserConfig::default())
    }

    #[test]
    fn payload_uses_camel_case_keys() {
        let payload = UploadPayload::from_summary(&summary(), &UploadOptions::default());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["missionName"], "Hydron (Sedna)");
        assert_eq!(json["roundsCompleted"], 12);
        assert_eq!(json["isDefense"], true);
        assert!(json.get("thresholdSaturationPercent").is_some());
        assert!(json.get("mission_name").is_none());
    }

    #[test]
    fn payload_derives_totals_and_duration() {
        let payload = UploadPayload::from_summary(&summary(), &UploadOptions::default());
        assert_eq!(payload.drone_kills, 600);
        assert_eq!(payload.total_enemies, 1500);
        assert!((payload.duration_seconds - 900.0).abs() < f64::EPSILON);
        assert_eq!(payload.drones_per_rotation, vec![2, 1]);
    }

    #[test]
    fn drone_override_feeds_totals_and_expectation() {
        let options = UploadOptions {
            drone_override: Some(1000),
            actual_vitus: 400.0,
            ..UploadOptions::default()
        };
        let payload = UploadPayload::from_summary(&summary(), &options);
        let estimate = YieldEstimate::new(1000, 12);
        assert_eq!(payload.drone_kills, 1000);
        assert_eq!(payload.total_enemies, 1900);
        assert!((payload.expected_vitus - estimate.mean.round()).abs() < f64::EPSILON);
        assert!((payload.luck_percentile - estimate.percentile(400.0)).abs() < 1e-12);
    }
}
