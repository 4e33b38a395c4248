//! Acceptance policy for submitted runs.
//!
//! [`handle`] takes a transport-neutral request and answers with a status,
//! CORS headers and a JSON body. Checks run in a fixed order: preflight,
//! method, origin, payload shape, thresholds, then the duplicate check
//! performed by the store.

use arbi_db::{Database, DbError, NewRun, RunKey, run_hash};
use serde_json::{Value, json};
use thiserror::Error;

pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "https://svesk.github.io",
    "http://127.0.0.1:5500",
    "http://localhost:5500",
];

const MAX_ALIAS_CHARS: usize = 25;
const MAX_NOTES_CHARS: usize = 200;

const MIN_ROUNDS: f64 = 10.0;
const MIN_DRONE_KILLS: f64 = 500.0;
const MIN_DURATION_SECS: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayRequest<'a> {
    pub method: &'a str,
    pub origin: Option<&'a str>,
    pub body: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    /// `None` for preflight responses.
    pub body: Option<Value>,
}

impl GatewayResponse {
    fn new(status: u16, headers: Vec<(&'static str, String)>, body: Option<Value>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    fn error(status: u16, headers: Vec<(&'static str, String)>, message: &str) -> Self {
        Self::new(status, headers, Some(json!({ "error": message })))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Why a submission was turned away before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Run must be at least 10 rounds.")]
    TooFewRounds,
    #[error("Run must have at least 500 drone kills.")]
    TooFewDrones,
    #[error("Run duration is too short.")]
    TooShort,
    #[error("Actual Vitus is strictly required and must be a positive number.")]
    MissingActualVitus,
    #[error("Invalid data format or server error.")]
    Malformed,
}

/// Processes one request against `db`.
pub fn handle(
    request: &GatewayRequest<'_>,
    db: &mut Database,
    allowed_origins: &[String],
) -> GatewayResponse {
    let allowed = request
        .origin
        .is_some_and(|origin| allowed_origins.iter().any(|o| o == origin));
    let cors = cors_headers(request.origin.filter(|_| allowed), allowed_origins);

    if request.method == "OPTIONS" {
        return GatewayResponse::new(200, cors, None);
    }
    if request.method != "POST" {
        return GatewayResponse::error(405, cors, "Method not allowed");
    }
    if !allowed {
        tracing::debug!(origin = ?request.origin, "rejected origin");
        return GatewayResponse::error(403, cors, "Forbidden origin");
    }

    let mut headers = cors;
    headers.push(("Content-Type", "application/json".to_string()));

    let run = match serde_json::from_str::<Value>(request.body)
        .map_err(|_| Rejection::Malformed)
        .and_then(|body| accept_submission(&body))
    {
        Ok(run) => run,
        Err(rejection) => {
            tracing::debug!(reason = %rejection, "rejected submission");
            return GatewayResponse::error(400, headers, &rejection.to_string());
        }
    };

    match db.insert_run(&run) {
        Ok(id) => {
            tracing::info!(id = %id, mission = %run.mission_name, "accepted run");
            GatewayResponse::new(
                200,
                headers,
                Some(json!({ "message": "Run uploaded successfully!" })),
            )
        }
        Err(DbError::DuplicateRun { .. }) => {
            GatewayResponse::error(409, headers, "This run has already been uploaded.")
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to store run");
            GatewayResponse::error(400, headers, &Rejection::Malformed.to_string())
        }
    }
}

fn cors_headers(origin: Option<&str>, allowed_origins: &[String]) -> Vec<(&'static str, String)> {
    let allow_origin = origin
        .or_else(|| allowed_origins.first().map(String::as_str))
        .unwrap_or(DEFAULT_ALLOWED_ORIGINS[0]);
    vec![
        ("Access-Control-Allow-Origin", allow_origin.to_string()),
        ("Access-Control-Allow-Methods", "POST, OPTIONS".to_string()),
        (
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization".to_string(),
        ),
    ]
}

/// Validates a submission body and turns it into a storable run.
pub fn accept_submission(body: &Value) -> Result<NewRun, Rejection> {
    let Some(fields) = body.as_object() else {
        return Err(Rejection::Malformed);
    };
    let number = |key: &str| fields.get(key).and_then(Value::as_f64);

    let rounds_completed = number("roundsCompleted")
        .filter(|v| *v >= MIN_ROUNDS)
        .ok_or(Rejection::TooFewRounds)?;
    let drone_kills = number("droneKills")
        .filter(|v| *v >= MIN_DRONE_KILLS)
        .ok_or(Rejection::TooFewDrones)?;
    let duration_seconds = number("durationSeconds")
        .filter(|v| *v >= MIN_DURATION_SECS)
        .ok_or(Rejection::TooShort)?;
    let actual_vitus = number("actualVitus")
        .filter(|v| *v >= 0.0)
        .ok_or(Rejection::MissingActualVitus)?;

    let mission_name = fields
        .get("missionName")
        .and_then(Value::as_str)
        .ok_or(Rejection::Malformed)?;
    let total_enemies = number("totalEnemies").ok_or(Rejection::Malformed)?;

    let run_hash = run_hash(&RunKey {
        mission_name,
        rounds_completed,
        drone_kills,
        total_enemies,
        duration_seconds,
    });

    Ok(NewRun {
        run_hash,
        player_alias: sanitize_text(fields.get("playerAlias"), MAX_ALIAS_CHARS),
        notes: sanitize_text(fields.get("notes"), MAX_NOTES_CHARS),
        mission_name: mission_name.to_string(),
        is_defense: is_truthy(fields.get("isDefense")),
        rounds_completed,
        drone_kills,
        total_enemies,
        duration_seconds,
        actual_vitus,
        expected_vitus: number("expectedVitus"),
        luck_percentile: number("luckPercentile"),
        avg_drone_interval: number("avgDroneInterval"),
        threshold_saturation_percent: number("thresholdSaturationPercent"),
        saturation_buckets: fields.get("saturationBuckets").cloned().unwrap_or(Value::Null),
        drones_per_rotation: fields.get("dronesPerRotation").cloned().unwrap_or(Value::Null),
    })
}

/// Strips `<` and `>`, trims, and keeps at most `max_chars` characters.
///
/// Missing, null, empty and non-text values become an empty string;
/// numbers are kept in their JSON form.
pub fn sanitize_text(value: Option<&Value>, max_chars: usize) -> String {
    let text = match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => return String::new(),
    };
    text.replace(['<', '>'], "")
        .trim()
        .chars()
        .take(max_chars)
        .collect()
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origins() -> Vec<String> {
        DEFAULT_ALLOWED_ORIGINS.iter().map(ToString::to_string).collect()
    }

    fn valid_body() -> Value {
        json!({
            "missionName": "Hydron (Sedna)",
            "isDefense": true,
            "roundsCompleted": 12,
            "droneKills": 640,
            "totalEnemies": 2100,
            "durationSeconds": 1500,
            "actualVitus": 150,
            "expectedVitus": 140,
            "luckPercentile": 0.62,
            "avgDroneInterval": 2.3,
            "thresholdSaturationPercent": 41.5,
            "saturationBuckets": [10.0, 90.0],
            "dronesPerRotation": [50, 55],
            "playerAlias": "  <b>Tenno</b>  ",
            "notes": "solo run"
        })
    }

    fn post(db: &mut Database, origin: Option<&str>, body: &str) -> GatewayResponse {
        handle(
            &GatewayRequest {
                method: "POST",
                origin,
                body,
            },
            db,
            &origins(),
        )
    }

    fn error_message(response: &GatewayResponse) -> &str {
        response.body.as_ref().unwrap()["error"].as_str().unwrap()
    }

    #[test]
    fn preflight_returns_cors_headers_without_body() {
        let mut db = Database::open_in_memory().unwrap();
        let response = handle(
            &GatewayRequest {
                method: "OPTIONS",
                origin: Some("http://localhost:5500"),
                body: "",
            },
            &mut db,
            &origins(),
        );
        assert_eq!(response.status, 200);
        assert!(response.body.is_none());
        assert_eq!(
            response.header("access-control-allow-origin"),
            Some("http://localhost:5500")
        );
        assert_eq!(
            response.header("Access-Control-Allow-Methods"),
            Some("POST, OPTIONS")
        );
    }

    #[test]
    fn non_post_is_method_not_allowed() {
        let mut db = Database::open_in_memory().unwrap();
        let response = handle(
            &GatewayRequest {
                method: "GET",
                origin: Some("https://svesk.github.io"),
                body: "",
            },
            &mut db,
            &origins(),
        );
        assert_eq!(response.status, 405);
        assert_eq!(error_message(&response), "Method not allowed");
    }

    #[test]
    fn unknown_origin_is_forbidden_and_gets_default_cors_origin() {
        let mut db = Database::open_in_memory().unwrap();
        let response = post(&mut db, Some("https://evil.example"), "{}");
        assert_eq!(response.status, 403);
        assert_eq!(error_message(&response), "Forbidden origin");
        assert_eq!(
            response.header("Access-Control-Allow-Origin"),
            Some("https://svesk.github.io")
        );

        let response = post(&mut db, None, "{}");
        assert_eq!(response.status, 403);
    }

    #[test]
    fn valid_submission_is_stored_once() {
        let mut db = Database::open_in_memory().unwrap();
        let body = valid_body().to_string();

        let first = post(&mut db, Some("https://svesk.github.io"), &body);
        assert_eq!(first.status, 200);
        assert_eq!(
            first.body,
            Some(json!({ "message": "Run uploaded successfully!" }))
        );
        assert_eq!(first.header("Content-Type"), Some("application/json"));

        let second = post(&mut db, Some("https://svesk.github.io"), &body);
        assert_eq!(second.status, 409);
        assert_eq!(error_message(&second), "This run has already been uploaded.");

        let runs = db.list_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].player_alias, "bTenno/b");
    }

    #[test]
    fn threshold_failures_report_specific_messages() {
        let cases = [
            ("roundsCompleted", json!(9), "Run must be at least 10 rounds."),
            ("roundsCompleted", json!("12"), "Run must be at least 10 rounds."),
            ("droneKills", json!(499), "Run must have at least 500 drone kills."),
            ("durationSeconds", json!(599.9), "Run duration is too short."),
            (
                "actualVitus",
                json!(-1),
                "Actual Vitus is strictly required and must be a positive number.",
            ),
            (
                "actualVitus",
                Value::Null,
                "Actual Vitus is strictly required and must be a positive number.",
            ),
        ];
        for (key, value, message) in cases {
            let mut db = Database::open_in_memory().unwrap();
            let mut body = valid_body();
            body[key] = value;
            let response = post(&mut db, Some("http://127.0.0.1:5500"), &body.to_string());
            assert_eq!(response.status, 400, "{key}");
            assert_eq!(error_message(&response), message, "{key}");
        }
    }

    #[test]
    fn zero_actual_vitus_is_accepted() {
        let mut body = valid_body();
        body["actualVitus"] = json!(0);
        assert!(accept_submission(&body).is_ok());
    }

    #[test]
    fn malformed_json_is_bad_request() {
        let mut db = Database::open_in_memory().unwrap();
        let response = post(&mut db, Some("https://svesk.github.io"), "{not json");
        assert_eq!(response.status, 400);
        assert_eq!(
            error_message(&response),
            "Invalid data format or server error."
        );
    }

    #[test]
    fn missing_mission_name_is_malformed() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("missionName");
        assert_eq!(accept_submission(&body), Err(Rejection::Malformed));
    }

    #[test]
    fn integer_and_float_forms_hash_identically() {
        let a = accept_submission(&valid_body()).unwrap();
        let mut body = valid_body();
        body["durationSeconds"] = json!(1500.0);
        let b = accept_submission(&body).unwrap();
        assert_eq!(a.run_hash, b.run_hash);
    }

    #[test]
    fn sanitize_text_strips_trims_and_truncates() {
        let long = json!("x".repeat(40));
        assert_eq!(sanitize_text(Some(&long), 25).len(), 25);
        assert_eq!(sanitize_text(Some(&json!(" <script> ")), 25), "script");
        assert_eq!(sanitize_text(Some(&json!(42)), 25), "42");
        assert_eq!(sanitize_text(Some(&Value::Null), 25), "");
        assert_eq!(sanitize_text(None, 25), "");
    }
}
