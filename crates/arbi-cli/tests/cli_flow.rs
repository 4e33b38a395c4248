//! End-to-end tests for the `arbi` binary.
//!
//! Tests the full pipeline: analyze a log → import a payload → list runs.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn arbi_binary() -> String {
    env!("CARGO_BIN_EXE_arbi").to_string()
}

/// Runs `arbi` with HOME and XDG dirs pointed at `temp`.
fn arbi(temp: &Path, args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(arbi_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env("XDG_DATA_HOME", temp.join("data"))
        .env_remove("RUST_LOG")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn arbi");
    if let Some(input) = stdin {
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
    }
    drop(child.stdin.take());
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_defense_log(dir: &Path) -> std::path::PathBuf {
    let mut log = String::new();
    log.push_str("0.500 Sys [Info]: boot\n");
    log.push_str(
        "1.000 Script [Info]: ThemedSquadOverlay.lua: Mission name: Arbitration: Tyana Pass (Mars)\n",
    );
    log.push_str("2.000 Script [Info]: WaveDefend.lua: Defense wave: 1\n");
    for i in 0..30 {
        let t = 5.0 + f64::from(i) * 2.0;
        log.push_str(&format!(
            "{t:.3} AI [Info]: OnAgentCreated /Npc/CorpusEliteShieldDroneAgent4 MonitoredTicking {}\n",
            10 + i
        ));
    }
    log.push_str("70.000 Sys [Info]: Created /Lotus/Interface/DefenseReward.swf\n");
    log.push_str("72.000 Script [Info]: WaveDefend.lua: Starting wave 4\n");
    let path = dir.join("EE.log");
    std::fs::write(&path, log).unwrap();
    path
}

#[test]
fn test_analyze_json_reports_selected_session() {
    let temp = TempDir::new().unwrap();
    let log = write_defense_log(temp.path());

    let output = arbi(
        temp.path(),
        &["analyze", log.to_str().unwrap(), "--json"],
        None,
    );
    assert!(
        output.status.success(),
        "analyze failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let summary = &json["summary"];
    assert_eq!(summary["session"]["mission_name"], "Tyana Pass (Mars)");
    assert_eq!(summary["session"]["is_defense"], true);
    assert_eq!(summary["session"]["drone_kills"], 30);
    assert_eq!(summary["session"]["rounds"], 1);
    assert_eq!(summary["waves"], 3);
    assert_eq!(summary["start_time"], 2.0);
    assert!(json["actual"].is_null());
}

#[test]
fn test_analyze_missing_log_fails_with_guidance() {
    let temp = TempDir::new().unwrap();
    let output = arbi(temp.path(), &["analyze", "/nonexistent/EE.log"], None);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("copy the file somewhere else"), "{stderr}");
}

#[test]
fn test_import_then_list_runs() {
    let temp = TempDir::new().unwrap();
    let payload = serde_json::json!({
        "missionName": "Tyana Pass (Mars)",
        "isDefense": true,
        "roundsCompleted": 15,
        "droneKills": 820,
        "totalEnemies": 2600,
        "durationSeconds": 1800,
        "actualVitus": 210,
        "saturationBuckets": [0, 100],
        "dronesPerRotation": [55, 54],
        "playerAlias": "<Tenno>",
        "notes": "first try"
    })
    .to_string();

    let first = arbi(temp.path(), &["import"], Some(&payload));
    assert!(
        first.status.success(),
        "import failed: {}",
        String::from_utf8_lossy(&first.stderr)
    );
    assert_eq!(stdout(&first).trim(), "Run uploaded successfully!");

    let second = arbi(temp.path(), &["import"], Some(&payload));
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already been uploaded"));

    let listed = arbi(temp.path(), &["runs", "--json"], None);
    assert!(listed.status.success());
    let runs: serde_json::Value = serde_json::from_str(&stdout(&listed)).unwrap();
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["player_alias"], "Tenno");
    assert_eq!(runs[0]["drones_per_rotation"], serde_json::json!([55, 54]));

    assert!(temp.path().join("data/arbi/arbi.db").exists());
}

#[test]
fn test_import_rejects_short_run() {
    let temp = TempDir::new().unwrap();
    let payload = r#"{"missionName":"X","roundsCompleted":3,"droneKills":900,"totalEnemies":1,"durationSeconds":900,"actualVitus":1}"#;
    let output = arbi(temp.path(), &["import"], Some(payload));
    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Run must be at least 10 rounds.")
    );
}

#[test]
fn test_env_overrides_database_path() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("custom.db");
    let output = Command::new(arbi_binary())
        .env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env("ARBI_DATABASE_PATH", &db_path)
        .args(["runs"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output), "No runs stored.\n");
    assert!(db_path.exists());
}
