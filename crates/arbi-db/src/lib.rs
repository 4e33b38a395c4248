//! Storage layer for uploaded runs.
//!
//! Provides persistence for accepted run submissions using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Wrap it in a `Mutex` to share it across threads.
//!
//! # Schema
//!
//! Each row in `runs` is one accepted submission. `run_hash` is a content
//! hash over the fields that identify a run (see [`run_hash`]) and carries a
//! UNIQUE constraint, so the same run cannot be stored twice.
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision, always UTC. `saturation_buckets` and `drones_per_rotation`
//! hold JSON arrays as TEXT.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A run with the same content hash is already stored.
    #[error("run {run_hash} has already been stored")]
    DuplicateRun { run_hash: String },
    /// A JSON column could not be encoded or decoded.
    #[error("invalid JSON column: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Fields that identify a run for deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct RunKey<'a> {
    pub mission_name: &'a str,
    pub rounds_completed: f64,
    pub drone_kills: f64,
    pub total_enemies: f64,
    pub duration_seconds: f64,
}

/// A validated run ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    pub run_hash: String,
    pub player_alias: String,
    pub notes: String,
    pub mission_name: String,
    pub is_defense: bool,
    pub rounds_completed: f64,
    pub drone_kills: f64,
    pub total_enemies: f64,
    pub duration_seconds: f64,
    pub actual_vitus: f64,
    pub expected_vitus: Option<f64>,
    pub luck_percentile: Option<f64>,
    pub avg_drone_interval: Option<f64>,
    pub threshold_saturation_percent: Option<f64>,
    pub saturation_buckets: Value,
    pub drones_per_rotation: Value,
}

/// A stored run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub created_at: String,
    pub run_hash: String,
    pub player_alias: String,
    pub notes: String,
    pub mission_name: String,
    pub is_defense: bool,
    pub rounds_completed: f64,
    pub drone_kills: f64,
    pub total_enemies: f64,
    pub duration_seconds: f64,
    pub actual_vitus: f64,
    pub expected_vitus: Option<f64>,
    pub luck_percentile: Option<f64>,
    pub avg_drone_interval: Option<f64>,
    pub threshold_saturation_percent: Option<f64>,
    pub saturation_buckets: Value,
    pub drones_per_rotation: Value,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                run_hash TEXT NOT NULL UNIQUE,
                player_alias TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                mission_name TEXT NOT NULL,
                is_defense INTEGER NOT NULL DEFAULT 0,
                rounds_completed REAL NOT NULL,
                drone_kills REAL NOT NULL,
                total_enemies REAL NOT NULL,
                duration_seconds REAL NOT NULL,
                actual_vitus REAL NOT NULL,
                expected_vitus REAL,
                luck_percentile REAL,
                avg_drone_interval REAL,
                threshold_saturation_percent REAL,
                saturation_buckets TEXT NOT NULL DEFAULT 'null',
                drones_per_rotation TEXT NOT NULL DEFAULT 'null'
            );

            CREATE INDEX IF NOT EXISTS idx_runs_created_at ON runs(created_at);
            ",
        )?;
        Ok(())
    }

    /// Stores a run, returning its generated ID.
    ///
    /// Fails with [`DbError::DuplicateRun`] when the hash is already present.
    pub fn insert_run(&mut self, run: &NewRun) -> Result<String, DbError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let saturation_buckets = serde_json::to_string(&run.saturation_buckets)?;
        let drones_per_rotation = serde_json::to_string(&run.drones_per_rotation)?;

        let result = self.conn.execute(
            "
            INSERT INTO runs (
                id, created_at, run_hash, player_alias, notes, mission_name, is_defense,
                rounds_completed, drone_kills, total_enemies, duration_seconds, actual_vitus,
                expected_vitus, luck_percentile, avg_drone_interval,
                threshold_saturation_percent, saturation_buckets, drones_per_rotation
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                id,
                created_at,
                run.run_hash,
                run.player_alias,
                run.notes,
                run.mission_name,
                run.is_defense,
                run.rounds_completed,
                run.drone_kills,
                run.total_enemies,
                run.duration_seconds,
                run.actual_vitus,
                run.expected_vitus,
                run.luck_percentile,
                run.avg_drone_interval,
                run.threshold_saturation_percent,
                saturation_buckets,
                drones_per_rotation,
            ],
        );

        match result {
            Ok(_) => {
                tracing::debug!(id = %id, run_hash = %run.run_hash, "stored run");
                Ok(id)
            }
            Err(err) if is_unique_violation(&err) => Err(DbError::DuplicateRun {
                run_hash: run.run_hash.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether a run with this hash is already stored.
    pub fn contains_run(&self, run_hash: &str) -> Result<bool, DbError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM runs WHERE run_hash = ?)",
            [run_hash],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Lists the most recent runs, newest first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "
            SELECT id, created_at, run_hash, player_alias, notes, mission_name, is_defense,
                   rounds_completed, drone_kills, total_enemies, duration_seconds, actual_vitus,
                   expected_vitus, luck_percentile, avg_drone_interval,
                   threshold_saturation_percent, saturation_buckets, drones_per_rotation
            FROM runs
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            ",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok((
                RunRecord {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    run_hash: row.get(2)?,
                    player_alias: row.get(3)?,
                    notes: row.get(4)?,
                    mission_name: row.get(5)?,
                    is_defense: row.get(6)?,
                    rounds_completed: row.get(7)?,
                    drone_kills: row.get(8)?,
                    total_enemies: row.get(9)?,
                    duration_seconds: row.get(10)?,
                    actual_vitus: row.get(11)?,
                    expected_vitus: row.get(12)?,
                    luck_percentile: row.get(13)?,
                    avg_drone_interval: row.get(14)?,
                    threshold_saturation_percent: row.get(15)?,
                    saturation_buckets: Value::Null,
                    drones_per_rotation: Value::Null,
                },
                row.get::<_, String>(16)?,
                row.get::<_, String>(17)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (mut run, buckets, per_rotation) = row?;
            run.saturation_buckets = serde_json::from_str(&buckets)?;
            run.drones_per_rotation = serde_json::from_str(&per_rotation)?;
            runs.push(run);
        }
        Ok(runs)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Content hash identifying a run: SHA-256 hex over
/// `"{mission}-{rounds}-{drones}-{total_enemies}-{duration}"`.
///
/// Numbers render the way they print as JSON numbers, so `600.0` hashes as
/// `600` and hashes stay stable for clients that send integers.
pub fn run_hash(key: &RunKey<'_>) -> String {
    let raw = format!(
        "{}-{}-{}-{}-{}",
        key.mission_name,
        json_number(key.rounds_completed),
        json_number(key.drone_kills),
        json_number(key.total_enemies),
        json_number(key.duration_seconds),
    );
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[allow(clippy::float_cmp)]
fn json_number(value: f64) -> String {
    // Adding 0.0 folds -0.0 into 0.0.
    let value = value + 0.0;
    if value.trunc() == value && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
