//! Runs command for listing locally stored runs.

use std::io::Write;

use anyhow::{Context, Result};
use arbi_db::{Database, RunRecord};

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config, limit: usize, json: bool) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let runs = db.list_runs(limit)?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &runs)?;
        writeln!(writer)?;
        return Ok(());
    }
    render_text(writer, &runs)
}

fn render_text<W: Write>(writer: &mut W, runs: &[RunRecord]) -> Result<()> {
    if runs.is_empty() {
        writeln!(writer, "No runs stored.")?;
        return Ok(());
    }

    for run in runs {
        let alias = if run.player_alias.is_empty() {
            "-"
        } else {
            &run.player_alias
        };
        writeln!(
            writer,
            "{}  {:<24} rounds {:>3}  drones {:>5}  vitus {:>5}  {}",
            run.created_at,
            run.mission_name,
            run.rounds_completed,
            run.drone_kills,
            run.actual_vitus,
            alias
        )?;
    }
    Ok(())
}
