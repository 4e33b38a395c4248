//! Analyze command: parse a log and report the selected run.

use std::io::Write;

use anyhow::{Context, Result};
use arbi_core::yield_model::Scenario;
use arbi_core::{LogParser, LuckTier, Summary, YieldEstimate};
use serde::Serialize;

use crate::Config;
use crate::cli::AnalyzeArgs;

/// Everything the analyze command prints.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub summary: Summary,
    /// Drone count used for the yield model.
    pub drones_used: u32,
    pub saturation_threshold: u32,
    pub percent_at_threshold: f64,
    pub expected: YieldEstimate,
    pub scenarios: Vec<ScenarioYield>,
    pub actual: Option<ActualYield>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioYield {
    #[serde(flatten)]
    pub scenario: Scenario,
    pub vitus: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActualYield {
    pub vitus: f64,
    pub percentile: f64,
    pub tier: LuckTier,
}

impl Analysis {
    pub fn new(
        summary: Summary,
        drone_override: Option<u32>,
        actual_vitus: Option<f64>,
        threshold: u32,
    ) -> Self {
        let drones_used = drone_override.unwrap_or_else(|| summary.drone_kills());
        let expected = YieldEstimate::new(drones_used, summary.rounds());
        let scenarios = expected
            .scenarios()
            .into_iter()
            .map(|(scenario, vitus)| ScenarioYield { scenario, vitus })
            .collect();
        let actual = actual_vitus.map(|vitus| {
            let percentile = expected.percentile(vitus);
            ActualYield {
                vitus,
                percentile,
                tier: LuckTier::from_percentile(percentile),
            }
        });

        Self {
            percent_at_threshold: summary.saturation.percent_at_least(threshold),
            saturation_threshold: threshold,
            drones_used,
            expected,
            scenarios,
            actual,
            summary,
        }
    }
}

pub fn run<W: Write>(writer: &mut W, config: &Config, args: &AnalyzeArgs) -> Result<()> {
    let parser = LogParser::new(config.parser.clone());
    let summary = parser
        .parse_path(&args.log)
        .with_context(|| format!("failed to parse {}", args.log.display()))?;

    let threshold = args
        .threshold
        .unwrap_or(config.upload.saturation_threshold);
    let analysis = Analysis::new(summary, args.drones, args.actual_vitus, threshold);

    if args.json {
        serde_json::to_writer_pretty(&mut *writer, &analysis)?;
        writeln!(writer)?;
    } else {
        render_text(writer, &analysis)?;
    }
    Ok(())
}

pub fn render_text<W: Write>(writer: &mut W, analysis: &Analysis) -> Result<()> {
    let summary = &analysis.summary;
    let session = &summary.session;

    let kind = if session.is_defense {
        " [defense]"
    } else if session.is_interception {
        " [interception]"
    } else {
        ""
    };
    writeln!(writer, "Mission: {}{kind}", session.mission_name)?;
    writeln!(writer, "Sessions found: {}", summary.sessions_found)?;
    writeln!(writer, "Duration: {}", format_duration(summary.duration_secs))?;
    writeln!(writer, "Rounds: {}", session.rounds)?;
    if let Some(waves) = summary.waves {
        writeln!(writer, "Waves: {waves}")?;
    }
    if analysis.drones_used == session.drone_kills {
        writeln!(writer, "Drone kills: {}", session.drone_kills)?;
    } else {
        writeln!(
            writer,
            "Drone kills: {} (parsed {})",
            analysis.drones_used, session.drone_kills
        )?;
    }
    writeln!(
        writer,
        "Enemy spawns: {} (raw {})",
        summary.enemy_spawns, summary.raw_enemy_spawns
    )?;
    writeln!(writer, "Total enemies: {}", summary.total_enemies)?;
    match summary.avg_drone_interval {
        Some(interval) => writeln!(writer, "Avg drone interval: {interval:.2}s")?,
        None => writeln!(writer, "Avg drone interval: n/a")?,
    }
    writeln!(
        writer,
        "Drones per rotation: {}",
        join_or_none(summary.drones_per_rotation.iter())
    )?;
    writeln!(
        writer,
        "Non-ticking agents: {}",
        join_or_none(summary.true_non_ticking.iter())
    )?;

    writeln!(writer)?;
    let percentages = summary.saturation.percentages();
    if percentages.is_empty() {
        writeln!(writer, "Saturation: no live-count data")?;
    } else {
        writeln!(writer, "Saturation:")?;
        for (i, pct) in percentages.iter().enumerate() {
            writeln!(writer, "  {:<6} {pct:>5.1}%", summary.saturation.label(i))?;
        }
        writeln!(
            writer,
            "  >= {} live: {:.1}%",
            analysis.saturation_threshold, analysis.percent_at_threshold
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "Expected Vitus:")?;
    for entry in &analysis.scenarios {
        writeln!(
            writer,
            "  {} {:<10} {}",
            entry.scenario.odds, entry.scenario.label, entry.vitus
        )?;
    }
    if let Some(actual) = &analysis.actual {
        writeln!(
            writer,
            "Actual: {} ({:.1}th percentile, {})",
            actual.vitus,
            actual.percentile * 100.0,
            actual.tier
        )?;
    }
    Ok(())
}

fn join_or_none<T: ToString>(items: impl Iterator<Item = T>) -> String {
    let joined = items.map(|item| item.to_string()).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{}m {:02}s", total / 60, total % 60)
}
