//! Markdown rendering of rollups
//!
//! Reports are written as `report-<dd-mm-yy_HH-MM>.md`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tabled::Tabled;
use tracing::info;

use super::rollup::TeamRollup;
use crate::error::Result;

const NO_DATA: &str = "no data";

/// One summary line per team, for table or JSON output
#[derive(Debug, Serialize, Tabled)]
pub struct RollupRow {
    pub team: String,
    pub max_score: String,
    pub min_score: String,
    pub flags_submitted: String,
    pub flags_lost: String,
    pub worst_sla: String,
    pub downtime: u64,
}

impl From<&TeamRollup> for RollupRow {
    fn from(rollup: &TeamRollup) -> Self {
        let has_data = rollup.has_data();
        Self {
            team: rollup.team.clone(),
            max_score: opt(rollup.max_team_score),
            min_score: opt(rollup.min_team_score),
            flags_submitted: if has_data {
                rollup.total_flags_submitted().to_string()
            } else {
                NO_DATA.to_string()
            },
            flags_lost: if has_data {
                rollup.total_flags_lost().to_string()
            } else {
                NO_DATA.to_string()
            },
            worst_sla: rollup
                .worst_sla()
                .map(|(service, sla)| format!("{:.2}% ({})", sla, service))
                .unwrap_or_else(|| NO_DATA.to_string()),
            downtime: rollup.downtime_count,
        }
    }
}

/// What the downtime figures of a report were counted over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowntimeScope {
    /// Down observations of the monitoring run that just ended
    ThisRun,
    /// Every down row in the persisted store, across all runs
    StoredHistory,
}

impl DowntimeScope {
    pub fn describe(&self) -> &'static str {
        match self {
            DowntimeScope::ThisRun => "down services observed per poll during this monitoring run",
            DowntimeScope::StoredHistory => {
                "down rows in the persisted store, across every recorded run"
            }
        }
    }
}

pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("report-{}.md", at.format("%d-%m-%y_%H-%M"))
}

pub fn render_markdown(
    rollups: &[TeamRollup],
    scope: DowntimeScope,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Scoreboard report");
    let _ = writeln!(
        out,
        "\nGenerated at {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Downtime observations count {}.\n", scope.describe());

    if rollups.is_empty() {
        let _ = writeln!(out, "No teams were monitored.");
        return out;
    }

    for rollup in rollups {
        let _ = writeln!(out, "## {}\n", rollup.team);

        if !rollup.has_data() {
            let _ = writeln!(out, "_{}_\n", NO_DATA);
            let _ = writeln!(out, "- Downtime observations: {}\n", rollup.downtime_count);
            continue;
        }

        let _ = writeln!(out, "- Max team score: {}", opt(rollup.max_team_score));
        let _ = writeln!(out, "- Min team score: {}", opt(rollup.min_team_score));
        let _ = writeln!(
            out,
            "- Flags submitted: {}",
            rollup.total_flags_submitted()
        );
        let _ = writeln!(out, "- Flags lost: {}", rollup.total_flags_lost());
        let _ = writeln!(out, "- Downtime observations: {}\n", rollup.downtime_count);

        let _ = writeln!(
            out,
            "| Service | Max score | Min score | Flags submitted | Flags lost | Min SLA |"
        );
        let _ = writeln!(out, "|---|---|---|---|---|---|");
        for service in &rollup.services {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                service.service,
                opt(service.max_score),
                opt(service.min_score),
                opt(service.flags_submitted),
                opt(service.flags_lost),
                service
                    .min_sla
                    .map(|v| format!("{:.2}%", v))
                    .unwrap_or_else(|| NO_DATA.to_string()),
            );
        }
        let _ = writeln!(out);
    }

    out
}

/// Render and write the report into `dir`, creating it if needed
pub fn write_report(
    dir: &Path,
    rollups: &[TeamRollup],
    scope: DowntimeScope,
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(at));
    std::fs::write(&path, render_markdown(rollups, scope, at))?;
    info!("Report written to {}", path.display());
    Ok(path)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NO_DATA.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::rollup::ServiceRollup;
    use chrono::TimeZone;

    fn sample() -> Vec<TeamRollup> {
        vec![
            TeamRollup {
                team: "acme".to_string(),
                max_team_score: Some(420),
                min_team_score: Some(100),
                services: vec![ServiceRollup {
                    service: "svc-1".to_string(),
                    flags_submitted: Some(7),
                    flags_lost: Some(2),
                    min_sla: Some(83.333),
                    max_score: Some(300),
                    min_score: Some(50),
                    samples: 6,
                }],
                downtime_count: 3,
            },
            TeamRollup {
                team: "globex".to_string(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_report_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 6, 5, 14, 7, 0).unwrap();
        assert_eq!(report_file_name(at), "report-05-06-24_14-07.md");
    }

    #[test]
    fn test_render_markdown() {
        let at = Utc.with_ymd_and_hms(2024, 6, 5, 14, 7, 0).unwrap();
        let text = render_markdown(&sample(), DowntimeScope::ThisRun, at);
        assert!(text.contains("## acme"));
        assert!(text.contains("during this monitoring run"));
        assert!(text.contains("- Max team score: 420"));
        assert!(text.contains("| svc-1 | 300 | 50 | 7 | 2 | 83.33% |"));
        assert!(text.contains("## globex\n\n_no data_"));
    }

    #[test]
    fn test_rollup_row() {
        let rollups = sample();
        let row = RollupRow::from(&rollups[0]);
        assert_eq!(row.flags_submitted, "7");
        assert_eq!(row.worst_sla, "83.33% (svc-1)");
        let empty = RollupRow::from(&rollups[1]);
        assert_eq!(empty.max_score, "no data");
        assert_eq!(empty.flags_lost, "no data");
    }

    #[test]
    fn test_write_report() {
        let dir = std::env::temp_dir().join(format!("scorewatch-report-{}", std::process::id()));
        let at = Utc.with_ymd_and_hms(2024, 6, 5, 14, 7, 0).unwrap();
        let path = write_report(&dir, &sample(), DowntimeScope::StoredHistory, at).unwrap();
        assert!(path.ends_with("report-05-06-24_14-07.md"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("acme"));
        assert!(text.contains("across every recorded run"));
        assert!(!text.contains("during this monitoring run"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
