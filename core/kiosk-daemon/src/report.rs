//! The final report written when a session finishes: per-worker minutes,
//! project metadata, and bonus standing, for the external reporting
//! collaborator to pick up.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crewclock_core::{BonusState, Session};

#[derive(Debug, Serialize)]
pub struct WorkerReport {
    pub badge_id: String,
    pub minutes_worked: f64,
}

#[derive(Debug, Serialize)]
pub struct FinalReport {
    pub company: String,
    pub project: String,
    pub line_leader: String,
    pub category: String,
    pub size: String,
    pub completed_at: DateTime<Utc>,
    pub bonus_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_reason: Option<String>,
    pub workers: Vec<WorkerReport>,
}

impl FinalReport {
    pub fn from_session(session: &Session, completed_at: DateTime<Utc>) -> Self {
        let mut workers: Vec<WorkerReport> = session
            .ledger()
            .iter()
            .map(|w| WorkerReport {
                badge_id: w.badge_id.clone(),
                minutes_worked: w.minutes_worked,
            })
            .collect();
        workers.sort_by(|a, b| a.badge_id.cmp(&b.badge_id));

        let info = session.info();
        let bonus_reason = match session.bonus() {
            BonusState::Eligible => None,
            BonusState::Revoked { reason } => Some(reason.describe().to_string()),
        };

        Self {
            company: info.company.clone(),
            project: info.project.clone(),
            line_leader: info.line_leader.clone(),
            category: info.category.clone(),
            size: info.size.clone(),
            completed_at,
            bonus_eligible: session.bonus().is_eligible(),
            bonus_reason,
            workers,
        }
    }
}

/// Writes the report into the reports directory, one file per finish.
pub fn write_report(dir: &Path, report: &FinalReport) -> Result<PathBuf, String> {
    fs_err::create_dir_all(dir)
        .map_err(|err| format!("failed to create reports directory: {}", err))?;

    let name = format!(
        "report-{}.json",
        report.completed_at.format("%Y%m%dT%H%M%SZ")
    );
    let path = dir.join(name);
    let content = serde_json::to_string_pretty(report)
        .map_err(|err| format!("failed to serialize report: {}", err))?;
    fs_err::write(&path, content).map_err(|err| format!("failed to write report: {}", err))?;
    Ok(path)
}
