//! Queue items: persisted, not-yet-started session snapshots awaiting an
//! operator to claim and start them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bonus::BonusState;
use crate::events::{ProjectEvent, ScanEvent};

/// A saved job. Created by "save to queue" (or staged by a remote preload),
/// consumed and deleted by "start from queue".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Store-assigned id; None until inserted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub company: String,
    pub project: String,
    pub category: String,
    pub size: String,
    /// Remaining countdown at save time, not the original budget.
    pub seconds: i64,
    #[serde(default)]
    pub original_seconds: Option<i64>,
    #[serde(default)]
    pub line_leader_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scan_history: Vec<ScanEvent>,
    #[serde(default)]
    pub project_events: Vec<ProjectEvent>,
    #[serde(default)]
    pub bonus: Option<BonusState>,
}

impl QueueItem {
    /// A queued job can start unattended only once it carries a leader name.
    pub fn has_leader(&self) -> bool {
        self.line_leader_name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    }
}
