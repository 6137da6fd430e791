//! Typed feedback values for guarded operations.
//!
//! Nothing in the session core throws for a rejected action; callers get one
//! of these back and decide how to surface it. Serialization shape is stable
//! because the daemon embeds feedback directly in IPC responses.

use serde::Serialize;

/// Outcome of processing a badge scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ScanFeedback {
    ClockedIn { badge_id: String },
    ClockedOut { badge_id: String },
    IgnoredPaused,
    IgnoredFinished,
}

/// Outcome of a manual lunch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LunchFeedback {
    Started,
    IgnoredPaused,
    IgnoredNoWorkers,
    IgnoredAlreadyUsed,
    IgnoredFinished,
}

/// Outcome of pause/resume/toggle requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PauseFeedback {
    Paused,
    Resumed,
    WrongCode,
    /// The active state only exits via its own credential-gated toggle.
    CredentialGated,
    AlreadyPaused,
    IgnoredFinished,
}

/// Outcome of a save-to-queue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SaveFeedback {
    Queued,
    MissingProjectInfo,
}

/// Outcome of starting a queued session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StartFeedback {
    Started,
    /// The queue item has no line leader; the caller must collect one first.
    LeaderRequired,
}

/// Outcome of an operator edit of a worker's total minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EditFeedback {
    Updated,
    UnknownWorker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_serializes_with_result_tag() {
        let json = serde_json::to_value(ScanFeedback::ClockedIn {
            badge_id: "A1".to_string(),
        })
        .unwrap();
        assert_eq!(json["result"], "clocked_in");
        assert_eq!(json["badge_id"], "A1");

        let json = serde_json::to_value(PauseFeedback::CredentialGated).unwrap();
        assert_eq!(json["result"], "credential_gated");
    }
}
