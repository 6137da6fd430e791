//! The pause-reason hierarchy: exactly one state is active at any time, and
//! only [`PauseState::Running`] lets the countdown drain.
//!
//! Credential-gated states (QC holds, technician holds) can only be exited
//! through the same credential-gated toggle that entered them; a generic
//! resume is rejected while one is active. Manual pauses and lunches resume
//! generically or by their own timers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::ProjectEventKind;

/// The single authoritative "why is the clock not draining" state.
///
/// Variant payloads keep the pause context consistent with the state itself:
/// a manual lunch always knows when it started, a technician hold carries
/// the machine/line it was raised for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PauseState {
    Running,
    ManualPause,
    ManualLunch { since: DateTime<Utc> },
    // Older snapshots carry the deprecated "lunch" case; it behaved like a
    // window-driven lunch, so it maps here on load.
    #[serde(alias = "lunch")]
    AutoLunch,
    QcCrew,
    QcComponent,
    Technician { line: Option<String> },
}

impl PauseState {
    pub fn is_paused(&self) -> bool {
        !matches!(self, PauseState::Running)
    }

    /// Credential-gated states reject generic resume; only the matching
    /// toggle with the right code exits them.
    pub fn is_credential_gated(&self) -> bool {
        matches!(
            self,
            PauseState::QcCrew | PauseState::QcComponent | PauseState::Technician { .. }
        )
    }

    pub fn is_lunch(&self) -> bool {
        matches!(
            self,
            PauseState::ManualLunch { .. } | PauseState::AutoLunch
        )
    }

    /// The project-event category recorded when entering this state.
    /// Running has no entry event.
    pub fn event_kind(&self) -> Option<ProjectEventKind> {
        match self {
            PauseState::Running => None,
            PauseState::ManualPause => Some(ProjectEventKind::Pause),
            PauseState::ManualLunch { .. } | PauseState::AutoLunch => {
                Some(ProjectEventKind::Lunch)
            }
            PauseState::QcCrew => Some(ProjectEventKind::QcCrew),
            PauseState::QcComponent => Some(ProjectEventKind::QcComponent),
            PauseState::Technician { .. } => Some(ProjectEventKind::Technician),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PauseState::Running => "running",
            PauseState::ManualPause => "manual_pause",
            PauseState::ManualLunch { .. } => "manual_lunch",
            PauseState::AutoLunch => "auto_lunch",
            PauseState::QcCrew => "qc_crew",
            PauseState::QcComponent => "qc_component",
            PauseState::Technician { .. } => "technician",
        }
    }
}

/// Which quality-control hold a toggle targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcKind {
    Crew,
    Component,
}

impl QcKind {
    pub fn pause_state(self) -> PauseState {
        match self {
            QcKind::Crew => PauseState::QcCrew,
            QcKind::Component => PauseState::QcComponent,
        }
    }
}

/// Who is asking for a guarded transition.
///
/// Remote commands bypass code checks by design: the external controller is
/// itself the trusted authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Code(String),
    Remote,
}

impl Credential {
    pub fn satisfies(&self, expected: &str) -> bool {
        match self {
            Credential::Remote => true,
            Credential::Code(code) => code == expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn only_running_is_not_paused() {
        assert!(!PauseState::Running.is_paused());
        assert!(PauseState::ManualPause.is_paused());
        assert!(PauseState::AutoLunch.is_paused());
        assert!(PauseState::Technician { line: None }.is_paused());
    }

    #[test]
    fn credential_gating_covers_qc_and_technician_only() {
        assert!(PauseState::QcCrew.is_credential_gated());
        assert!(PauseState::QcComponent.is_credential_gated());
        assert!(PauseState::Technician {
            line: Some("Line 2".to_string())
        }
        .is_credential_gated());
        assert!(!PauseState::ManualPause.is_credential_gated());
        assert!(!PauseState::AutoLunch.is_credential_gated());
        assert!(!PauseState::Running.is_credential_gated());
    }

    #[test]
    fn remote_credential_bypasses_code_check() {
        assert!(Credential::Remote.satisfies("340340"));
        assert!(Credential::Code("340340".to_string()).satisfies("340340"));
        assert!(!Credential::Code("111111".to_string()).satisfies("340340"));
    }

    #[test]
    fn manual_lunch_payload_round_trips() {
        let since = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let state = PauseState::ManualLunch { since };
        let json = serde_json::to_string(&state).unwrap();
        let back: PauseState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn legacy_lunch_state_deserializes_as_auto_lunch() {
        let back: PauseState = serde_json::from_str(r#"{"state":"lunch"}"#).unwrap();
        assert_eq!(back, PauseState::AutoLunch);
    }
}
