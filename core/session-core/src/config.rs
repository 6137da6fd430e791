//! Session-level configuration: lunch windows, shift start times, and the
//! procedure codes guarding credentialed transitions.
//!
//! Defaults match the production floor's three-shift layout. The daemon
//! overrides them from its runtime config file.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::windows::TimeWindow;

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

static DEFAULT_LUNCH_WINDOWS: Lazy<Vec<TimeWindow>> = Lazy::new(|| {
    vec![
        TimeWindow::new(hm(11, 30), hm(12, 0)),
        TimeWindow::new(hm(18, 30), hm(19, 0)),
        TimeWindow::new(hm(3, 0), hm(3, 30)),
    ]
});

static DEFAULT_SHIFT_STARTS: Lazy<Vec<NaiveTime>> =
    Lazy::new(|| vec![hm(6, 0), hm(14, 0), hm(22, 0)]);

/// Codes required for guarded pause transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureCodes {
    pub pause: String,
    pub qc: String,
    pub technician: String,
}

impl Default for ProcedureCodes {
    fn default() -> Self {
        Self {
            pause: "340340".to_string(),
            qc: "440440".to_string(),
            technician: "550550".to_string(),
        }
    }
}

/// Everything the session state machine needs from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub lunch_windows: Vec<TimeWindow>,
    pub shift_starts: Vec<NaiveTime>,
    pub codes: ProcedureCodes,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lunch_windows: DEFAULT_LUNCH_WINDOWS.clone(),
            shift_starts: DEFAULT_SHIFT_STARTS.clone(),
            codes: ProcedureCodes::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_three_shifts() {
        let config = SessionConfig::default();
        assert_eq!(config.lunch_windows.len(), 3);
        assert_eq!(config.shift_starts.len(), 3);
        assert_eq!(config.codes.pause, "340340");
    }
}
