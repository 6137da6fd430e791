//! Daemon runtime configuration, loaded from `kiosk.toml` in the data
//! directory. A missing file yields safe defaults; a malformed file is an
//! error the caller downgrades to defaults with a warning.

use std::path::PathBuf;

use chrono::NaiveTime;
use serde::Deserialize;

use crewclock_core::{ProcedureCodes, SessionConfig, TimeWindow};

/// One lunch window as written in the config file, e.g.
/// `{ start = "11:30", end = "12:00" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KioskConfig {
    /// Remote document identity. Empty disables fleet sync entirely.
    pub fleet_id: String,
    /// Steady-state pushes are throttled to this interval; discrete actions
    /// force an immediate push regardless.
    pub push_min_interval_secs: u64,
    pub pause_code: String,
    pub qc_code: String,
    pub technician_code: String,
    /// Absent means "use the built-in three-shift defaults"; an explicit
    /// empty list disables lunch detection entirely.
    pub lunch_windows: Option<Vec<ConfigWindow>>,
    pub shift_starts: Option<Vec<String>>,
}

impl Default for KioskConfig {
    fn default() -> Self {
        let codes = ProcedureCodes::default();
        Self {
            fleet_id: String::new(),
            push_min_interval_secs: 10,
            pause_code: codes.pause,
            qc_code: codes.qc,
            technician_code: codes.technician,
            lunch_windows: None,
            shift_starts: None,
        }
    }
}

impl KioskConfig {
    /// Builds the session-core config, keeping built-in defaults wherever
    /// the file omits a list. Unparseable entries are skipped with a
    /// warning rather than failing startup.
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        config.codes = ProcedureCodes {
            pause: self.pause_code.clone(),
            qc: self.qc_code.clone(),
            technician: self.technician_code.clone(),
        };

        if let Some(windows) = &self.lunch_windows {
            config.lunch_windows = windows
                .iter()
                .filter_map(|w| match (parse_time(&w.start), parse_time(&w.end)) {
                    (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
                    _ => {
                        tracing::warn!(start = %w.start, end = %w.end, "Skipping unparseable lunch window");
                        None
                    }
                })
                .collect();
        }

        if let Some(shifts) = &self.shift_starts {
            config.shift_starts = shifts
                .iter()
                .filter_map(|raw| {
                    let parsed = parse_time(raw);
                    if parsed.is_none() {
                        tracing::warn!(time = %raw, "Skipping unparseable shift start");
                    }
                    parsed
                })
                .collect();
        }

        config
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Loads the runtime config. Missing file → defaults; unreadable or
/// malformed file → error (the caller logs and falls back to defaults).
pub fn load_runtime_config(path: Option<PathBuf>) -> Result<KioskConfig, String> {
    let Some(path) = path else {
        return Ok(KioskConfig::default());
    };
    if !path.exists() {
        return Ok(KioskConfig::default());
    }

    let content = fs_err::read_to_string(&path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
    toml::from_str::<KioskConfig>(&content)
        .map_err(|err| format!("failed to parse {}: {}", path.display(), err))
}
