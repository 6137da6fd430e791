//! File-backed session snapshot persistence.
//!
//! The daemon is the only writer. The on-disk format is a versioned JSON
//! envelope so incompatible layouts are detected instead of misread.
//!
//! # Defensive Design
//!
//! Loading handles the states a kiosk power cycle can leave behind:
//! - Missing file (fresh install) → `None`
//! - Empty file (interrupted first write) → `None`, warn
//! - Corrupt JSON → `None`, warn
//! - Version mismatch → `None`, warn
//!
//! # Atomic Writes
//!
//! Saves go through a temp file + rename in the target directory so a crash
//! mid-write never leaves a truncated snapshot.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::bonus::BonusState;
use crate::error::{CoreError, Result};
use crate::events::EventLog;
use crate::ledger::WorkerLedger;
use crate::pause::PauseState;
use crate::session::ProjectInfo;

/// Current on-disk format. v1 predates the bonus latch and variant-payload
/// pause states.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Everything needed to rebuild a [`crate::session::Session`] after a
/// restart. Optional fields default so a snapshot written by a newer build
/// with absent fields still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub countdown_seconds: i64,
    #[serde(default)]
    pub original_seconds: i64,
    #[serde(default)]
    pub counting: bool,
    #[serde(default)]
    pub finished: bool,
    #[serde(default = "default_pause")]
    pub pause: PauseState,
    #[serde(default)]
    pub lunch_used: bool,
    #[serde(default)]
    pub buzzer_fired: bool,
    #[serde(default)]
    pub bonus: BonusState,
    #[serde(default)]
    pub info: ProjectInfo,
    #[serde(default)]
    pub ledger: WorkerLedger,
    #[serde(default)]
    pub log: EventLog,
    #[serde(default)]
    pub scan_count: u64,
}

fn default_pause() -> PauseState {
    PauseState::Running
}

/// The on-disk JSON structure for the snapshot file.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    session: SessionSnapshot,
}

/// Loads and saves session snapshots at a fixed path.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the last persisted snapshot, or `None` when there is nothing
    /// trustworthy on disk.
    pub fn load(&self) -> Option<SessionSnapshot> {
        if !self.path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Warning: Failed to read snapshot file ({}), ignoring", e);
                return None;
            }
        };

        if content.trim().is_empty() {
            eprintln!("Warning: Empty snapshot file, ignoring");
            return None;
        }

        match serde_json::from_str::<SnapshotFile>(&content) {
            Ok(file) if file.version == SNAPSHOT_VERSION => Some(file.session),
            Ok(file) => {
                eprintln!(
                    "Warning: Unsupported snapshot version {} (expected {}), ignoring",
                    file.version, SNAPSHOT_VERSION
                );
                None
            }
            Err(e) => {
                eprintln!("Warning: Failed to parse snapshot file ({}), ignoring", e);
                None
            }
        }
    }

    /// Writes the snapshot atomically (temp file + rename).
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            session: snapshot.clone(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|source| CoreError::Json {
            context: "serializing session snapshot".to_string(),
            source,
        })?;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| CoreError::SnapshotPathInvalid(self.path.clone()))?;
        std::fs::create_dir_all(parent).map_err(|source| CoreError::Io {
            context: format!("creating snapshot directory {}", parent.display()),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(parent).map_err(|source| CoreError::Io {
            context: "creating temp snapshot file".to_string(),
            source,
        })?;
        temp.write_all(content.as_bytes())
            .map_err(|source| CoreError::Io {
                context: "writing temp snapshot file".to_string(),
                source,
            })?;
        temp.flush().map_err(|source| CoreError::Io {
            context: "flushing temp snapshot file".to_string(),
            source,
        })?;
        temp.persist(&self.path).map_err(|e| CoreError::Io {
            context: format!("renaming snapshot into {}", self.path.display()),
            source: e.error,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::pause::Credential;
    use crate::session::Session;
    use chrono::{TimeZone, Utc};

    fn store_in(dir: &Path) -> SnapshotStore {
        SnapshotStore::new(&dir.join("session.json"))
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(dir.path()).load().is_none());
    }

    #[test]
    fn corrupt_and_empty_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        std::fs::write(store.path(), "").unwrap();
        assert!(store.load().is_none());

        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn version_mismatch_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut snapshot = Session::new(SessionConfig::default()).snapshot();
        snapshot.countdown_seconds = 42;
        store.save(&snapshot).unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let rewritten = content.replace(
            &format!("\"version\": {}", SNAPSHOT_VERSION),
            "\"version\": 1",
        );
        std::fs::write(store.path(), rewritten).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn live_session_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let mut session = Session::new(SessionConfig::default());
        session.start(3600, now);
        session.scan("a", now);
        session.scan("b", now);
        session.toggle_technician(
            &Credential::Remote,
            Some("Line 2".to_string()),
            now + chrono::Duration::seconds(5),
        );
        session.cancel_bonus();

        let snapshot = session.snapshot();
        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, snapshot);

        let restored = Session::from_snapshot(loaded, SessionConfig::default());
        assert_eq!(restored.countdown_seconds(), 3600);
        assert_eq!(restored.headcount(), 2);
        assert_eq!(restored.pause_state(), session.pause_state());
        assert!(!restored.bonus().is_eligible());
        assert_eq!(restored.scan_count(), 2);
    }

    #[test]
    fn snapshot_with_absent_optional_fields_loads_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let minimal = format!(
            r#"{{"version": {}, "session": {{"countdown_seconds": 7}}}}"#,
            SNAPSHOT_VERSION
        );
        std::fs::write(store.path(), minimal).unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.countdown_seconds, 7);
        assert_eq!(snapshot.pause, PauseState::Running);
        assert!(snapshot.bonus.is_eligible());
        assert!(snapshot.log.is_empty());
    }
}
