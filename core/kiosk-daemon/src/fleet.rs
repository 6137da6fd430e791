//! The fleet-document adapter: pull/push access to the shared remote
//! document for this kiosk identity.
//!
//! The transport is behind a trait so tests inject fakes and production can
//! swap in a real document store; the bundled implementation keeps the
//! document in a JSON file, which is also how two local processes (daemon +
//! controller) share state during development. Pushes preserve the
//! controller-owned command fields, mirroring a merge-style write.

use std::path::{Path, PathBuf};

use crewclock_fleet_protocol::FleetDocument;

pub trait FleetStore: Send {
    fn pull(&self) -> Result<Option<FleetDocument>, String>;
    /// Writes the kiosk-owned state fields. `remote_command` and
    /// `command_timestamp` on the stored document are left alone unless the
    /// outbound document sets them.
    fn push(&self, doc: &FleetDocument) -> Result<(), String>;
    /// Blanks `remote_command` after a command has been applied, so
    /// controllers can see it was consumed.
    fn clear_command(&self) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub struct FileFleetStore {
    path: PathBuf,
}

impl FileFleetStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn read(&self) -> Result<Option<FleetDocument>, String> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs_err::read_to_string(&self.path)
            .map_err(|err| format!("failed to read fleet document: {}", err))?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|err| format!("failed to parse fleet document: {}", err))
    }

    fn write(&self, doc: &FleetDocument) -> Result<(), String> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| "fleet document path has no parent".to_string())?;
        fs_err::create_dir_all(parent)
            .map_err(|err| format!("failed to create fleet directory: {}", err))?;

        let content = serde_json::to_string_pretty(doc)
            .map_err(|err| format!("failed to serialize fleet document: {}", err))?;
        let temp = self.path.with_extension("json.tmp");
        fs_err::write(&temp, content)
            .map_err(|err| format!("failed to write fleet document: {}", err))?;
        fs_err::rename(&temp, &self.path)
            .map_err(|err| format!("failed to replace fleet document: {}", err))
    }
}

impl FleetStore for FileFleetStore {
    fn pull(&self) -> Result<Option<FleetDocument>, String> {
        self.read()
    }

    fn push(&self, doc: &FleetDocument) -> Result<(), String> {
        let mut merged = doc.clone();
        if let Some(existing) = self.read()? {
            if merged.remote_command.is_none() {
                merged.remote_command = existing.remote_command;
            }
            if merged.command_timestamp.is_none() {
                merged.command_timestamp = existing.command_timestamp;
            }
        }
        self.write(&merged)
    }

    fn clear_command(&self) -> Result<(), String> {
        let Some(mut doc) = self.read()? else {
            return Ok(());
        };
        doc.remote_command = Some(String::new());
        self.write(&doc)
    }
}

/// Polls the store and surfaces only changed snapshots, so the runtime is
/// not re-fed an identical document every second.
pub struct FleetPoller<S: FleetStore> {
    store: S,
    previous: Option<FleetDocument>,
}

impl<S: FleetStore> FleetPoller<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            previous: None,
        }
    }

    pub fn poll_once(&mut self) -> Result<Option<FleetDocument>, String> {
        let Some(doc) = self.store.pull()? else {
            return Ok(None);
        };
        if self.previous.as_ref() == Some(&doc) {
            return Ok(None);
        }
        self.previous = Some(doc.clone());
        Ok(Some(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> FileFleetStore {
        FileFleetStore::new(&dir.join("fleet").join("kiosk-1.json"))
    }

    #[test]
    fn pull_on_missing_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(dir.path()).pull().unwrap(), None);
    }

    #[test]
    fn push_preserves_controller_command_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let controller_doc = FleetDocument {
            remote_command: Some("TOGGLE".to_string()),
            command_timestamp: Some("2026-08-01T12:00:00Z".to_string()),
            ..FleetDocument::default()
        };
        store.write(&controller_doc).unwrap();

        let kiosk_doc = FleetDocument {
            seconds_remaining: Some(90),
            timer_text: Some("00:01:30".to_string()),
            ..FleetDocument::default()
        };
        store.push(&kiosk_doc).unwrap();

        let merged = store.pull().unwrap().unwrap();
        assert_eq!(merged.seconds_remaining, Some(90));
        assert_eq!(merged.remote_command.as_deref(), Some("TOGGLE"));
        assert_eq!(
            merged.command_timestamp.as_deref(),
            Some("2026-08-01T12:00:00Z")
        );
    }

    #[test]
    fn clear_command_blanks_only_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .write(&FleetDocument {
                seconds_remaining: Some(90),
                remote_command: Some("FINISH".to_string()),
                command_timestamp: Some("2026-08-01T12:00:00Z".to_string()),
                ..FleetDocument::default()
            })
            .unwrap();

        store.clear_command().unwrap();
        let doc = store.pull().unwrap().unwrap();
        assert_eq!(doc.remote_command.as_deref(), Some(""));
        assert_eq!(doc.seconds_remaining, Some(90));
        assert!(doc.command_timestamp.is_some());
    }

    #[test]
    fn poller_reports_each_document_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut poller = FleetPoller::new(store_in(dir.path()));

        assert_eq!(poller.poll_once().unwrap(), None);

        store
            .write(&FleetDocument {
                seconds_remaining: Some(10),
                ..FleetDocument::default()
            })
            .unwrap();
        assert!(poller.poll_once().unwrap().is_some());
        assert_eq!(poller.poll_once().unwrap(), None);

        store
            .write(&FleetDocument {
                seconds_remaining: Some(9),
                ..FleetDocument::default()
            })
            .unwrap();
        assert!(poller.poll_once().unwrap().is_some());
    }
}
