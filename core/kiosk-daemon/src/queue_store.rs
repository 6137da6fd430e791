//! JSON-file-backed queue of saved, not-yet-started jobs.
//!
//! Same defensive posture as the snapshot store: a missing, empty, corrupt,
//! or version-mismatched file loads as an empty queue with a warning, and
//! writes go through a temp file + rename.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crewclock_core::QueueItem;

const QUEUE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct QueueFile {
    version: u32,
    items: Vec<QueueItem>,
}

pub struct QueueStore {
    path: PathBuf,
    items: Vec<QueueItem>,
    next_seq: u64,
}

impl QueueStore {
    pub fn new(path: &Path) -> Self {
        let items = load_items(path);
        Self {
            path: path.to_path_buf(),
            items,
            next_seq: 0,
        }
    }

    /// Assigns an id, stores the item, and persists. Returns the new id.
    pub fn insert(&mut self, mut item: QueueItem) -> Result<String, String> {
        let id = format!("q-{}-{}", Utc::now().timestamp_millis(), self.next_seq);
        self.next_seq += 1;
        item.id = Some(id.clone());
        self.items.push(item);
        self.save()?;
        Ok(id)
    }

    /// Removes an item by id. Returns whether anything was deleted.
    pub fn delete(&mut self, id: &str) -> Result<bool, String> {
        let before = self.items.len();
        self.items.retain(|item| item.id.as_deref() != Some(id));
        if self.items.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id.as_deref() == Some(id))
    }

    pub fn list(&self) -> &[QueueItem] {
        &self.items
    }

    fn save(&self) -> Result<(), String> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| "queue path has no parent".to_string())?;
        fs_err::create_dir_all(parent)
            .map_err(|err| format!("failed to create queue directory: {}", err))?;

        let file = QueueFile {
            version: QUEUE_VERSION,
            items: self.items.clone(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|err| format!("failed to serialize queue: {}", err))?;
        let temp = self.path.with_extension("json.tmp");
        fs_err::write(&temp, content).map_err(|err| format!("failed to write queue: {}", err))?;
        fs_err::rename(&temp, &self.path)
            .map_err(|err| format!("failed to replace queue: {}", err))
    }
}

fn load_items(path: &Path) -> Vec<QueueItem> {
    if !path.exists() {
        return Vec::new();
    }
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read queue file; starting empty");
            return Vec::new();
        }
    };
    if content.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<QueueFile>(&content) {
        Ok(file) if file.version == QUEUE_VERSION => file.items,
        Ok(file) => {
            tracing::warn!(
                version = file.version,
                "Unsupported queue file version; starting empty"
            );
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to parse queue file; starting empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(project: &str) -> QueueItem {
        QueueItem {
            id: None,
            company: "Acme".to_string(),
            project: project.to_string(),
            category: "Kitting".to_string(),
            size: "8oz".to_string(),
            seconds: 600,
            original_seconds: Some(900),
            line_leader_name: None,
            created_at: None,
            scan_history: Vec::new(),
            project_events: Vec::new(),
            bonus: None,
        }
    }

    #[test]
    fn insert_assigns_unique_ids_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let mut store = QueueStore::new(&path);
        let first = store.insert(item("one")).unwrap();
        let second = store.insert(item("two")).unwrap();
        assert_ne!(first, second);

        // A fresh store sees the persisted items.
        let reloaded = QueueStore::new(&path);
        assert_eq!(reloaded.list().len(), 2);
        assert!(reloaded.get(&first).is_some());
    }

    #[test]
    fn delete_removes_exactly_one_item() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let mut store = QueueStore::new(&path);
        let id = store.insert(item("one")).unwrap();
        store.insert(item("two")).unwrap();

        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn corrupt_queue_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        std::fs::write(&path, "{broken").unwrap();
        assert!(QueueStore::new(&path).list().is_empty());
    }
}
