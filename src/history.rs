//! Durable summary history.
//!
//! Keeps past results in a single JSON snapshot, most-recent-first,
//! rewritten through a temp file + rename on every append so readers
//! never observe a partial write. The history is best-effort: an
//! unreadable snapshot loads as empty and write failures are logged,
//! never propagated.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::summary::SummaryResult;

/// One stored result, stamped when it was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub saved_at: String,
    pub summary: SummaryResult,
}

pub struct HistoryStore {
    path: PathBuf,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryStore {
    /// Open the store, loading whatever snapshot exists. Corrupt or
    /// missing data degrades to an empty log.
    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<HistoryEntry>>(&contents) {
                Ok(entries) => {
                    debug!("Loaded {} history entries from {}", entries.len(), path.display());
                    entries
                }
                Err(e) => {
                    warn!(
                        "History snapshot at {} is unreadable: {e} — starting empty",
                        path.display()
                    );
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Prepend a result and rewrite the snapshot. The lock is held across
    /// the write so rapid appends cannot lose each other's entries.
    pub async fn append(&self, summary: SummaryResult) {
        let entry = HistoryEntry {
            saved_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            summary,
        };

        let mut entries = self.entries.lock().await;
        entries.insert(0, entry);
        if let Err(e) = persist(&self.path, &entries) {
            warn!("Failed to persist history snapshot: {e}");
        }
    }

    /// All entries, most-recent-first.
    pub async fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

fn persist(path: &Path, entries: &[HistoryEntry]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str) -> SummaryResult {
        SummaryResult {
            title: title.to_string(),
            text: format!("summary of {title}"),
            sentiment: "Neutral".into(),
            key_mentions: Vec::new(),
            link: "#".into(),
        }
    }

    #[tokio::test]
    async fn append_prepends_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::open(dir.path().join("history.json"));

        store.append(result("first")).await;
        store.append(result("second")).await;

        let entries = store.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].summary.title, "second");
        assert_eq!(entries[1].summary.title, "first");
    }

    #[tokio::test]
    async fn snapshot_survives_a_fresh_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.json");

        {
            let store = HistoryStore::open(path.clone());
            store.append(result("old")).await;
            store.append(result("new")).await;
        }

        let reopened = HistoryStore::open(path);
        let entries = reopened.entries().await;
        assert_eq!(entries[0].summary.title, "new");
        assert_eq!(entries[1].summary.title, "old");
    }

    #[tokio::test]
    async fn duplicate_titles_coexist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::open(dir.path().join("history.json"));

        store.append(result("same")).await;
        store.append(result("same")).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn corrupt_snapshot_loads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").expect("write corrupt snapshot");

        let store = HistoryStore::open(path.clone());
        assert!(store.is_empty().await);

        // The store stays usable after the reset.
        store.append(result("fresh")).await;
        let reopened = HistoryStore::open(path);
        assert_eq!(reopened.len().await, 1);
    }

    #[tokio::test]
    async fn missing_snapshot_is_a_fresh_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::open(dir.path().join("nested").join("history.json"));
        assert!(store.is_empty().await);

        store.append(result("creates parent dirs")).await;
        assert_eq!(store.len().await, 1);
    }
}
