//! Core HistoryStore implementation

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::STORAGE_KEY;

/// Unique identifier for a history record
pub type EntryId = String;

/// Errors from history operations
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HistoryError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One completed transformation
///
/// Field names are the persisted wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub original_question: String,
    pub optimized_prompt: String,
    /// Option key -> selected value in its wire form (`other:<text>` etc.)
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub method: String,
    pub created_date: DateTime<Utc>,
}

/// A record before the store assigns its id and timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub original_question: String,
    pub optimized_prompt: String,
    pub options: BTreeMap<String, String>,
    pub persona: String,
    pub method: String,
}

impl NewHistoryEntry {
    fn into_entry(self, id: EntryId, created_date: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            id,
            original_question: self.original_question,
            optimized_prompt: self.optimized_prompt,
            options: self.options,
            persona: self.persona,
            method: self.method,
            created_date,
        }
    }
}

/// File-backed history collection
pub struct HistoryStore {
    /// Directory holding the collection and its lock file
    base_path: PathBuf,
}

impl HistoryStore {
    /// Open or create a history store in the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| HistoryError::io(&base_path, e))?;
        debug!(?base_path, "Opened history store");
        Ok(Self { base_path })
    }

    /// Path of the persisted collection
    pub fn file_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.json", STORAGE_KEY))
    }

    fn lock_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.lock", STORAGE_KEY))
    }

    /// All records, newest first
    pub fn list(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        debug!("list: called");
        let mut entries = self.read_all()?;
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    /// Look up one record by id
    pub fn get(&self, id: &str) -> Result<Option<HistoryEntry>, HistoryError> {
        debug!(%id, "get: called");
        Ok(self.read_all()?.into_iter().find(|e| e.id == id))
    }

    /// Case-insensitive substring search over question and prompt text
    ///
    /// Results keep the `list` ordering. An empty query matches everything.
    pub fn search(&self, query: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        debug!(%query, "search: called");
        let needle = query.to_lowercase();
        let mut entries = self.list()?;
        entries.retain(|e| {
            e.original_question.to_lowercase().contains(&needle) || e.optimized_prompt.to_lowercase().contains(&needle)
        });
        Ok(entries)
    }

    /// Append a record stamped with the current time
    pub fn create(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, HistoryError> {
        self.create_at(entry, Utc::now())
    }

    /// Append a record with an explicit creation timestamp
    pub fn create_at(&self, entry: NewHistoryEntry, created_date: DateTime<Utc>) -> Result<HistoryEntry, HistoryError> {
        let entry = entry.into_entry(Uuid::now_v7().to_string(), created_date);
        debug!(id = %entry.id, "create_at: called");

        self.with_lock(|store| {
            let mut entries = store.read_all()?;
            entries.push(entry.clone());
            store.write_all(&entries)
        })?;

        info!(id = %entry.id, "Created history entry");
        Ok(entry)
    }

    /// Delete a record by id
    ///
    /// Returns `false` and leaves the collection untouched when no record has that id.
    pub fn delete(&self, id: &str) -> Result<bool, HistoryError> {
        debug!(%id, "delete: called");
        let removed = self.with_lock(|store| {
            let mut entries = store.read_all()?;
            let before = entries.len();
            entries.retain(|e| e.id != id);
            if entries.len() == before {
                return Ok(false);
            }
            store.write_all(&entries)?;
            Ok(true)
        })?;

        if removed {
            info!(%id, "Deleted history entry");
        } else {
            debug!(%id, "delete: no such entry");
        }
        Ok(removed)
    }

    fn read_all(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).map_err(|e| HistoryError::io(&path, e))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|source| HistoryError::Corrupt { path, source })
    }

    /// Replace the collection atomically (write to a sibling, then rename)
    fn write_all(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        let path = self.file_path();
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(entries)?;

        fs::write(&tmp, content).map_err(|e| HistoryError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| HistoryError::io(&path, e))?;
        Ok(())
    }

    fn with_lock<T>(&self, f: impl FnOnce(&Self) -> Result<T, HistoryError>) -> Result<T, HistoryError> {
        let lock_path = self.lock_path();
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| HistoryError::io(&lock_path, e))?;
        lock.lock_exclusive().map_err(|e| HistoryError::io(&lock_path, e))?;

        let result = f(self);

        if let Err(e) = FileExt::unlock(&lock) {
            debug!(error = %e, "with_lock: unlock failed");
        }
        result
    }
}

fn sort_newest_first(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| b.created_date.cmp(&a.created_date).then_with(|| b.id.cmp(&a.id)));
}
