//! HistoryStore - local history of question-to-prompt transformations
//!
//! Every completed transformation is appended as one flat record to a single
//! JSON collection stored under a well-known key. Records are immutable once
//! written; the only other mutation is deletion.
//!
//! # Layout
//!
//! ```text
//! {history_dir}/
//! ├── question_plus_history.json   # JSON array of records
//! └── question_plus_history.lock   # advisory lock for read-modify-write
//! ```
//!
//! # Example
//!
//! ```ignore
//! use historystore::{HistoryStore, NewHistoryEntry};
//!
//! let store = HistoryStore::open(historystore::default_history_dir())?;
//! let entry = store.create(NewHistoryEntry {
//!     original_question: "How do I pitch an idea?".into(),
//!     optimized_prompt: "As a strategy consultant...".into(),
//!     ..Default::default()
//! })?;
//! assert_eq!(store.list()?[0].id, entry.id);
//! ```

pub mod cli;
pub mod config;
mod store;

use std::path::PathBuf;

pub use store::{EntryId, HistoryEntry, HistoryError, HistoryStore, NewHistoryEntry};

/// Storage key of the persisted collection (file stem on disk)
pub const STORAGE_KEY: &str = "question_plus_history";

/// Default directory holding the history collection: `<data_dir>/questionplus`
pub fn default_history_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("questionplus")
}
