//! Clipboard history: entry model, repository and read-side services

pub mod database;
pub mod input;
pub mod query;
pub mod stats;
pub mod tags;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use validator::Validate;

pub use database::HistoryDatabase;
pub use input::{BulkDeleteInput, CreateEntryInput, PopularTagsInput, SearchInput, UpdateEntryInput};
pub use query::{EntryQuery, Filter, Page, Predicate, SortOrder};
pub use stats::ClipboardStats;
pub use tags::TagCount;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Malformed input rejected before reaching the store
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Update or usage tracking referenced a missing entry
    #[error("Clipboard entry with id {id} not found")]
    NotFound { id: i64 },

    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Tag list (de)serialization failure
    #[error("Tag list encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error preparing the database location
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<validator::ValidationErrors> for HistoryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        HistoryError::Validation(input::describe(&errors))
    }
}

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

/// A stored clipboard entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    /// Store-assigned identifier
    pub id: i64,
    /// Snippet text
    pub content: String,
    /// Optional user-facing title
    pub title: Option<String>,
    pub is_pinned: bool,
    pub is_favorite: bool,
    /// Tags in insertion order, duplicates preserved
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Refreshed by every successful mutation
    pub updated_at: DateTime<Utc>,
    /// Number of usage-tracking calls
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Entry repository and entry point for every history operation
pub struct ClipboardHistory {
    db: HistoryDatabase,
}

impl ClipboardHistory {
    /// Open (or create) the history database at `path`
    pub async fn open(path: &Path, busy_timeout: Duration) -> HistoryResult<Self> {
        let db = HistoryDatabase::new(path, busy_timeout).await?;
        info!("Clipboard history opened at {}", path.display());
        Ok(Self { db })
    }

    /// Open a history backed by a private in-memory database
    pub async fn open_in_memory() -> HistoryResult<Self> {
        let db = HistoryDatabase::open_in_memory().await?;
        Ok(Self { db })
    }

    /// Create a new entry with zeroed usage and unset flags
    pub async fn create(&self, input: CreateEntryInput) -> HistoryResult<ClipboardEntry> {
        input.validate()?;
        let entry = logged("create entry", self.db.insert(&input).await)?;
        debug!("Created clipboard entry {}", entry.id);
        Ok(entry)
    }

    /// Apply the fields present in `input` to an existing entry
    pub async fn update(&self, input: UpdateEntryInput) -> HistoryResult<ClipboardEntry> {
        input.validate()?;
        let id = input.id;
        logged("update entry", self.db.update(&input).await)?.ok_or_else(|| {
            debug!("Update rejected, entry {} does not exist", id);
            HistoryError::NotFound { id }
        })
    }

    /// Delete one entry; deleting a missing id is a no-op
    pub async fn delete(&self, id: i64) -> HistoryResult<()> {
        let removed = logged("delete entry", self.db.delete(id).await)?;
        debug!("Delete of entry {} removed {} row(s)", id, removed);
        Ok(())
    }

    /// Delete every listed entry, returning how many rows were removed
    pub async fn bulk_delete(&self, input: BulkDeleteInput) -> HistoryResult<usize> {
        input.validate()?;
        let removed = logged("bulk delete entries", self.db.delete_many(&input.ids).await)?;
        info!("Bulk delete removed {} of {} requested entries", removed, input.ids.len());
        Ok(removed)
    }

    /// Remove every entry, returning how many rows were removed
    pub async fn clear_all(&self) -> HistoryResult<usize> {
        let removed = logged("clear history", self.db.delete_all().await)?;
        info!("Cleared {} clipboard entries", removed);
        Ok(removed)
    }

    /// Record one use of an entry: bump the counter and stamp the times
    pub async fn touch_usage(&self, id: i64) -> HistoryResult<ClipboardEntry> {
        logged("track usage", self.db.touch(id).await)?.ok_or(HistoryError::NotFound { id })
    }

    /// Every entry in pinned-first order, without pagination
    pub async fn get_all(&self) -> HistoryResult<Vec<ClipboardEntry>> {
        logged("list entries", self.db.select(&EntryQuery::all()).await)
    }

    /// Filtered, paginated listing. `None` takes the unpaginated get-all path.
    pub async fn search(&self, search: Option<SearchInput>) -> HistoryResult<Vec<ClipboardEntry>> {
        if let Some(search) = &search {
            search.validate()?;
        }
        let query = EntryQuery::from_search(search.as_ref());
        logged("search entries", self.db.select(&query).await)
    }

    /// Distinct tags across all entries, ascending
    pub async fn all_tags(&self) -> HistoryResult<Vec<String>> {
        logged("list tags", self.db.all_tags().await)
    }

    /// Most frequent tags, highest count first
    pub async fn popular_tags(&self, input: PopularTagsInput) -> HistoryResult<Vec<TagCount>> {
        input.validate()?;
        logged("list popular tags", self.db.popular_tags(input.limit()).await)
    }

    /// Summary counts plus most-used and most-recent entries
    pub async fn stats(&self) -> HistoryResult<ClipboardStats> {
        logged("collect statistics", self.db.stats().await)
    }
}

/// Log store-level failures with the failing operation; caller-side
/// errors pass through quietly.
fn logged<T>(operation: &str, result: HistoryResult<T>) -> HistoryResult<T> {
    if let Err(e) = &result {
        match e {
            HistoryError::Validation(_) | HistoryError::NotFound { .. } => {
                debug!("{} rejected: {}", operation, e)
            }
            _ => error!("Failed to {}: {}", operation, e),
        }
    }
    result
}
