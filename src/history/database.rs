//! SQLite record store for clipboard history

use crate::history::input::{CreateEntryInput, UpdateEntryInput};
use crate::history::query::{self, EntryQuery};
use crate::history::{stats, tags, ClipboardEntry, ClipboardStats, HistoryResult, TagCount};
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

const SCHEMA_VERSION: u32 = 1;

/// SQL name of the Unicode-aware lowercase function registered on every connection
pub(crate) const UNICODE_LOWER: &str = "unicode_lower";

/// Column list shared by every statement that yields entries
pub(crate) const ENTRY_COLUMNS: &str = "id, content, title, is_pinned, is_favorite, tags, \
     created_at, updated_at, usage_count, last_used_at";

/// SQLite database wrapper for clipboard entries
pub struct HistoryDatabase {
    conn: Mutex<Connection>,
}

impl HistoryDatabase {
    /// Open or create the database file at `path`
    pub async fn new(path: &Path, busy_timeout: Duration) -> HistoryResult<Self> {
        // Create directory if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        Self::from_connection(conn).await
    }

    /// Private in-memory database
    pub async fn open_in_memory() -> HistoryResult<Self> {
        Self::from_connection(Connection::open_in_memory()?).await
    }

    async fn from_connection(conn: Connection) -> HistoryResult<Self> {
        register_functions(&conn)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> HistoryResult<()> {
        let conn = self.conn.lock().await;

        let version = Self::get_schema_version(&conn)?;
        if version == 0 {
            Self::create_schema(&conn)?;
        }

        Ok(())
    }

    fn get_schema_version(conn: &Connection) -> HistoryResult<u32> {
        let table_exists: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'
            )",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: Option<u32> = conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(version.unwrap_or(0))
    }

    fn create_schema(conn: &Connection) -> HistoryResult<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER DEFAULT (strftime('%s', 'now'))
            );

            CREATE TABLE IF NOT EXISTS clipboard_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                title TEXT,
                is_pinned INTEGER NOT NULL DEFAULT 0,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                last_used_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_entries_listing
                ON clipboard_entries(is_pinned DESC, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_entries_usage
                ON clipboard_entries(usage_count DESC);
            ",
        )?;

        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Insert a new entry; id and timestamps are assigned here
    pub async fn insert(&self, input: &CreateEntryInput) -> HistoryResult<ClipboardEntry> {
        let tags = serde_json::to_string(&input.tags)?;
        let title = input.title.as_deref().filter(|t| !t.is_empty());
        let now = now_micros();

        let conn = self.conn.lock().await;
        let entry = conn.query_row(
            &format!(
                "INSERT INTO clipboard_entries
                 (content, title, is_pinned, is_favorite, tags,
                  created_at, updated_at, usage_count, last_used_at)
                 VALUES (?, ?, 0, 0, ?, ?, ?, 0, NULL)
                 RETURNING {}",
                ENTRY_COLUMNS
            ),
            params![input.content, title, tags, now, now],
            entry_from_row,
        )?;

        Ok(entry)
    }

    /// Apply the supplied fields; `None` when the id does not exist
    pub async fn update(&self, input: &UpdateEntryInput) -> HistoryResult<Option<ClipboardEntry>> {
        let mut assignments = vec!["updated_at = MAX(?, updated_at + 1)"];
        let mut values = vec![Value::Integer(now_micros())];

        if let Some(content) = &input.content {
            assignments.push("content = ?");
            values.push(Value::Text(content.clone()));
        }
        if let Some(title) = &input.title {
            assignments.push("title = ?");
            values.push(title.clone().map_or(Value::Null, Value::Text));
        }
        if let Some(pinned) = input.is_pinned {
            assignments.push("is_pinned = ?");
            values.push(Value::Integer(pinned as i64));
        }
        if let Some(favorite) = input.is_favorite {
            assignments.push("is_favorite = ?");
            values.push(Value::Integer(favorite as i64));
        }
        if let Some(tags) = &input.tags {
            assignments.push("tags = ?");
            values.push(Value::Text(serde_json::to_string(tags)?));
        }
        values.push(Value::Integer(input.id));

        let sql = format!(
            "UPDATE clipboard_entries SET {} WHERE id = ? RETURNING {}",
            assignments.join(", "),
            ENTRY_COLUMNS
        );

        let conn = self.conn.lock().await;
        let entry = conn
            .query_row(&sql, params_from_iter(values.iter()), entry_from_row)
            .optional()?;

        Ok(entry)
    }

    /// Atomically bump usage and stamp the entry
    pub async fn touch(&self, id: i64) -> HistoryResult<Option<ClipboardEntry>> {
        let now = now_micros();

        let conn = self.conn.lock().await;
        let entry = conn
            .query_row(
                &format!(
                    "UPDATE clipboard_entries
                     SET usage_count = usage_count + 1,
                         last_used_at = ?1,
                         updated_at = MAX(?1, updated_at + 1)
                     WHERE id = ?2
                     RETURNING {}",
                    ENTRY_COLUMNS
                ),
                params![now, id],
                entry_from_row,
            )
            .optional()?;

        Ok(entry)
    }

    /// Delete one entry, returning rows affected
    pub async fn delete(&self, id: i64) -> HistoryResult<usize> {
        let conn = self.conn.lock().await;
        Ok(conn.execute("DELETE FROM clipboard_entries WHERE id = ?", params![id])?)
    }

    /// Delete every entry whose id is listed, returning rows affected
    pub async fn delete_many(&self, ids: &[i64]) -> HistoryResult<usize> {
        let ids = serde_json::to_string(ids)?;

        let conn = self.conn.lock().await;
        Ok(conn.execute(
            "DELETE FROM clipboard_entries WHERE id IN (SELECT value FROM json_each(?))",
            params![ids],
        )?)
    }

    /// Clear all entries from history
    pub async fn delete_all(&self) -> HistoryResult<usize> {
        let conn = self.conn.lock().await;
        Ok(conn.execute("DELETE FROM clipboard_entries", [])?)
    }

    /// Filtered, ordered and optionally paginated read
    pub async fn select(&self, query: &EntryQuery) -> HistoryResult<Vec<ClipboardEntry>> {
        let conn = self.conn.lock().await;
        query::select_entries(&conn, query)
    }

    pub async fn all_tags(&self) -> HistoryResult<Vec<String>> {
        let conn = self.conn.lock().await;
        tags::all_tags(&conn)
    }

    pub async fn popular_tags(&self, limit: u32) -> HistoryResult<Vec<TagCount>> {
        let conn = self.conn.lock().await;
        tags::popular_tags(&conn, limit)
    }

    pub async fn stats(&self) -> HistoryResult<ClipboardStats> {
        let conn = self.conn.lock().await;
        stats::collect(&conn)
    }
}

/// SQLite's built-in `lower()` only folds ASCII
fn register_functions(conn: &Connection) -> HistoryResult<()> {
    conn.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

/// Map a row selected with [`ENTRY_COLUMNS`]
pub(crate) fn entry_from_row(row: &Row) -> rusqlite::Result<ClipboardEntry> {
    let tags_json: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let usage_count: i64 = row.get(8)?;
    let last_used_at: Option<i64> = row.get(9)?;

    Ok(ClipboardEntry {
        id: row.get(0)?,
        content: row.get(1)?,
        title: row.get(2)?,
        is_pinned: row.get(3)?,
        is_favorite: row.get(4)?,
        tags,
        created_at: timestamp_at(row, 6)?,
        updated_at: timestamp_at(row, 7)?,
        usage_count: usage_count.max(0) as u64,
        last_used_at: last_used_at.map(|v| from_micros(9, v)).transpose()?,
    })
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    from_micros(idx, row.get(idx)?)
}

fn from_micros(idx: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_db() -> (HistoryDatabase, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");
        let db = HistoryDatabase::new(&db_path, Duration::from_secs(5))
            .await
            .unwrap();
        (db, temp_dir)
    }

    fn input(content: &str, tags: &[&str]) -> CreateEntryInput {
        CreateEntryInput {
            content: content.to_string(),
            title: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_retrieve() {
        let (db, _temp_dir) = setup_test_db().await;

        let created = db.insert(&input("Test content", &["a", "a", "b"])).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.tags, vec!["a", "a", "b"]);

        let entries = db.select(&EntryQuery::all()).await.unwrap();
        assert_eq!(entries, vec![created]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("history.db");

        let id = {
            let db = HistoryDatabase::new(&db_path, Duration::from_secs(1)).await.unwrap();
            db.insert(&input("persisted", &[])).await.unwrap().id
        };

        let db = HistoryDatabase::new(&db_path, Duration::from_secs(1)).await.unwrap();
        let entries = db.select(&EntryQuery::all()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
    }

    #[tokio::test]
    async fn test_empty_title_stored_as_none() {
        let db = HistoryDatabase::open_in_memory().await.unwrap();

        let mut new = input("x", &[]);
        new.title = Some(String::new());
        let entry = db.insert(&new).await.unwrap();
        assert!(entry.title.is_none());
    }

    #[tokio::test]
    async fn test_update_only_touches_supplied_fields() {
        let db = HistoryDatabase::open_in_memory().await.unwrap();
        let mut new = input("original", &["t"]);
        new.title = Some("Title".to_string());
        let created = db.insert(&new).await.unwrap();

        let updated = db
            .update(&UpdateEntryInput {
                id: created.id,
                is_favorite: Some(true),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        assert!(updated.is_favorite);
        assert_eq!(updated.content, "original");
        assert_eq!(updated.title.as_deref(), Some("Title"));
        assert_eq!(updated.tags, vec!["t"]);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_update_clears_title_with_explicit_null() {
        let db = HistoryDatabase::open_in_memory().await.unwrap();
        let mut new = input("x", &[]);
        new.title = Some("Title".to_string());
        let created = db.insert(&new).await.unwrap();

        let updated = db
            .update(&UpdateEntryInput {
                id: created.id,
                title: Some(None),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();
        assert!(updated.title.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let db = HistoryDatabase::open_in_memory().await.unwrap();
        let result = db
            .update(&UpdateEntryInput {
                id: 7,
                content: Some("x".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_touch_increments_and_stamps() {
        let db = HistoryDatabase::open_in_memory().await.unwrap();
        let created = db.insert(&input("x", &[])).await.unwrap();

        let first = db.touch(created.id).await.unwrap().unwrap();
        let second = db.touch(created.id).await.unwrap().unwrap();

        assert_eq!(first.usage_count, 1);
        assert_eq!(second.usage_count, 2);
        assert!(second.last_used_at.unwrap() >= first.last_used_at.unwrap());
        assert!(second.updated_at > first.updated_at);
        assert!(db.touch(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let db = HistoryDatabase::open_in_memory().await.unwrap();
        let a = db.insert(&input("a", &[])).await.unwrap();
        let b = db.insert(&input("b", &[])).await.unwrap();
        db.insert(&input("c", &[])).await.unwrap();

        assert_eq!(db.delete(9999).await.unwrap(), 0);
        assert_eq!(db.delete_many(&[a.id, b.id, 9999]).await.unwrap(), 2);
        assert_eq!(db.delete_all().await.unwrap(), 1);
        assert_eq!(db.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unicode_lower_folds_non_ascii() {
        let db = HistoryDatabase::open_in_memory().await.unwrap();
        let conn = db.conn.lock().await;

        let (cyrillic, accented, missing): (String, String, Option<String>) = conn
            .query_row(
                "SELECT unicode_lower('ПРИВЕТ Мир'),
                        unicode_lower('École'),
                        unicode_lower(NULL)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(cyrillic, "привет мир");
        assert_eq!(accented, "école");
        assert!(missing.is_none());
    }
}
