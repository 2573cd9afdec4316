//! Tag index derived from the per-entry tag lists
//!
//! Tags live as a JSON array inside each row. Both listings unnest those
//! arrays with `json_each`, so a tag is counted once per occurrence in the
//! flattened list of every entry's tags. Matching is exact and
//! case-sensitive.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::HistoryResult;

/// Popular tag listing size when none is requested
pub const DEFAULT_POPULAR_LIMIT: u32 = 10;

/// A tag and how many times it occurs across entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Distinct tags, ascending byte order
pub fn all_tags(conn: &Connection) -> HistoryResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT tag.value
         FROM clipboard_entries, json_each(clipboard_entries.tags) AS tag
         ORDER BY tag.value ASC",
    )?;
    let tags = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

/// Number of distinct tags
pub fn count_distinct(conn: &Connection) -> HistoryResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT tag.value)
         FROM clipboard_entries, json_each(clipboard_entries.tags) AS tag",
        [],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Tags by descending frequency, ties by name ascending
pub fn popular_tags(conn: &Connection, limit: u32) -> HistoryResult<Vec<TagCount>> {
    let mut stmt = conn.prepare(
        "SELECT tag.value, COUNT(*) AS occurrences
         FROM clipboard_entries, json_each(clipboard_entries.tags) AS tag
         GROUP BY tag.value
         ORDER BY occurrences DESC, tag.value ASC
         LIMIT ?",
    )?;
    let tags = stmt
        .query_map(params![limit], |row| {
            let count: i64 = row.get(1)?;
            Ok(TagCount {
                tag: row.get(0)?,
                count: count as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}
