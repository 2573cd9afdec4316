//! Statistics aggregation over the whole history

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::database::{entry_from_row, ENTRY_COLUMNS};
use super::query::{count_entries, select_entries, EntryQuery, Filter, Predicate};
use super::{tags, ClipboardEntry, HistoryResult};

/// Size of the recent-entries view
pub const RECENT_ENTRIES: u32 = 5;

/// Summary of the clipboard history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardStats {
    pub total_entries: u64,
    pub pinned_entries: u64,
    pub favorite_entries: u64,
    /// Number of distinct tags
    pub total_tags: u64,
    /// Highest usage count among used entries; lowest id wins ties
    pub most_used_entry: Option<ClipboardEntry>,
    /// Newest entries regardless of pin state
    pub recent_entries: Vec<ClipboardEntry>,
}

/// Gather every figure inside one read transaction
pub fn collect(conn: &Connection) -> HistoryResult<ClipboardStats> {
    let tx = conn.unchecked_transaction()?;

    let stats = ClipboardStats {
        total_entries: count_entries(&tx, &Filter::all())?,
        pinned_entries: count_entries(&tx, &Filter::all().and(Predicate::Pinned(true)))?,
        favorite_entries: count_entries(&tx, &Filter::all().and(Predicate::Favorite(true)))?,
        total_tags: tags::count_distinct(&tx)?,
        most_used_entry: most_used_entry(&tx)?,
        recent_entries: select_entries(&tx, &EntryQuery::recent(RECENT_ENTRIES))?,
    };

    tx.commit()?;
    Ok(stats)
}

fn most_used_entry(conn: &Connection) -> HistoryResult<Option<ClipboardEntry>> {
    let entry = conn
        .query_row(
            &format!(
                "SELECT {} FROM clipboard_entries
                 WHERE usage_count > 0
                 ORDER BY usage_count DESC, id ASC
                 LIMIT 1",
                ENTRY_COLUMNS
            ),
            [],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}
