//! Query engine: filter composition, fixed ordering and pagination
//!
//! A search request compiles into a [`Filter`], a conjunction of
//! [`Predicate`]s. Each predicate can be evaluated against an entry in
//! memory or rendered into a SQL clause with bound parameters; the two
//! renderings agree, which the tests check against real SQLite.

use std::cmp::Ordering;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use super::database::{entry_from_row, ENTRY_COLUMNS, UNICODE_LOWER};
use super::input::SearchInput;
use super::{ClipboardEntry, HistoryResult};

/// Page size applied to a search without an explicit limit
pub const DEFAULT_LIMIT: u32 = 50;

/// Rows skipped by a search without an explicit offset
pub const DEFAULT_OFFSET: u64 = 0;

/// One filter condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Substring of content or title, Unicode case-insensitive
    Text(String),
    /// Entry carries at least one of the tags
    AnyTag(Vec<String>),
    /// Exact pinned flag
    Pinned(bool),
    /// Exact favorite flag
    Favorite(bool),
}

impl Predicate {
    /// Evaluate against an entry already in memory
    pub fn matches(&self, entry: &ClipboardEntry) -> bool {
        match self {
            Predicate::Text(needle) => {
                let needle = needle.to_lowercase();
                entry.content.to_lowercase().contains(&needle)
                    || entry
                        .title
                        .as_ref()
                        .is_some_and(|t| t.to_lowercase().contains(&needle))
            }
            Predicate::AnyTag(wanted) => entry.tags.iter().any(|t| wanted.contains(t)),
            Predicate::Pinned(pinned) => entry.is_pinned == *pinned,
            Predicate::Favorite(favorite) => entry.is_favorite == *favorite,
        }
    }

    /// Render as a SQL boolean expression, pushing its parameters
    fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            // instr() keeps the query literal; LIKE would treat % and _ as wildcards
            Predicate::Text(needle) => {
                let needle = needle.to_lowercase();
                params.push(Value::Text(needle.clone()));
                params.push(Value::Text(needle));
                format!(
                    "(instr({lower}(content), ?) > 0 OR instr({lower}(title), ?) > 0)",
                    lower = UNICODE_LOWER
                )
            }
            Predicate::AnyTag(wanted) if wanted.is_empty() => "0".to_string(),
            Predicate::AnyTag(wanted) => {
                let placeholders = vec!["?"; wanted.len()].join(", ");
                params.extend(wanted.iter().cloned().map(Value::Text));
                format!(
                    "EXISTS (SELECT 1 FROM json_each(clipboard_entries.tags) AS tag \
                     WHERE tag.value IN ({}))",
                    placeholders
                )
            }
            Predicate::Pinned(pinned) => {
                params.push(Value::Integer(*pinned as i64));
                "is_pinned = ?".to_string()
            }
            Predicate::Favorite(favorite) => {
                params.push(Value::Integer(*favorite as i64));
                "is_favorite = ?".to_string()
            }
        }
    }
}

/// Conjunction of predicates; empty means "every entry"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// Filter matching every entry
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a predicate to the conjunction
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Compile a search request. Empty text queries and empty tag
    /// lists add no condition.
    pub fn from_search(search: &SearchInput) -> Self {
        let mut filter = Self::all();

        if let Some(query) = search.query.as_deref().filter(|q| !q.is_empty()) {
            filter = filter.and(Predicate::Text(query.to_string()));
        }
        if let Some(pinned) = search.is_pinned {
            filter = filter.and(Predicate::Pinned(pinned));
        }
        if let Some(favorite) = search.is_favorite {
            filter = filter.and(Predicate::Favorite(favorite));
        }
        if let Some(tags) = search.tags.as_ref().filter(|t| !t.is_empty()) {
            filter = filter.and(Predicate::AnyTag(tags.clone()));
        }

        filter
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// True when every predicate matches
    pub fn matches(&self, entry: &ClipboardEntry) -> bool {
        self.predicates.iter().all(|p| p.matches(entry))
    }

    /// `WHERE` clause (with leading space, or empty) and its parameters
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        if self.predicates.is_empty() {
            return (String::new(), params);
        }

        let clauses: Vec<String> = self
            .predicates
            .iter()
            .map(|p| p.render(&mut params))
            .collect();
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Row ordering. Ties always fall back to id descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Pinned entries first, then newest first
    #[default]
    PinnedFirst,
    /// Newest first, pin state ignored
    Newest,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::PinnedFirst => " ORDER BY is_pinned DESC, created_at DESC, id DESC",
            SortOrder::Newest => " ORDER BY created_at DESC, id DESC",
        }
    }

    /// Same ordering as the SQL rendering, for entries in memory
    pub fn compare(self, a: &ClipboardEntry, b: &ClipboardEntry) -> Ordering {
        let newest = b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id));
        match self {
            SortOrder::PinnedFirst => b.is_pinned.cmp(&a.is_pinned).then(newest),
            SortOrder::Newest => newest,
        }
    }
}

/// Limit/offset window applied after filtering and sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
        }
    }
}

/// A complete read: filter, order and optional page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    pub filter: Filter,
    pub order: SortOrder,
    pub page: Option<Page>,
}

impl EntryQuery {
    /// Every entry, pinned first, no pagination
    pub fn all() -> Self {
        Self::default()
    }

    /// `None` is the get-all path; a search request, even an empty one,
    /// is always paginated.
    pub fn from_search(search: Option<&SearchInput>) -> Self {
        match search {
            None => Self::all(),
            Some(search) => Self {
                filter: Filter::from_search(search),
                order: SortOrder::PinnedFirst,
                page: Some(Page {
                    limit: search.limit(),
                    offset: search.offset(),
                }),
            },
        }
    }

    /// The `count` newest entries regardless of pin state
    pub fn recent(count: u32) -> Self {
        Self {
            filter: Filter::all(),
            order: SortOrder::Newest,
            page: Some(Page {
                limit: count,
                offset: 0,
            }),
        }
    }

    fn to_sql(&self) -> (String, Vec<Value>) {
        let (clause, mut params) = self.filter.to_sql();
        let mut sql = format!(
            "SELECT {} FROM clipboard_entries{}{}",
            ENTRY_COLUMNS,
            clause,
            self.order.sql()
        );
        if let Some(page) = self.page {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Integer(page.limit as i64));
            params.push(Value::Integer(page.offset.min(i64::MAX as u64) as i64));
        }
        (sql, params)
    }
}

/// Run a query against the store
pub fn select_entries(conn: &Connection, query: &EntryQuery) -> HistoryResult<Vec<ClipboardEntry>> {
    let (sql, params) = query.to_sql();
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params_from_iter(params.iter()), entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Count entries matching a filter
pub fn count_entries(conn: &Connection, filter: &Filter) -> HistoryResult<u64> {
    let (clause, params) = filter.to_sql();
    let sql = format!("SELECT COUNT(*) FROM clipboard_entries{}", clause);
    let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
    Ok(count as u64)
}
