//! Validated request shapes for history operations

use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationErrors};

use super::query::{DEFAULT_LIMIT, DEFAULT_OFFSET};
use super::tags::DEFAULT_POPULAR_LIMIT;

/// Input for creating an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateEntryInput {
    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: String,

    /// An empty title is stored as no title
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update of an entry.
///
/// Omitted fields are left unchanged. `title` has three states: omitted
/// (`None`), explicit `null` (`Some(None)`, clears the title) and a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct UpdateEntryInput {
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: Option<String>,

    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Search request; every filter is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct SearchInput {
    /// Case-insensitive substring matched against content or title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Matches entries carrying at least one of these tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "offset must not be negative"))]
    pub offset: Option<i64>,
}

impl SearchInput {
    /// Effective page size
    pub fn limit(&self) -> u32 {
        self.limit.map_or(DEFAULT_LIMIT, |l| l.clamp(1, 100) as u32)
    }

    /// Effective number of rows to skip
    pub fn offset(&self) -> u64 {
        self.offset.map_or(DEFAULT_OFFSET, |o| o.max(0) as u64)
    }
}

/// Ids for bulk deletion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct BulkDeleteInput {
    #[validate(length(min = 1, message = "At least one ID required"))]
    pub ids: Vec<i64>,
}

/// Single-entry reference used by delete and usage tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryId {
    pub id: i64,
}

/// Popular tag listing size
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PopularTagsInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 50, message = "limit must be between 1 and 50"))]
    pub limit: Option<i64>,
}

impl PopularTagsInput {
    pub fn limit(&self) -> u32 {
        self.limit
            .map_or(DEFAULT_POPULAR_LIMIT, |l| l.clamp(1, 50) as u32)
    }
}

/// Keeps an explicit `null` distinct from a missing field.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Flatten validator output into one sorted, human-readable line
pub(crate) fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_update_title_three_states() {
        let omitted: UpdateEntryInput = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(omitted.title, None);

        let cleared: UpdateEntryInput =
            serde_json::from_str(r#"{"id": 1, "title": null}"#).unwrap();
        assert_eq!(cleared.title, Some(None));

        let set: UpdateEntryInput =
            serde_json::from_str(r#"{"id": 1, "title": "Snippet"}"#).unwrap();
        assert_eq!(set.title, Some(Some("Snippet".to_string())));
    }

    #[test]
    fn test_cleared_title_serializes_as_null() {
        let input = UpdateEntryInput {
            id: 3,
            title: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({"id": 3, "title": null}));
    }

    #[test]
    fn test_create_defaults() {
        let input: CreateEntryInput = serde_json::from_str(r#"{"content": "x"}"#).unwrap();
        assert!(input.tags.is_empty());
        assert!(input.title.is_none());
        assert!(input.validate().is_ok());
    }

    #[rstest]
    #[case(None, None, true)]
    #[case(Some(1), Some(0), true)]
    #[case(Some(100), Some(500), true)]
    #[case(Some(0), None, false)]
    #[case(Some(101), None, false)]
    #[case(Some(-5), None, false)]
    #[case(None, Some(-1), false)]
    fn test_search_bounds(
        #[case] limit: Option<i64>,
        #[case] offset: Option<i64>,
        #[case] valid: bool,
    ) {
        let input = SearchInput {
            limit,
            offset,
            ..Default::default()
        };
        assert_eq!(input.validate().is_ok(), valid);
    }

    #[rstest]
    #[case(None, 10)]
    #[case(Some(1), 1)]
    #[case(Some(50), 50)]
    fn test_popular_limit(#[case] limit: Option<i64>, #[case] expected: u32) {
        let input = PopularTagsInput { limit };
        assert!(input.validate().is_ok());
        assert_eq!(input.limit(), expected);
    }

    #[test]
    fn test_popular_limit_bounds() {
        assert!(PopularTagsInput { limit: Some(0) }.validate().is_err());
        assert!(PopularTagsInput { limit: Some(51) }.validate().is_err());
    }

    #[test]
    fn test_search_defaults() {
        let input = SearchInput::default();
        assert_eq!(input.limit(), 50);
        assert_eq!(input.offset(), 0);
    }

    #[test]
    fn test_update_rejects_empty_content() {
        let input = UpdateEntryInput {
            id: 1,
            content: Some(String::new()),
            ..Default::default()
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(describe(&errors), "content: Content cannot be empty");
    }

    #[test]
    fn test_bulk_delete_message() {
        let errors = BulkDeleteInput { ids: vec![] }.validate().unwrap_err();
        assert_eq!(describe(&errors), "ids: At least one ID required");
    }
}
