//! Method routing from RPC requests to history operations

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::history::input::EntryId;
use crate::history::{
    BulkDeleteInput, ClipboardHistory, CreateEntryInput, PopularTagsInput, SearchInput,
    UpdateEntryInput,
};
use crate::rpc::protocol::{methods, HealthStatus, Request, Response};
use crate::rpc::{Result, RpcError};

/// Routes requests to the clipboard history
#[derive(Clone)]
pub struct Dispatcher {
    history: Arc<ClipboardHistory>,
}

impl Dispatcher {
    pub fn new(history: Arc<ClipboardHistory>) -> Self {
        Self { history }
    }

    /// Parse one text frame and produce its response
    pub async fn handle_text(&self, text: &str) -> Response {
        match serde_json::from_str::<Request>(text) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                let err = RpcError::MalformedRequest(e);
                warn!("Rejecting frame: {}", err);
                Response::error(None, err.code(), err.to_string())
            }
        }
    }

    /// Execute a request, converting failures into error responses
    pub async fn handle(&self, request: Request) -> Response {
        let Request { id, method, params } = request;
        debug!("Dispatching {} ({})", method, id);

        match self.call(&method, params).await {
            Ok(value) => Response::result(id, value),
            Err(err) => {
                debug!("{} failed: {}", method, err);
                Response::error(Some(id), err.code(), err.to_string())
            }
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let history = &self.history;

        match method {
            methods::HEALTHCHECK => encode(HealthStatus::ok()),
            methods::CREATE_ENTRY => {
                let input: CreateEntryInput = decode(method, params)?;
                encode(history.create(input).await?)
            }
            methods::GET_ALL_ENTRIES => encode(history.get_all().await?),
            methods::SEARCH_ENTRIES => {
                let search: Option<SearchInput> = decode(method, params)?;
                encode(history.search(search).await?)
            }
            methods::UPDATE_ENTRY => {
                let input: UpdateEntryInput = decode(method, params)?;
                encode(history.update(input).await?)
            }
            methods::DELETE_ENTRY => {
                let EntryId { id } = decode(method, params)?;
                history.delete(id).await?;
                Ok(Value::Null)
            }
            methods::BULK_DELETE_ENTRIES => {
                let input: BulkDeleteInput = decode(method, params)?;
                encode(history.bulk_delete(input).await?)
            }
            methods::CLEAR_ALL_ENTRIES => encode(history.clear_all().await?),
            methods::TRACK_USAGE => {
                let EntryId { id } = decode(method, params)?;
                encode(history.touch_usage(id).await?)
            }
            methods::GET_STATS => encode(history.stats().await?),
            methods::GET_ALL_TAGS => encode(history.all_tags().await?),
            methods::GET_POPULAR_TAGS => {
                let input: Option<PopularTagsInput> = decode(method, params)?;
                encode(history.popular_tags(input.unwrap_or_default()).await?)
            }
            other => Err(RpcError::MethodNotFound(other.to_string())),
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|source| RpcError::InvalidParams {
        method: method.to_string(),
        source,
    })
}

fn encode<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(RpcError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ClipboardEntry, ClipboardStats};
    use crate::rpc::protocol::{ErrorCode, Outcome};
    use serde_json::json;

    async fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(ClipboardHistory::open_in_memory().await.unwrap()))
    }

    async fn ok(dispatcher: &Dispatcher, method: &str, params: Value) -> Value {
        match dispatcher.handle(Request::new(method, params)).await.outcome {
            Outcome::Result(value) => value,
            Outcome::Error(e) => panic!("{} failed: {:?}", method, e),
        }
    }

    async fn err(dispatcher: &Dispatcher, method: &str, params: Value) -> ErrorCode {
        match dispatcher.handle(Request::new(method, params)).await.outcome {
            Outcome::Result(value) => panic!("{} unexpectedly returned {}", method, value),
            Outcome::Error(e) => e.code,
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let d = dispatcher().await;

        let created: ClipboardEntry = serde_json::from_value(
            ok(&d, "createEntry", json!({"content": "hello", "tags": ["greeting"]})).await,
        )
        .unwrap();
        assert_eq!(created.tags, vec!["greeting"]);

        let all: Vec<ClipboardEntry> =
            serde_json::from_value(ok(&d, "getAllEntries", Value::Null).await).unwrap();
        assert_eq!(all, vec![created]);
    }

    #[tokio::test]
    async fn test_search_with_and_without_filters() {
        let d = dispatcher().await;
        for i in 0..60 {
            ok(&d, "createEntry", json!({"content": format!("entry {}", i)})).await;
        }

        let unpaged = ok(&d, "searchEntries", Value::Null).await;
        assert_eq!(unpaged.as_array().unwrap().len(), 60);

        let paged = ok(&d, "searchEntries", json!({})).await;
        assert_eq!(paged.as_array().unwrap().len(), 50);

        let narrow = ok(&d, "searchEntries", json!({"query": "ENTRY 5", "limit": 3})).await;
        assert_eq!(narrow.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_error_codes() {
        let d = dispatcher().await;

        assert_eq!(err(&d, "createEntry", json!({"content": ""})).await, ErrorCode::BadRequest);
        assert_eq!(
            err(&d, "createEntry", json!({"title": "no content"})).await,
            ErrorCode::BadRequest
        );
        assert_eq!(err(&d, "searchEntries", json!({"offset": -1})).await, ErrorCode::BadRequest);
        assert_eq!(err(&d, "bulkDeleteEntries", json!({"ids": []})).await, ErrorCode::BadRequest);
        assert_eq!(err(&d, "getPopularTags", json!({"limit": 51})).await, ErrorCode::BadRequest);
        assert_eq!(
            err(&d, "updateEntry", json!({"id": 5, "is_pinned": true})).await,
            ErrorCode::NotFound
        );
        assert_eq!(err(&d, "trackUsage", json!({"id": 5})).await, ErrorCode::NotFound);
        assert_eq!(err(&d, "dropTables", Value::Null).await, ErrorCode::MethodNotFound);
    }

    #[tokio::test]
    async fn test_deletes_are_idempotent() {
        let d = dispatcher().await;
        let created = ok(&d, "createEntry", json!({"content": "x"})).await;
        let id = created["id"].clone();

        assert_eq!(ok(&d, "deleteEntry", json!({"id": id})).await, Value::Null);
        assert_eq!(ok(&d, "deleteEntry", json!({"id": id})).await, Value::Null);
        assert_eq!(ok(&d, "bulkDeleteEntries", json!({"ids": [id, 12345]})).await, json!(0));
        assert_eq!(ok(&d, "clearAllEntries", Value::Null).await, json!(0));
    }

    #[tokio::test]
    async fn test_update_title_null_clears() {
        let d = dispatcher().await;
        let created = ok(&d, "createEntry", json!({"content": "x", "title": "T"})).await;
        let id = created["id"].clone();

        let untouched = ok(&d, "updateEntry", json!({"id": id, "is_favorite": true})).await;
        assert_eq!(untouched["title"], json!("T"));

        let cleared = ok(&d, "updateEntry", json!({"id": id, "title": null})).await;
        assert_eq!(cleared["title"], Value::Null);
    }

    #[tokio::test]
    async fn test_stats_tags_and_health() {
        let d = dispatcher().await;
        let created = ok(&d, "createEntry", json!({"content": "x", "tags": ["a", "b"]})).await;
        ok(&d, "trackUsage", json!({"id": created["id"]})).await;

        let stats: ClipboardStats =
            serde_json::from_value(ok(&d, "getStats", Value::Null).await).unwrap();
        assert_eq!(stats.total_tags, 2);
        assert_eq!(stats.most_used_entry.unwrap().usage_count, 1);

        assert_eq!(ok(&d, "getAllTags", Value::Null).await, json!(["a", "b"]));
        assert_eq!(
            ok(&d, "getPopularTags", json!({"limit": 1})).await,
            json!([{"tag": "a", "count": 1}])
        );

        let health = ok(&d, "healthcheck", Value::Null).await;
        assert_eq!(health["status"], json!("ok"));
    }

    #[tokio::test]
    async fn test_malformed_frame() {
        let d = dispatcher().await;
        let response = d.handle_text("{not json").await;
        assert!(response.id.is_none());
        match response.outcome {
            Outcome::Error(e) => assert_eq!(e.code, ErrorCode::BadRequest),
            Outcome::Result(_) => panic!("malformed frame accepted"),
        }
    }
}
