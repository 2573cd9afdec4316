//! Wire protocol for the ClipShelf RPC interface
//!
//! Every WebSocket text frame carries one JSON object. Requests name a
//! method and carry optional parameters; responses echo the request id
//! and hold either a `result` or an `error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Method names accepted by the dispatcher
pub mod methods {
    pub const HEALTHCHECK: &str = "healthcheck";
    pub const CREATE_ENTRY: &str = "createEntry";
    pub const GET_ALL_ENTRIES: &str = "getAllEntries";
    pub const SEARCH_ENTRIES: &str = "searchEntries";
    pub const UPDATE_ENTRY: &str = "updateEntry";
    pub const DELETE_ENTRY: &str = "deleteEntry";
    pub const BULK_DELETE_ENTRIES: &str = "bulkDeleteEntries";
    pub const CLEAR_ALL_ENTRIES: &str = "clearAllEntries";
    pub const TRACK_USAGE: &str = "trackUsage";
    pub const GET_STATS: &str = "getStats";
    pub const GET_ALL_TAGS: &str = "getAllTags";
    pub const GET_POPULAR_TAGS: &str = "getPopularTags";
}

/// Incoming call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// Correlation id echoed in the response
    pub id: Uuid,

    /// Remote procedure name
    pub method: String,

    /// Method parameters; missing is the same as `null`
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            params,
        }
    }
}

/// Outgoing reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Id of the request, absent when the frame could not be parsed
    pub id: Option<Uuid>,

    pub version: String,

    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Successful result or error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorPayload),
}

impl Response {
    pub fn result(id: Uuid, value: Value) -> Self {
        Self::new(Some(id), Outcome::Result(value))
    }

    pub fn error(id: Option<Uuid>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            id,
            Outcome::Error(ErrorPayload {
                code,
                message: message.into(),
            }),
        )
    }

    fn new(id: Option<Uuid>, outcome: Outcome) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION.to_string(),
            timestamp: Utc::now(),
            outcome,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

/// Error categories surfaced to callers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed frame, bad parameters or failed validation
    BadRequest,
    /// Referenced entry does not exist
    NotFound,
    /// Unknown method name
    MethodNotFound,
    /// Store or encoding failure
    InternalServerError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::MethodNotFound => "METHOD_NOT_FOUND",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        };
        f.write_str(name)
    }
}

/// Healthcheck result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: crate::VERSION.to_string(),
        }
    }
}
