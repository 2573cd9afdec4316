//! RPC transport exposing the clipboard history over WebSocket
//!
//! Each history operation is a named remote procedure. Frames are JSON
//! text messages (see [`protocol`]); [`dispatch`] maps method names to
//! history calls and [`server`] owns the listener and connection tasks.

use thiserror::Error;

use crate::history::HistoryError;

pub mod dispatch;
pub mod protocol;
pub mod server;

pub use dispatch::Dispatcher;
pub use protocol::{
    ErrorCode, ErrorPayload, HealthStatus, Outcome, Request, Response, PROTOCOL_VERSION,
};
pub use server::{RpcServer, ServerConfig};

/// RPC layer errors
#[derive(Debug, Error)]
pub enum RpcError {
    /// Frame is not a valid request object
    #[error("Malformed request: {0}")]
    MalformedRequest(#[source] serde_json::Error),

    /// Parameters do not match the method's input shape
    #[error("Invalid parameters for '{method}': {source}")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// No procedure with this name
    #[error("Unknown method '{0}'")]
    MethodNotFound(String),

    /// Error raised by the history layer
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Result could not be turned into JSON
    #[error("Failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Wire error code for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            RpcError::MalformedRequest(_) | RpcError::InvalidParams { .. } => ErrorCode::BadRequest,
            RpcError::MethodNotFound(_) => ErrorCode::MethodNotFound,
            RpcError::History(HistoryError::Validation(_)) => ErrorCode::BadRequest,
            RpcError::History(HistoryError::NotFound { .. }) => ErrorCode::NotFound,
            RpcError::History(_)
            | RpcError::Encode(_)
            | RpcError::WebSocket(_)
            | RpcError::Io(_) => ErrorCode::InternalServerError,
        }
    }
}

/// Result type for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RpcError::MethodNotFound("nope".to_string()).code(),
            ErrorCode::MethodNotFound
        );
        assert_eq!(
            RpcError::History(HistoryError::NotFound { id: 1 }).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            RpcError::History(HistoryError::Validation("x".to_string())).code(),
            ErrorCode::BadRequest
        );
        assert_eq!(
            RpcError::History(HistoryError::Store(rusqlite::Error::InvalidQuery)).code(),
            ErrorCode::InternalServerError
        );
    }

    #[test]
    fn test_not_found_message_names_id() {
        let err = RpcError::History(HistoryError::NotFound { id: 77 });
        assert_eq!(err.to_string(), "Clipboard entry with id 77 not found");
    }
}
