//! # ClipShelf
//!
//! Clipboard history service: stores text snippets with titles, tags,
//! pinned/favorite flags and usage statistics, and serves query, mutation
//! and analytics operations over a JSON-over-WebSocket RPC interface.

pub mod cli;
pub mod config;
pub mod history;
pub mod rpc;

pub use config::Config;
pub use history::{ClipboardEntry, ClipboardHistory};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
