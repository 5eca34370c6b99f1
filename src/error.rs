//! Error types shared across the crate.
//!
//! Every failure the service can recover from has its own enum here, so callers can
//! decide per kind whether to log and drop, close a session, or abort startup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by positional edits on the replicated sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// Insert position lies outside `0..=len`.
    #[error("insert position {position} is out of bounds for document of length {len}")]
    PositionOutOfBounds { position: i64, len: usize },
}

/// Errors produced while loading or saving a document snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access snapshot file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot file {path} is not a JSON array of strings: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors reported by a participant's transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("write timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport failure: {0}")]
    Io(String),
}

/// Errors produced while decoding an inbound wire message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("message does not match the operation schema: {0}")]
    Json(#[from] serde_json::Error),
}
