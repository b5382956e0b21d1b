//! Errors raised while loading a snapshot or resolving its schema

use thiserror::Error;

/// Errors that can occur while reading a heap snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot schema has no `{field}` field in its {record} record")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("Snapshot schema has no type vocabulary for `{field}` in its {record} record")]
    MissingTypes {
        record: &'static str,
        field: &'static str,
    },

    #[error("Snapshot schema has no nested edge record description")]
    MissingEdgeSchema,

    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    #[error("Failed to parse snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
