// Error types for importing and persisting the world graph.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

/// The exit ID counter has reached `i64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("exit ID space exhausted")]
pub struct IdExhausted;

// ---------------------------------------------------------------------------
// Import (authoring file) errors
// ---------------------------------------------------------------------------

/// Failure while overlaying an authoring file onto the in-memory graph.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read authoring file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed authoring JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("room key `{key}` is not an integer room ID")]
    RoomKey {
        key: String,
        source: std::num::ParseIntError,
    },

    #[error("cannot allocate exit IDs: {0}")]
    Ids(#[from] IdExhausted),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Failure while loading or saving a snapshot in the embedded store.
///
/// Any of these aborts the whole store operation; the enclosing transaction
/// is rolled back, so the store never holds a half-written snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open world store at {path}: {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },

    #[error("{0} bucket not found")]
    MissingBucket(&'static str),

    #[error("failed to decode {bucket} entry `{key}`: {source}")]
    Decode {
        bucket: &'static str,
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: String,
        source: serde_json::Error,
    },

    #[error("invalid exit key format: `{0}`")]
    BadExitKey(String),

    #[error("room not found for exit: {key}")]
    OrphanExit { key: String },

    #[error("store operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
