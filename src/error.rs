use thiserror::Error;

use crate::document::models::ChunkKey;

/// Errors surfaced by the editing core.
///
/// File-level concerns (reading input, parsing config) stay on `anyhow` in
/// the CLI; everything below the dispatch point reports one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    /// Malformed or duplicate-id input. Nothing was loaded.
    #[error("ingestion error: {0}")]
    Ingestion(String),

    #[error("chunk not found: {0}")]
    NotFound(ChunkKey),

    /// A range replacement would have changed the total segment count or
    /// order. The document is left as it was.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Edits are only accepted for chunks that are currently visible.
    #[error("chunk {0} is hidden and read-only")]
    ReadOnly(ChunkKey),
}

pub type EditorResult<T> = Result<T, EditorError>;
