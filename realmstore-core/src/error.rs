//! Error types for record store operations.

use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, RecordStoreError>;

/// Errors raised by the record store and its snapshot serialization.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// A conditional write was rejected because the stored record no longer
    /// matches the value captured by the paired read. Recoverable: re-read,
    /// recompute, retry. Never retried internally.
    #[error("record was unexpectedly mutated before write")]
    Conflict,

    /// A persisted record claims to be registered but carries no payload.
    #[error("registered record is missing its payload")]
    MalformedRecord,

    /// A snapshot file operation failed.
    #[error("i/o error during {context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Snapshot JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The record table mutex was poisoned.
    #[error("store lock error: {0}")]
    Lock(String),
}

impl RecordStoreError {
    /// Creates an I/O error with context.
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
