//! Storage error handling
//!
//! Typed errors for store operations. Store-level errors are fatal to the
//! operation that caused them but never to the process; a failed
//! initialization leaves the application running without persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Schema setup or image load failed during initialization
    #[error("Failed to initialize store: {source}")]
    Initialization {
        #[source]
        source: rusqlite::Error,
    },

    /// Read-only statement failed (malformed SQL, parameter mismatch)
    #[error("Query failed: `{statement}`: {source}")]
    Query {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Mutating statement failed
    #[error("Statement failed: `{statement}`: {source}")]
    Execute {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Serializing the in-memory image to disk failed; the image itself is
    /// unaffected. Covers the backup step and the surrounding filesystem
    /// work (temp file, fsync, rename).
    #[error("Failed to save store image to {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Store used before a successful `initialize()`
    #[error("Store is not initialized")]
    NotInitialized,

    /// `transaction()` called while another transaction is open
    #[error("Nested transactions are not supported")]
    NestedTransaction,

    /// The transaction body failed and the rollback failed too; the
    /// in-memory image may be inconsistent with what the caller believes was
    /// undone. Carries both errors.
    #[error("Transaction rollback failed ({rollback}) after: {original}")]
    RollbackFailed {
        original: Box<StoreError>,
        #[source]
        rollback: rusqlite::Error,
    },

    /// Other SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_failed_carries_both_errors() {
        let original = StoreError::Execute {
            statement: "DELETE FROM questions".to_string(),
            source: rusqlite::Error::InvalidQuery,
        };
        let err = StoreError::RollbackFailed {
            original: Box::new(original),
            rollback: rusqlite::Error::InvalidQuery,
        };

        let msg = err.to_string();
        assert!(msg.contains("rollback failed"));
        assert!(msg.contains("DELETE FROM questions"));
    }

    #[test]
    fn test_save_error_display() {
        let err = StoreError::Save {
            path: PathBuf::from("/data/coursebox.db"),
            source: Box::new(rusqlite::Error::InvalidQuery),
        };
        assert!(err.to_string().contains("/data/coursebox.db"));
    }
}
