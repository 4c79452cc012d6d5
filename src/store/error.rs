//! Store error types
//!
//! Errors raised while reading from the time-series or metadata store.
//! These are fatal for the caller: data retrieval is never best-effort.

use thiserror::Error;

/// Errors that can occur in the store layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tag or field column held something other than the expected JSON shape
    #[error("Corrupt tag data for {entity_id}: {error}")]
    CorruptTags { entity_id: String, error: String },

    /// Import file could not be read
    #[error("Import error: {0}")]
    Import(String),
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        StoreError::Import(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Import(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::CorruptTags {
            entity_id: "ahu-1-sat".to_string(),
            error: "expected array".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt tag data for ahu-1-sat: expected array"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }
}
