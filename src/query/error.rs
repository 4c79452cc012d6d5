//! Query error types
//!
//! Malformed caller input fails loudly here; missing data is never an error.

use thiserror::Error;

/// Errors that can occur while resolving or executing a query
#[derive(Error, Debug)]
pub enum QueryError {
    /// Range token had a recognised suffix but an invalid count
    #[error("Invalid range '{token}': {reason}")]
    InvalidRange { token: String, reason: String },

    /// Explicit date text could not be parsed
    #[error("Cannot parse date: '{0}'")]
    InvalidDate(String),

    /// Resolved window is empty or inverted
    #[error("Invalid time range: start {start} is not before end {end}")]
    InvalidTimeRange { start: String, end: String },

    /// Aggregation function is not supported by the store
    #[error("Invalid aggregation: {0}")]
    InvalidAggregation(String),

    /// Storage layer error
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::InvalidRange {
            token: "xh".to_string(),
            reason: "invalid count 'x'".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid range 'xh': invalid count 'x'");

        let err = QueryError::InvalidDate("next tuesday".to_string());
        assert_eq!(err.to_string(), "Cannot parse date: 'next tuesday'");
    }
}
