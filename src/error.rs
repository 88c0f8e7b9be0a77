//! Error types for tagsift

use std::fmt;

/// Result type alias for tagsift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tagsift
///
/// These are hard failures only. "No data" outcomes (empty baseline,
/// zero matching rows) are not errors and are modeled as discriminated
/// stage outcomes instead.
#[derive(Debug)]
pub enum Error {
    /// Event store query execution failed
    QueryExecution(String),
    /// Event store returned rows the pipeline cannot interpret
    MalformedResponse(String),
    /// Configuration errors
    Config(String),
    /// Metric column is not in the allowed vocabulary
    UnknownMetric(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::QueryExecution(msg) => write!(f, "Query execution error: {}", msg),
            Error::MalformedResponse(msg) => write!(f, "Malformed store response: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::UnknownMetric(column) => {
                write!(f, "'{}' is not a supported metric column", column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_failing_detail() {
        assert_eq!(
            Error::QueryExecution("store unreachable".to_string()).to_string(),
            "Query execution error: store unreachable"
        );
        assert_eq!(
            Error::MalformedResponse("missing tags_key".to_string()).to_string(),
            "Malformed store response: missing tags_key"
        );
        assert_eq!(
            Error::Config("per_page too large".to_string()).to_string(),
            "Configuration error: per_page too large"
        );
        assert_eq!(
            Error::UnknownMetric("bogus.metric".to_string()).to_string(),
            "'bogus.metric' is not a supported metric column"
        );
    }
}
