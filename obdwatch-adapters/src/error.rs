//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when fetching a snapshot.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The bridge answered with a non-success status.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The response body was not a valid snapshot.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The bridge could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Reading a local snapshot source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bridge does not serve the requested group.
    #[error("Unknown group: {0}")]
    UnknownGroup(String),
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(AdapterError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            AdapterError::Http("API returned status 503 Service Unavailable".into()).to_string(),
            "HTTP request failed: API returned status 503 Service Unavailable"
        );
    }

    #[test]
    fn json_errors_become_parse_errors() {
        let err = serde_json::from_str::<obdwatch_types::Snapshot>("{not json").unwrap_err();
        assert!(matches!(AdapterError::from(err), AdapterError::Parse(_)));
    }
}
