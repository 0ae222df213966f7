use core::result::Result as CoreResult;
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while searching for or retrieving assets.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport failed before a response was received, or while reading its body.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status or a malformed envelope.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Header or payload did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns `true` for errors that callers are expected to recover from locally.
    ///
    /// Only [`Error::Parse`] qualifies; it is handled by falling back to a default.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Short tag naming the error class, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Backend(_) => "backend",
            Self::Parse(_) => "parse",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
            Self::Config(_) => "config",
            Self::Other(_) => "other",
        }
    }
}

impl From<ReqwestError> for Error {
    /// Classifies HTTP client failures.
    ///
    /// Status and decode failures mean the backend answered badly; everything
    /// else (connect, timeout, body read, redirect) is a transport failure.
    fn from(error: ReqwestError) -> Self {
        if error.is_status() || error.is_decode() {
            Self::Backend(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as JsonValue, from_str};
    use std::io;

    #[test]
    fn test_error_display() {
        let error1 = Error::Network("connection refused".to_owned());
        assert_eq!(error1.to_string(), "Network error: connection refused");

        let error2 = Error::Backend("status 500".to_owned());
        assert_eq!(error2.to_string(), "Backend error: status 500");

        let error3 = Error::Parse("missing filename".to_owned());
        assert_eq!(error3.to_string(), "Parse error: missing filename");
    }

    #[test]
    fn test_only_parse_is_recoverable() {
        assert!(Error::Parse("bad header".to_owned()).is_recoverable());

        assert!(!Error::Network("reset".to_owned()).is_recoverable());
        assert!(!Error::Backend("404".to_owned()).is_recoverable());
        assert!(!Error::Config("bad url".to_owned()).is_recoverable());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::Network(String::new()).kind(), "network");
        assert_eq!(Error::Backend(String::new()).kind(), "backend");
        assert_eq!(Error::Parse(String::new()).kind(), "parse");
    }

    #[test]
    fn test_error_from_io() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
        assert_eq!(error.kind(), "io");
    }

    #[test]
    fn test_error_from_json() {
        let json_error = from_str::<JsonValue>("invalid json").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Json(_)));
    }
}
