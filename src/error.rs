// src/error.rs

//! Unified error handling for the probe application.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AtsBackend;

/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regular expression failed to compile
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration or input error. Aborts the run before probing starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No archived capture exists at or before the requested time
    #[error("No archived snapshot of {url} at or before {as_of}")]
    SnapshotUnavailable { url: String, as_of: String },

    /// Network non-response after all retries
    #[error("Timed out retrieving {url} after {attempts} attempt(s)")]
    RetrievalTimeout { url: String, attempts: u32 },

    /// A job board back end failed to answer or returned unparseable data
    #[error("{backend} board unreachable: {message}")]
    AdapterUnreachable { backend: AtsBackend, message: String },

    /// Neither the job board nor the fallback aggregator produced listings
    #[error("No hiring data available for {company}")]
    NoHiringDataAvailable { company: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an adapter error for the given back end.
    pub fn adapter(backend: AtsBackend, message: impl fmt::Display) -> Self {
        Self::AdapterUnreachable {
            backend,
            message: message.to_string(),
        }
    }

    /// Create a no-data error for a company.
    pub fn no_hiring_data(company: impl Into<String>) -> Self {
        Self::NoHiringDataAvailable {
            company: company.into(),
        }
    }

    /// Whether this error is a timeout, at any layer.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::RetrievalTimeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Classify the error for the report's failure marker.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::SnapshotUnavailable { .. } => FailureKind::SnapshotUnavailable,
            Self::RetrievalTimeout { .. } => FailureKind::RetrievalTimeout,
            Self::AdapterUnreachable { .. } => FailureKind::AdapterUnreachable,
            Self::NoHiringDataAvailable { .. } => FailureKind::NoHiringDataAvailable,
            Self::Config(_) => FailureKind::ConfigurationError,
            e if e.is_timeout() => FailureKind::RetrievalTimeout,
            _ => FailureKind::FetchFailed,
        }
    }
}

/// Failure classification attached to an unavailable branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SnapshotUnavailable,
    RetrievalTimeout,
    AdapterUnreachable,
    NoHiringDataAvailable,
    ConfigurationError,
    /// The branch had no input to work with (e.g. no pricing URL)
    NotConfigured,
    /// The per-branch deadline expired
    BranchTimeout,
    /// Any other transport or parse failure
    FetchFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        let err = AppError::SnapshotUnavailable {
            url: "https://example.com/pricing".into(),
            as_of: "2025-01-01".into(),
        };
        assert_eq!(err.failure_kind(), FailureKind::SnapshotUnavailable);

        let err = AppError::adapter(AtsBackend::Lever, "HTTP 500");
        assert_eq!(err.failure_kind(), FailureKind::AdapterUnreachable);
        assert!(err.to_string().contains("lever"));

        let err = AppError::RetrievalTimeout {
            url: "https://example.com".into(),
            attempts: 3,
        };
        assert!(err.is_timeout());
        assert_eq!(err.failure_kind(), FailureKind::RetrievalTimeout);

        let err = AppError::config("bad input");
        assert_eq!(err.failure_kind(), FailureKind::ConfigurationError);
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::NoHiringDataAvailable).unwrap();
        assert_eq!(json, "\"no_hiring_data_available\"");
    }
}
