//! Error types and handling for the forecast aggregator

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse failure category reported to callers inside `ProviderResult::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LocationNotFound,
    SourceUnreachable,
    ExtractionFailed,
    UnsupportedRange,
    EmptyResult,
    /// The adapter task itself died (panic or cancellation)
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::LocationNotFound => "location_not_found",
            ErrorKind::SourceUnreachable => "source_unreachable",
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::UnsupportedRange => "unsupported_range",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Main error type for the aggregator library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeteoError {
    /// Geocoding returned zero candidates
    #[error("Location not found: {message}")]
    LocationNotFound { message: String },

    /// Network failure or non-success response from a source
    #[error("Source unreachable: {message}")]
    SourceUnreachable { message: String },

    /// Selector cascade exhausted with zero usable fields
    #[error("Extraction failed: {message}")]
    ExtractionFailed { message: String },

    /// Requested day offset is beyond what a source can address
    #[error("Unsupported range: {message}")]
    UnsupportedRange { message: String },

    /// Filtering legitimately produced nothing
    #[error("Empty result: {message}")]
    EmptyResult { message: String },

    /// Adapter task panicked or was cancelled
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl MeteoError {
    pub fn location_not_found<S: Into<String>>(message: S) -> Self {
        Self::LocationNotFound {
            message: message.into(),
        }
    }

    pub fn unreachable<S: Into<String>>(message: S) -> Self {
        Self::SourceUnreachable {
            message: message.into(),
        }
    }

    pub fn extraction<S: Into<String>>(message: S) -> Self {
        Self::ExtractionFailed {
            message: message.into(),
        }
    }

    pub fn unsupported_range<S: Into<String>>(message: S) -> Self {
        Self::UnsupportedRange {
            message: message.into(),
        }
    }

    pub fn empty<S: Into<String>>(message: S) -> Self {
        Self::EmptyResult {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Category used in `ProviderResult::Error`. Configuration problems only
    /// surface at construction time, so they fold into `Internal` here.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeteoError::LocationNotFound { .. } => ErrorKind::LocationNotFound,
            MeteoError::SourceUnreachable { .. } => ErrorKind::SourceUnreachable,
            MeteoError::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            MeteoError::UnsupportedRange { .. } => ErrorKind::UnsupportedRange,
            MeteoError::EmptyResult { .. } => ErrorKind::EmptyResult,
            MeteoError::Internal { .. } | MeteoError::Config { .. } => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for MeteoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MeteoError::unreachable(format!("request timed out: {err}"))
        } else {
            MeteoError::unreachable(err.to_string())
        }
    }
}
