// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

use crate::models::Coordinate;

/// Result type alias for crawler operations.
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

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resolution level missing from the edge-length table
    #[error("Unsupported resolution {level} (supported: {supported})")]
    UnsupportedResolution { level: u8, supported: String },

    /// Latitude/longitude outside the valid range
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A saturated tile could not be refined any further
    #[error(
        "Area too dense to fully enumerate: tile {center} saturated at resolution {resolution}, \
         which is the finest available"
    )]
    TooDense { center: Coordinate, resolution: u8 },

    /// The area code could not be turned into a coordinate
    #[error("Geocoding failed for '{area}': {message}")]
    Geocode { area: String, message: String },

    /// The provider answered with a non-OK status
    #[error("Provider returned {status}: {message}")]
    Provider {
        status: String,
        message: String,
        transient: bool,
    },

    /// A provider call did not finish in time
    #[error("Provider call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a geocoding error.
    pub fn geocode(area: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Geocode {
            area: area.into(),
            message: message.to_string(),
        }
    }

    /// Create a provider status error.
    pub fn provider(status: impl Into<String>, message: impl Into<String>, transient: bool) -> Self {
        Self::Provider {
            status: status.into(),
            message: message.into(),
            transient,
        }
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Provider { transient, .. } => *transient,
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS
                    })
            }
            _ => false,
        }
    }

    /// Whether the error must end the whole run rather than a single tile.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Config(_)
                | Self::Validation(_)
                | Self::UnsupportedResolution { .. }
                | Self::TooDense { .. }
                | Self::Geocode { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_transience_follows_flag() {
        assert!(AppError::provider("OVER_QUERY_LIMIT", "slow down", true).is_transient());
        assert!(!AppError::provider("NOT_FOUND", "nope", false).is_transient());
    }

    #[test]
    fn timeouts_are_transient_but_not_fatal() {
        let err = AppError::Timeout { secs: 30 };
        assert!(err.is_transient());
        assert!(!err.is_fatal());
    }

    #[test]
    fn too_dense_is_fatal_and_names_the_tile() {
        let err = AppError::TooDense {
            center: Coordinate::new(37.5, -122.3),
            resolution: 11,
        };
        assert!(err.is_fatal());
        let message = err.to_string();
        assert!(message.contains("37.500000,-122.300000"));
        assert!(message.contains("resolution 11"));
    }

    #[test]
    fn config_errors_are_fatal() {
        assert!(AppError::config("API_KEY not set").is_fatal());
        assert!(!AppError::crawl("tile", "boom").is_fatal());
    }
}
