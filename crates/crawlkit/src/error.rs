//! Error types for CrawlKit

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while acquiring a single target
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The request itself is malformed (empty target, empty keyword)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No provider matches the target
    #[error("Unsupported target: {target}")]
    Unsupported { target: String },

    /// Platform needs an authenticated session and none is available
    #[error("Login required for platform {platform}")]
    AuthRequired { platform: String },

    /// Rendering (primary state) failed
    #[error("Render failed: {0}")]
    RenderFailed(String),

    /// Both the primary and the degraded state failed
    #[error("Extraction failed (primary: {primary}; degraded: {degraded})")]
    ExtractionFailed { primary: String, degraded: String },

    /// Some media assets were skipped
    #[error("{failed} of {total} media assets were skipped")]
    MediaPartialFailure { failed: usize, total: usize },

    /// Durable cache backend is unavailable, in-memory fallback in use
    #[error("Cache backend degraded: {0}")]
    CacheBackendDegraded(String),

    /// Filesystem failure while persisting a record
    #[error("Storage I/O error at {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetch exceeded its overall time budget
    #[error("Fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl CrawlError {
    /// Wrap an I/O error with the path it happened on
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::StorageIo {
            path: path.into(),
            source,
        }
    }

    /// Stable discriminant for result reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrawlError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            CrawlError::Unsupported { .. } => ErrorKind::Unsupported,
            CrawlError::AuthRequired { .. } => ErrorKind::AuthRequired,
            CrawlError::RenderFailed(_) => ErrorKind::RenderFailed,
            CrawlError::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            CrawlError::MediaPartialFailure { .. } => ErrorKind::MediaPartialFailure,
            CrawlError::CacheBackendDegraded(_) => ErrorKind::CacheBackendDegraded,
            CrawlError::StorageIo { .. } => ErrorKind::StorageIoError,
            CrawlError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Inspectable failure category carried in results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Unsupported,
    AuthRequired,
    RenderFailed,
    ExtractionFailed,
    MediaPartialFailure,
    CacheBackendDegraded,
    StorageIoError,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::RenderFailed => "render_failed",
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::MediaPartialFailure => "media_partial_failure",
            ErrorKind::CacheBackendDegraded => "cache_backend_degraded",
            ErrorKind::StorageIoError => "storage_io_error",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by a [`Renderer`](crate::render::Renderer)
#[derive(Debug, Error)]
pub enum RenderError {
    /// No browser backend is available
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    /// Page did not finish rendering in time
    #[error("Render timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Navigation or script failure
    #[error("Render failed: {0}")]
    Failed(String),
}

/// Errors from the degraded (plain HTTP) page fetch
#[derive(Debug, Error)]
pub enum PageError {
    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Failed to connect to server
    #[error("Failed to connect to server")]
    Connect(#[source] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Other request error
    #[error("Request failed: {0}")]
    Request(String),
}

impl PageError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PageError::Timeout
        } else if err.is_connect() {
            PageError::Connect(err)
        } else {
            PageError::Request(err.to_string())
        }
    }
}

/// Errors from a cache backend
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend could not be reached or the command failed in transit
    #[error("Cache backend unreachable: {0}")]
    Connection(String),

    /// Stored value could not be encoded or decoded
    #[error("Cache value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CrawlError::Unsupported {
                target: "ftp://x".to_string()
            }
            .to_string(),
            "Unsupported target: ftp://x"
        );
        assert_eq!(
            CrawlError::ExtractionFailed {
                primary: "renderer unavailable".to_string(),
                degraded: "no body".to_string(),
            }
            .to_string(),
            "Extraction failed (primary: renderer unavailable; degraded: no body)"
        );
        assert_eq!(
            CrawlError::Timeout(Duration::from_secs(5)).to_string(),
            "Fetch timed out after 5s"
        );
        assert_eq!(
            CrawlError::MediaPartialFailure {
                failed: 1,
                total: 3
            }
            .to_string(),
            "1 of 3 media assets were skipped"
        );
    }

    #[test]
    fn test_error_kinds() {
        let err = CrawlError::storage(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::StorageIoError);
        assert!(err.to_string().contains("/tmp/x"));
        assert_eq!(
            CrawlError::RenderFailed("x".into()).kind(),
            ErrorKind::RenderFailed
        );
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::ExtractionFailed).unwrap();
        assert_eq!(json, "\"extraction_failed\"");
        assert_eq!(ErrorKind::StorageIoError.to_string(), "storage_io_error");
    }
}
