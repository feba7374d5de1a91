//! Error types for the download engine.
//!
//! Each variant carries enough context (URL, path, observed values) to emit a
//! useful structured log without re-deriving state at the call site.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while downloading one file.
///
/// Only transport-level failures ([`DownloadError::Request`] and
/// [`DownloadError::BodyRead`]) are retried; everything else is fatal to the
/// download that produced it.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request could not be sent or no response arrived (DNS failure,
    /// connection refused, TLS error, timeout).
    #[error("request to {url} failed: {source}")]
    Request {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body stream broke before the server finished sending.
    #[error("reading body from {url} failed after {bytes_read} bytes: {source}")]
    BodyRead {
        /// The URL being streamed.
        url: String,
        /// Bytes successfully written before the stream broke.
        bytes_read: i64,
        /// The underlying stream error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status other than 200 or 206.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response contradicted what we were told to expect. Never retried:
    /// the server would only tell us the same thing again.
    #[error("{reason}")]
    Validation {
        /// Human-readable description of the mismatch.
        reason: String,
    },

    /// A local filesystem operation failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The retry budget ran out; wraps the transport error that spent it.
    #[error("max retries ({retries}) exceeded: {source}")]
    MaxRetriesExceeded {
        /// Number of retries performed.
        retries: u32,
        /// The final transport error.
        #[source]
        source: Box<DownloadError>,
    },

    /// The download was cancelled cooperatively; nothing was published.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL that was being downloaded.
        url: String,
    },
}

impl DownloadError {
    /// Creates a request-transport error.
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            source,
        }
    }

    /// Creates a body-stream error.
    pub fn body_read(url: impl Into<String>, bytes_read: i64, source: reqwest::Error) -> Self {
        Self::BodyRead {
            url: url.into(),
            bytes_read,
            source,
        }
    }

    /// Creates an unexpected-status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a content-length mismatch validation error.
    pub fn size_mismatch(expected: i64, actual: i64) -> Self {
        Self::Validation {
            reason: format!("expected Content-Length to be {expected}, but is {actual}"),
        }
    }

    /// Creates a remaining-content-length mismatch validation error for a
    /// resumed request.
    pub fn remaining_size_mismatch(expected: i64, actual: i64) -> Self {
        Self::Validation {
            reason: format!("expected remaining Content-Length to be {expected}, but is {actual}"),
        }
    }

    /// Creates a final-size mismatch validation error.
    pub fn final_size_mismatch(expected: i64, actual: i64) -> Self {
        Self::Validation {
            reason: format!("expected final size to be {expected}, but is {actual}"),
        }
    }

    /// Creates a last-modified mismatch validation error.
    pub fn modified_mismatch(expected: DateTime<Utc>, actual: DateTime<Utc>) -> Self {
        Self::Validation {
            reason: format!("expected Last-Modified to be {expected}, but is {actual}"),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Returns true if the retry policy may recover this error.
    ///
    /// Only transport failures qualify; validation, status, IO, and
    /// cancellation errors would fail identically on a retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::BodyRead { .. })
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>` impls on purpose: every
// variant needs context (url, path, byte counts) the source errors lack, so
// callers go through the constructors above.
