//! Error taxonomy shared by the indexing and retrieval paths.
//!
//! | Error | Raised by | Policy |
//! |-------|-----------|--------|
//! | [`GatewayError`] | embedding / answer calls | aborts an indexing pass; degrades to a fallback answer |
//! | [`FilesystemError`] | scanner, source loader | skip the file; abort the pass if it is the root |
//! | [`ConsistencyViolation`] | reconciler | caller contract broken, fail fast |

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a call to the remote embedding / answer provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider could not be reached, or the request timed out.
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The provider answered with a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body did not match the expected schema.
    #[error("malformed response from {endpoint}: {message}")]
    Parse { endpoint: String, message: String },
}

impl GatewayError {
    pub fn parse(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub fn transport(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// HTTP 429, 5xx, and transport failures may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Parse { .. } => false,
        }
    }
}

/// A path that could not be read.
#[derive(Debug, Error)]
#[error("cannot read {}: {source}", path.display())]
pub struct FilesystemError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl FilesystemError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Malformed input handed to the reconciler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsistencyViolation {
    #[error("path appears more than once in the current scan: {0}")]
    DuplicatePath(String),

    #[error("path is held by more than one index entry: {0}")]
    DuplicateIndexedPath(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let status = |s| GatewayError::Status {
            endpoint: "/qa".into(),
            status: s,
            body: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(GatewayError::transport("/qa", "refused").is_retryable());
        assert!(!GatewayError::parse("/qa", "bad json").is_retryable());
    }

    #[test]
    fn test_filesystem_error_names_path() {
        let err = FilesystemError::new(
            "notes/a.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("notes/a.md"));
    }
}
