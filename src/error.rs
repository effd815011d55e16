use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid thread URL '{url}': expected {expected}")]
    InvalidUrl { url: String, expected: String },

    #[error("unexpected HTTP status {status} for {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {timeout:?} waiting on {url}")]
    Timeout {
        url: String,
        timeout: std::time::Duration,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed thread metadata from {url}: {source}")]
    Metadata {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is a transient timeout that may be retried from the
    /// current offset.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout(),
            Self::Timeout { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_message_names_url_and_format() {
        let err = ArchiveError::InvalidUrl {
            url: "http://example.com".to_string(),
            expected: "http(s)://boards.4chan.org/<board>/thread/<number>".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("http://example.com"));
        assert!(msg.contains("/thread/<number>"));
    }

    #[test]
    fn test_is_transient() {
        let timed_out = ArchiveError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"),
        );
        assert!(timed_out.is_transient());

        let denied = ArchiveError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(!denied.is_transient());

        let stalled = ArchiveError::Timeout {
            url: "http://i.4cdn.org/g/1.png".to_string(),
            timeout: std::time::Duration::from_secs(15),
        };
        assert!(stalled.is_transient());

        let invalid = ArchiveError::InvalidUrl {
            url: String::new(),
            expected: String::new(),
        };
        assert!(!invalid.is_transient());
    }
}
