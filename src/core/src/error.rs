use std::path::PathBuf;

use thiserror::Error;

/// A3S Pull error types
#[derive(Error, Debug)]
pub enum PullError {
    /// Malformed image reference
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Digest that cannot be used as a content identity or file name
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    /// Manifest lacks metadata required to derive a store location
    #[error("Missing annotation: {0}")]
    MissingAnnotation(String),

    /// Annotation value that cannot be used as a path component
    #[error("Invalid annotation: {key}={value:?}")]
    InvalidAnnotation { key: String, value: String },

    /// Path exists but is not a directory
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Directory setting did not take effect
    #[error("Directory not set: {0}")]
    Unset(String),

    /// Directories were already fixed by locating the store
    #[error("Directories are fixed once the store has been located")]
    DirectoriesFixed,

    /// Registry fetch of a blob failed
    #[error("Fetch failed: {digest} - {message}")]
    FetchFailed { digest: String, message: String },

    /// Fetched stream produced no bytes
    #[error("Short write: no bytes staged for {digest}")]
    ShortWrite { digest: String },

    /// Staged content does not hash to its digest
    #[error("Digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Registry reported a missing resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// Promotion of a staged item into the store failed
    #[error("Commit failed: {digest} -> {}", .path.display())]
    CommitFailed { digest: String, path: PathBuf },

    /// Container registry error
    #[error("Registry error: {registry} - {message}")]
    RegistryError { registry: String, message: String },

    /// Timeout error
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PullError {
    /// Whether the registry reported the requested resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PullError::NotFound(_))
    }
}

impl From<serde_json::Error> for PullError {
    fn from(err: serde_json::Error) -> Self {
        PullError::SerializationError(err.to_string())
    }
}

/// Result type alias for A3S Pull operations
pub type Result<T> = std::result::Result<T, PullError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_annotation_display() {
        let error = PullError::MissingAnnotation("loc".to_string());
        assert_eq!(error.to_string(), "Missing annotation: loc");
    }

    #[test]
    fn test_invalid_annotation_display() {
        let error = PullError::InvalidAnnotation {
            key: "namespace".to_string(),
            value: "../etc".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid annotation: namespace=\"../etc\"");
    }

    #[test]
    fn test_not_a_directory_display() {
        let error = PullError::NotADirectory(PathBuf::from("/tmp/file.txt"));
        assert_eq!(error.to_string(), "Not a directory: /tmp/file.txt");
    }

    #[test]
    fn test_fetch_failed_display() {
        let error = PullError::FetchFailed {
            digest: "sha256:aaa".to_string(),
            message: "connection reset".to_string(),
        };
        assert_eq!(error.to_string(), "Fetch failed: sha256:aaa - connection reset");
    }

    #[test]
    fn test_short_write_display() {
        let error = PullError::ShortWrite {
            digest: "sha256:bbb".to_string(),
        };
        assert_eq!(error.to_string(), "Short write: no bytes staged for sha256:bbb");
    }

    #[test]
    fn test_commit_failed_display() {
        let error = PullError::CommitFailed {
            digest: "sha256:ccc".to_string(),
            path: PathBuf::from("/store/sha256:ccc"),
        };
        assert_eq!(
            error.to_string(),
            "Commit failed: sha256:ccc -> /store/sha256:ccc"
        );
    }

    #[test]
    fn test_registry_error_display() {
        let error = PullError::RegistryError {
            registry: "ghcr.io".to_string(),
            message: "unauthorized".to_string(),
        };
        assert_eq!(error.to_string(), "Registry error: ghcr.io - unauthorized");
    }

    #[test]
    fn test_is_not_found() {
        assert!(PullError::NotFound("referrers".to_string()).is_not_found());
        assert!(!PullError::Other("HTTP 404".to_string()).is_not_found());
        assert!(!PullError::RegistryError {
            registry: "ghcr.io".to_string(),
            message: "404".to_string(),
        }
        .is_not_found());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: PullError = io_error.into();
        assert!(matches!(error, PullError::IoError(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: PullError = json_error.into();
        assert!(matches!(error, PullError::SerializationError(_)));
    }
}
