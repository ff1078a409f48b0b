//! Error types for is3-core
//!
//! Provides a unified error type covering input validation, preflight checks
//! and per-object transfer failures, convertible to process exit codes.

use thiserror::Error;

/// Result type alias for is3-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for is3-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// S3 URL does not match `s3://BUCKET[/KEY]`
    #[error("Cannot parse S3 URL: {0}")]
    InvalidUrl(String),

    /// S3 bucket name fails the naming rules
    #[error("Invalid S3 bucket name: {0}")]
    InvalidBucketName(String),

    /// Destination key contains forbidden special characters
    #[error("S3 key contains special characters: {0}")]
    RejectedKeyCharacters(String),

    /// iRODS source path is not absolute
    #[error("iRODS path must be absolute: {0}")]
    SourceNotAbsolute(String),

    /// iRODS object or collection does not exist
    #[error("iRODS object doesn't exist: {0}")]
    SourceNotFound(String),

    /// Collection encountered without the recursive flag
    #[error("iRODS object is a collection (use --recursive): {0}")]
    CannotDescend(String),

    /// Destination bucket does not exist and auto-creation is disabled
    #[error("S3 bucket doesn't exist (use --make-bucket): {0}")]
    BucketMissing(String),

    /// Forced overwrite deleted the destination but the replacement upload
    /// failed, leaving no object at the key
    #[error("Destination {url} was deleted but not replaced: {cause}")]
    DeletedNotReplaced {
        url: String,
        #[source]
        cause: Box<Error>,
    },

    /// Missing or malformed iRODS/S3 configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication or permission failure
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network or remote-service error
    #[error("Network error: {0}")]
    Network(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidUrl(_)
            | Error::InvalidBucketName(_)
            | Error::RejectedKeyCharacters(_)
            | Error::SourceNotAbsolute(_)
            | Error::CannotDescend(_)
            | Error::Config(_)
            | Error::Json(_) => 2, // UsageError
            Error::Network(_) | Error::DeletedNotReplaced { .. } => 3, // NetworkError
            Error::Auth(_) => 4,                                      // AuthError
            Error::SourceNotFound(_) | Error::BucketMissing(_) => 5,  // NotFound
            _ => 1,                                                   // GeneralError
        }
    }

    /// Whether this error indicates a condition that would fail every
    /// remaining leaf the same way, so the run should abort rather than
    /// retry it per object
    pub const fn is_systemic(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidUrl("x".into()).exit_code(), 2);
        assert_eq!(Error::InvalidBucketName("x".into()).exit_code(), 2);
        assert_eq!(Error::RejectedKeyCharacters("x".into()).exit_code(), 2);
        assert_eq!(Error::SourceNotAbsolute("x".into()).exit_code(), 2);
        assert_eq!(Error::CannotDescend("x".into()).exit_code(), 2);
        assert_eq!(Error::Network("x".into()).exit_code(), 3);
        assert_eq!(Error::Auth("x".into()).exit_code(), 4);
        assert_eq!(Error::SourceNotFound("x".into()).exit_code(), 5);
        assert_eq!(Error::BucketMissing("x".into()).exit_code(), 5);
        assert_eq!(Error::General("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_systemic_errors_abort_the_run() {
        assert!(Error::Auth("expired token".into()).is_systemic());
        assert!(Error::Config("no credentials".into()).is_systemic());
        assert!(!Error::Network("timeout".into()).is_systemic());
        assert!(!Error::SourceNotFound("/zone/x".into()).is_systemic());
    }

    #[test]
    fn test_deleted_not_replaced_display() {
        let err = Error::DeletedNotReplaced {
            url: "s3://bucket/key".into(),
            cause: Box::new(Error::Network("connection reset".into())),
        };
        let display = err.to_string();
        assert!(display.contains("s3://bucket/key"));
        assert!(display.contains("deleted but not replaced"));
    }
}
