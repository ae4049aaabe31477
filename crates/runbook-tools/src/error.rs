//! Executor error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised inside an executor before they are folded into a
/// [`BlockResult`](crate::BlockResult).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Process spawn or wait error.
    #[error("Process error: {0}")]
    Process(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// SSH transport or protocol error.
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Private key could not be loaded.
    #[error("Failed to load SSH key: {0}")]
    Key(String),

    /// Secret resolution error.
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecutorError {
    fn from(e: std::io::Error) -> Self {
        ExecutorError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for ExecutorError {
    fn from(e: reqwest::Error) -> Self {
        ExecutorError::Http(e.to_string())
    }
}

impl From<russh::Error> for ExecutorError {
    fn from(e: russh::Error) -> Self {
        ExecutorError::Ssh(e.to_string())
    }
}

/// Errors that can occur while resolving a credential secret.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The secret could not be decrypted (missing or wrong key, tampered data).
    #[error("Failed to decrypt credential {id}: {reason}")]
    Decryption { id: Uuid, reason: String },

    /// The credential store could not be read.
    #[error("Credential store error: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExecutorError::Configuration("missing url".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing url");

        let err = ExecutorError::Key("bad pem".to_string());
        assert_eq!(err.to_string(), "Failed to load SSH key: bad pem");
    }

    #[test]
    fn test_secret_error_is_transparent() {
        let id = Uuid::nil();
        let err: ExecutorError = SecretError::Decryption {
            id,
            reason: "bad tag".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            format!("Failed to decrypt credential {id}: bad tag")
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "sh not found");
        let err: ExecutorError = io_err.into();
        assert!(matches!(err, ExecutorError::Io(_)));
    }
}
