//! Error types for shellbox-core

use crate::types::SessionId;
use std::path::PathBuf;
use thiserror::Error;

/// Caller-facing classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown session id
    NotFound,
    /// Caller-correctable request problem
    BadRequest,
    /// Spawn, IO or other unexpected failure
    Internal,
}

/// Session manager error type
#[derive(Debug, Error)]
pub enum Error {
    /// Session not found
    #[error("shell session not found: {0}")]
    SessionNotFound(SessionId),

    /// Working directory missing or not a directory
    #[error("working directory does not exist: {}", .0.display())]
    InvalidDirectory(PathBuf),

    /// The session's process has already exited
    #[error("process in session {0} has already exited")]
    ProcessExited(SessionId),

    /// Waiting for a process timed out
    #[error("timed out after {secs}s waiting for process")]
    Timeout {
        /// The bound that elapsed
        secs: u64,
    },

    /// Process could not be spawned
    #[error("failed to spawn `{command}` in session {session_id}: {source}")]
    Spawn {
        /// Session the command was issued under
        session_id: SessionId,
        /// The command line
        command: String,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// IO failure while talking to a process
    #[error("io error in session {session_id}: {source}")]
    Io {
        /// Session the failure belongs to
        session_id: SessionId,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an internal error
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify the error for the caller.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) => ErrorKind::NotFound,
            Self::InvalidDirectory(_)
            | Self::ProcessExited(_)
            | Self::Timeout { .. }
            | Self::InvalidConfig(_) => ErrorKind::BadRequest,
            Self::Spawn { .. } | Self::Io { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::InvalidDirectory(_) => "invalid_directory",
            Self::ProcessExited(_) => "process_exited",
            Self::Timeout { .. } => "timeout",
            Self::Spawn { .. } => "spawn_failed",
            Self::Io { .. } => "io_error",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to hand back to a caller. Internal details stay in logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error, please try again later".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let id = SessionId::from("abc");
        assert_eq!(Error::SessionNotFound(id.clone()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::ProcessExited(id).kind(), ErrorKind::BadRequest);
        assert_eq!(Error::Timeout { secs: 3 }.kind(), ErrorKind::BadRequest);
        assert_eq!(
            Error::InvalidDirectory(PathBuf::from("/nope")).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(Error::internal("boom").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Timeout { secs: 1 }.code(), "timeout");
        assert_eq!(
            Error::SessionNotFound(SessionId::from("x")).code(),
            "session_not_found"
        );
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = Error::Spawn {
            session_id: SessionId::from("s1"),
            command: "secret-tool --token abc".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("secret-tool"));
        assert!(!err.user_message().contains("secret-tool"));

        let err = Error::SessionNotFound(SessionId::from("s1"));
        assert!(err.user_message().contains("s1"));
    }
}
