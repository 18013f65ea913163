//! Error types for session management.

use thiserror::Error;

use crate::error_code;

/// Errors raised by the session registry and its helpers.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Session {0} not found")]
    NotFound(i64),

    /// Writing fontconfig configuration failed.
    #[error("I/O error {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            SessionError::InvalidArgument(_) => error_code::EINVAL,
            SessionError::NotFound(_) => error_code::ENOENT,
            SessionError::Io { .. } => error_code::EIO,
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
