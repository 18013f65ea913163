//! Error types for the engine adapter.

use std::path::PathBuf;

use thiserror::Error;

use crate::error_code;
use crate::probe::ProbeError;

/// Errors raised while running the external engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine binary could not be started.
    #[error("Failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while talking to a running engine.
    #[error("I/O error {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine did not finish within the allowed time.
    #[error("Engine timed out after {0} ms")]
    Timeout(u64),
}

impl EngineError {
    pub fn spawn(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Engine error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            EngineError::Spawn { source, .. } | EngineError::Io { source, .. } => {
                match source.kind() {
                    std::io::ErrorKind::NotFound => error_code::ENOENT,
                    std::io::ErrorKind::OutOfMemory => error_code::ENOMEM,
                    _ => error_code::EIO,
                }
            }
            EngineError::Timeout(_) => error_code::EXIT,
        }
    }
}

impl From<EngineError> for ProbeError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Timeout(ms) => ProbeError::Timeout(ms),
            EngineError::Spawn { program, source } => ProbeError::Spawn {
                program: program.display().to_string(),
                source,
            },
            other => ProbeError::failed(other.code(), other.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
