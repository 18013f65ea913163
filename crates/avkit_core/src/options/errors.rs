//! Error types for option parsing.

use thiserror::Error;

use crate::error_code;

/// Errors raised while parsing and resolving an engine command line.
#[derive(Error, Debug)]
pub enum OptionError {
    /// Malformed or contradictory argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// Option name not present in the option table.
    #[error("Unrecognized option '{0}'")]
    OptionNotFound(String),

    /// Encoder name unknown to the engine.
    #[error("Unknown encoder '{0}'")]
    EncoderNotFound(String),

    /// Decoder name unknown to the engine.
    #[error("Unknown decoder '{0}'")]
    DecoderNotFound(String),

    /// A referenced file does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request is valid but not supported (encoding data streams).
    #[error("{0}")]
    Unsupported(String),

    /// Help or listing output was produced; processing should stop cleanly.
    #[error("Immediate exit requested")]
    Exit,

    /// Opening an input file failed.
    #[error("Error opening input file {url}: {message}")]
    OpenInput { url: String, message: String, code: i32 },

    /// I/O error reading an auxiliary file.
    #[error("I/O error {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl OptionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
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
            OptionError::InvalidArgument(_) => error_code::EINVAL,
            OptionError::OptionNotFound(_) => error_code::OPTION_NOT_FOUND,
            OptionError::EncoderNotFound(_) => error_code::ENCODER_NOT_FOUND,
            OptionError::DecoderNotFound(_) => error_code::DECODER_NOT_FOUND,
            OptionError::NotFound(_) => error_code::ENOENT,
            OptionError::Unsupported(_) => error_code::ENOSYS,
            OptionError::Exit => error_code::EXIT,
            OptionError::OpenInput { code, .. } => *code,
            OptionError::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => error_code::ENOENT,
                std::io::ErrorKind::OutOfMemory => error_code::ENOMEM,
                _ => error_code::EIO,
            },
        }
    }

    /// `true` for the clean-exit signal raised by help and listing options.
    pub fn is_exit(&self) -> bool {
        matches!(self, OptionError::Exit)
    }
}

/// Result type for option parsing.
pub type OptionsResult<T> = Result<T, OptionError>;
