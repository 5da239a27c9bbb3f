//! Error handling and custom error types
//!
//! Every failure the converter can report is a variant of [`Error`]. Each
//! variant carries the context a caller needs to react to it, and
//! [`Error::code`] exposes a stable machine-readable identifier.

use std::path::PathBuf;
use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{message}")]
    InvalidInput {
        message: String,
        received_type: String,
    },

    #[error("Unsupported format: {format}. Supported formats: {}", supported.join(", "))]
    UnsupportedFormat {
        format: String,
        supported: Vec<String>,
    },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Invalid option \"{option}\": expected {expected}, received {value}")]
    InvalidOptions {
        option: String,
        value: serde_json::Value,
        expected: String,
    },

    #[error("{message}")]
    ConversionFailed {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of [`Error`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UnsupportedFormat,
    FileNotFound,
    InvalidOptions,
    ConversionFailed,
    Io,
}

impl Error {
    pub fn invalid_input(message: impl Into<String>, received_type: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            received_type: received_type.into(),
        }
    }

    pub fn unsupported_format<S: AsRef<str>>(format: impl Into<String>, supported: &[S]) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            supported: supported.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn invalid_options(
        option: impl Into<String>,
        value: impl Into<serde_json::Value>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidOptions {
            option: option.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// A conversion failure with no underlying cause.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::ConversionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// A conversion failure wrapping the collaborator error that caused it.
    pub fn conversion_with_source(
        message: impl Into<String>,
        source: impl Into<BoxedCause>,
    ) -> Self {
        Self::ConversionFailed {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput { .. } => ErrorKind::InvalidInput,
            Error::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Error::FileNotFound { .. } => ErrorKind::FileNotFound,
            Error::InvalidOptions { .. } => ErrorKind::InvalidOptions,
            Error::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorKind::FileNotFound => "FILE_NOT_FOUND",
            ErrorKind::InvalidOptions => "INVALID_OPTIONS",
            ErrorKind::ConversionFailed => "CONVERSION_FAILED",
            ErrorKind::Io => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
