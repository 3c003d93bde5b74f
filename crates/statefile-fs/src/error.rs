//! Error types for statefile-fs

use std::path::PathBuf;
use std::time::Duration;

/// Result type for statefile-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in statefile-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Timed out after {waited:?} waiting for exclusive lock on {path}")]
    Timeout { path: PathBuf, waited: Duration },

    #[error("No such file or directory: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied at {path}: {source}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Failed to parse {format} settings at {path}: {message}")]
    SettingsParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Failed to serialize {format} settings for {path}: {message}")]
    SettingsSerialize {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported settings format: {extension}")]
    UnsupportedFormat { extension: String },
}

/// Flat error category, for callers that only branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    NotFound,
    PermissionDenied,
    Io,
    InvalidArgument,
    Settings,
}

impl Error {
    /// Classify an I/O error raised while operating on `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::Io { path, source },
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Io { .. } => ErrorKind::Io,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::SettingsParse { .. }
            | Self::SettingsSerialize { .. }
            | Self::UnsupportedFormat { .. } => ErrorKind::Settings,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
