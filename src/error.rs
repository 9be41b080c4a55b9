//! Global error handling for mirrorsync
//!
//! This module provides a centralized error type that can represent errors
//! from every stage of a synchronization run.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Global error type for mirrorsync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// File system errors tied to a path
    #[error("{action} {}: {source}", .path.display())]
    Fs {
        /// What was being attempted
        action: &'static str,
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// File system errors without path context
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Errors surfaced while walking the source tree
    #[error("Traversal error: {0}")]
    Traversal(#[from] walkdir::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source path could not be mapped onto the destination tree
    #[error("Path mapping error: {0}")]
    PathMapping(String),

    /// The copy pipeline stopped accepting jobs
    #[error("Copy pipeline closed: {0}")]
    PipelineClosed(String),

    /// A copy worker panicked
    #[error("Worker error: {0}")]
    Worker(String),
}

impl SyncError {
    /// Wrap an I/O error with the action and path it came from
    pub fn fs(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Fs {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Specialized Result type for mirrorsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Creates a SyncError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::SyncError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

/// Extension trait for attaching path context to I/O results
pub trait IoResultExt<T> {
    /// Convert the error into [`SyncError::Fs`] for `path`
    fn at(self, action: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|e| SyncError::fs(action, path, e))
    }
}

// Allow converting SyncError to io::Error for callers working in io::Result
impl From<SyncError> for io::Error {
    fn from(err: SyncError) -> Self {
        io::Error::new(io::ErrorKind::Other, err.to_string())
    }
}
