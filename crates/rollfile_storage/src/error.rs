//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while operating on an append-only file.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A write failed after part of the data reached the file.
    #[error("short write: {written} of {len} bytes written: {source}")]
    ShortWrite {
        /// Bytes that were written before the failure.
        written: usize,
        /// Bytes that were requested.
        len: usize,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// Permission bits outside `0o7777` were requested.
    #[error("invalid file mode {0:#o}")]
    InvalidMode(u32),
}

impl StorageError {
    /// Returns how many bytes reached the file before the error.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        match self {
            Self::ShortWrite { written, .. } => *written,
            _ => 0,
        }
    }
}
