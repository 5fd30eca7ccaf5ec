//! Error types for rollfile core.

use rollfile_storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for rolling file operations.
pub type RollResult<T> = Result<T, RollError>;

/// Errors returned to the caller of a rolling file operation.
#[derive(Debug, Error)]
pub enum RollError {
    /// Error on the active file handle.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The record alone is larger than the rotation threshold.
    #[error("record of {len} bytes exceeds maximum file size of {max} bytes")]
    OversizeRecord {
        /// Length of the rejected record.
        len: u64,
        /// Configured rotation threshold.
        max: u64,
    },

    /// Rotation failed, so the record was not written.
    #[error("failed to rotate {}: {source}", path.display())]
    Rotation {
        /// The active file path.
        path: PathBuf,
        /// The step that failed.
        #[source]
        source: RotationError,
    },

    /// The rolling file was closed.
    #[error("rolling file is closed")]
    Closed,

    /// The configuration was rejected.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl RollError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this error came from a failed rotation.
    #[must_use]
    pub fn is_rotation(&self) -> bool {
        matches!(self, Self::Rotation { .. })
    }
}

impl From<RollError> for io::Error {
    fn from(err: RollError) -> Self {
        let kind = match &err {
            RollError::OversizeRecord { .. } | RollError::InvalidConfig { .. } => {
                io::ErrorKind::InvalidInput
            }
            RollError::Closed => io::ErrorKind::BrokenPipe,
            RollError::Storage(StorageError::Io(e)) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// The rotation step that failed.
#[derive(Debug, Error)]
pub enum RotationError {
    /// Closing the full file failed.
    #[error("failed to close file before rotation: {0}")]
    Close(#[source] StorageError),

    /// Listing the backups already on disk failed.
    #[error("failed to list existing backups: {0}")]
    Scan(#[source] RetentionError),

    /// Checking whether a path is taken failed.
    #[error("failed to probe {}: {source}", path.display())]
    Probe {
        /// The path being checked.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// Renaming the full file to its backup name failed.
    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        /// The active file path.
        from: PathBuf,
        /// The chosen backup path.
        to: PathBuf,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// Creating the fresh active file failed.
    #[error("failed to create new file after rotation: {0}")]
    Reopen(#[source] StorageError),
}

/// Problems found while enforcing retention.
///
/// These never reach a writer. They are handed to the configured
/// [`CleanupErrorHandler`](crate::CleanupErrorHandler).
#[derive(Debug, Error)]
pub enum RetentionError {
    /// The directory holding the backups could not be listed.
    #[error("failed to list backup files in {}: {source}", dir.display())]
    List {
        /// The directory that was listed.
        dir: PathBuf,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// A file matched the backup prefix but its suffix is not a backup key.
    #[error("unrecognized backup file name {}", path.display())]
    UnrecognizedBackup {
        /// The offending path.
        path: PathBuf,
    },

    /// The embedded timestamp does not map to a point in time.
    #[error("cannot resolve timestamp of backup {}: {reason}", path.display())]
    Timestamp {
        /// The backup path.
        path: PathBuf,
        /// Why the timestamp was rejected.
        reason: String,
    },

    /// A backup could not be deleted.
    #[error("failed to remove backup file {}: {source}", path.display())]
    Remove {
        /// The backup path.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// The background sweep thread could not be started.
    #[error("failed to spawn cleanup thread: {0}")]
    Spawn(#[source] io::Error),
}
