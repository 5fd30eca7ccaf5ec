//! The rolling file writer.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{RetentionError, RollError, RollResult, RotationError};
use crate::naming::{Backup, BackupKey};
use crate::retention::Retention;
use rollfile_storage::AppendFile;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// An append-only file that rotates itself into timestamped backups.
///
/// Records are appended to the active file at `path`. When a record would
/// bring the active file to `max_bytes` or beyond, the file is first renamed
/// to `<path>.<YYYYMMDD-HHMMSS>.<n>` and a fresh file is created in its place.
/// After each rotation a background sweep deletes backups beyond
/// `max_backups` or older than `max_age`.
///
/// # Single writer
///
/// A `RollingFile` assumes it is the only writer of `path`. Writing requires
/// `&mut self`, so sharing one across threads needs an external lock, and
/// nothing guards against another process appending to the same file. The
/// byte count that drives rotation is kept in memory and goes stale if
/// someone else writes to the file.
///
/// # Shutdown
///
/// `close()` does not wait for background sweeps. Call
/// [`wait_for_cleanup`](Self::wait_for_cleanup) first if the backup set must
/// be settled before the process exits.
///
/// # Example
///
/// ```no_run
/// use rollfile_core::{Config, RollingFile};
/// use std::time::Duration;
///
/// let config = Config::new()
///     .max_bytes(10 * 1024 * 1024)
///     .max_backups(5)
///     .max_age(Duration::from_secs(7 * 24 * 3600));
/// let mut log = RollingFile::open("app.log", config).unwrap();
/// log.write(b"service started\n").unwrap();
/// log.close().unwrap();
/// ```
#[derive(Debug)]
pub struct RollingFile {
    path: PathBuf,
    /// `None` after `close()` or after a rotation that failed past step one.
    active: Option<AppendFile>,
    /// Bytes written to the active file since it was opened or rotated.
    size: u64,
    mode: u32,
    max_bytes: u64,
    utc: bool,
    closed: bool,
    clock: Arc<dyn Clock>,
    retention: Arc<Retention>,
}

impl RollingFile {
    /// Opens or creates the active file at `path`.
    ///
    /// The file is opened in append mode. An existing file keeps its content
    /// and its permission bits unless `config.mode` overrides them; the
    /// rotation threshold counts the bytes already in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the file cannot be
    /// opened.
    pub fn open(path: impl AsRef<Path>, config: Config) -> RollResult<Self> {
        Self::with_clock(path, config, Arc::new(SystemClock))
    }

    /// Like [`open`](Self::open), reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the file cannot be
    /// opened.
    pub fn with_clock(
        path: impl AsRef<Path>,
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> RollResult<Self> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        let file = AppendFile::open(&path, config.mode)?;
        let size = file.len()?;
        let retention = Arc::new(Retention::new(&path, &config, Arc::clone(&clock)));

        debug!(path = %path.display(), size, mode = file.mode(), "opened rolling file");

        Ok(Self {
            mode: file.mode(),
            path,
            active: Some(file),
            size,
            max_bytes: config.max_bytes,
            utc: config.utc,
            closed: false,
            clock,
            retention,
        })
    }

    /// Appends one record, rotating first if it would fill the active file.
    ///
    /// Returns the number of bytes written, which is the record length on
    /// success. An empty record is a no-op.
    ///
    /// # Errors
    ///
    /// - [`RollError::OversizeRecord`] if the record alone is larger than
    ///   `max_bytes`; nothing is written.
    /// - [`RollError::Rotation`] if a needed rotation failed; the record is
    ///   not written and the next call retries the rotation.
    /// - [`RollError::Closed`] after [`close`](Self::close).
    /// - [`RollError::Storage`] if the write itself failed.
    pub fn write(&mut self, record: &[u8]) -> RollResult<usize> {
        if record.is_empty() {
            return Ok(0);
        }
        if self.closed {
            return Err(RollError::Closed);
        }

        let len = record.len() as u64;
        if self.max_bytes > 0 && len > self.max_bytes {
            return Err(RollError::OversizeRecord {
                len,
                max: self.max_bytes,
            });
        }

        if self.needs_rotation(len) {
            self.rotate().map_err(|source| RollError::Rotation {
                path: self.path.clone(),
                source,
            })?;
        }

        let Some(file) = self.active.as_mut() else {
            return Err(RollError::Closed);
        };
        match file.append(record) {
            Ok(written) => {
                self.size += written as u64;
                Ok(written)
            }
            Err(err) => {
                self.size += err.bytes_written() as u64;
                Err(err.into())
            }
        }
    }

    fn needs_rotation(&self, len: u64) -> bool {
        if self.active.is_none() {
            return true;
        }
        self.max_bytes > 0 && self.size + len >= self.max_bytes
    }

    /// Close, rename to a free backup name, reopen, then schedule retention.
    ///
    /// Steps are not rolled back. A failure before the rename leaves the full
    /// file at `path`; a failure after it leaves the backup in place and no
    /// active handle.
    fn rotate(&mut self) -> Result<(), RotationError> {
        if let Some(file) = self.active.take() {
            file.close().map_err(RotationError::Close)?;
        }

        match fs::symlink_metadata(&self.path) {
            Ok(_) => {
                let backup = self.free_backup_path()?;
                fs::rename(&self.path, &backup).map_err(|source| RotationError::Rename {
                    from: self.path.clone(),
                    to: backup.clone(),
                    source,
                })?;
                debug!(path = %self.path.display(), backup = %backup.display(), size = self.size, "rotated file");
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "active file already moved away, reopening");
            }
            Err(source) => {
                return Err(RotationError::Probe {
                    path: self.path.clone(),
                    source,
                })
            }
        }

        let file = AppendFile::create(&self.path, self.mode).map_err(RotationError::Reopen)?;
        self.active = Some(file);
        self.size = 0;

        self.retention.schedule();
        Ok(())
    }

    /// Returns the first free `<path>.<now>.<n>` with `n` above every
    /// sequence already used in that second.
    ///
    /// Sequence numbers freed by retention are not reused, so the newest
    /// backup always carries the greatest key.
    fn free_backup_path(&self) -> Result<PathBuf, RotationError> {
        let first = BackupKey::at(self.clock.now(), self.utc);
        let last = self
            .retention
            .last_sequence(first.timestamp())
            .map_err(RotationError::Scan)?;
        let mut key = match last {
            Some(sequence) => BackupKey::new(first.timestamp(), sequence)
                .next()
                .ok_or_else(|| exhausted(first.backup_path(&self.path)))?,
            None => first,
        };
        loop {
            let candidate = key.backup_path(&self.path);
            match fs::symlink_metadata(&candidate) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(candidate),
                Err(source) => {
                    return Err(RotationError::Probe {
                        path: candidate,
                        source,
                    })
                }
                Ok(_) => {
                    trace!(taken = %candidate.display(), "backup name in use");
                    key = key.next().ok_or_else(|| exhausted(candidate))?;
                }
            }
        }
    }

    /// Closes the active file.
    ///
    /// Later writes fail with [`RollError::Closed`]. Closing twice is a
    /// no-op. Background sweeps keep running.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&mut self) -> RollResult<()> {
        self.closed = true;
        if let Some(file) = self.active.take() {
            file.close()?;
            debug!(path = %self.path.display(), "closed rolling file");
        }
        Ok(())
    }

    /// Syncs the active file to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the sync fails.
    pub fn sync(&self) -> RollResult<()> {
        if self.closed {
            return Err(RollError::Closed);
        }
        if let Some(file) = &self.active {
            file.sync()?;
        }
        Ok(())
    }

    /// Pushes written data to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the flush fails.
    pub fn flush(&mut self) -> RollResult<()> {
        if self.closed {
            return Err(RollError::Closed);
        }
        if let Some(file) = self.active.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    /// Path of the active file.
    #[must_use]
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the active file since it was opened or rotated.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Backups of the active file currently on disk, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn backups(&self) -> Result<Vec<Backup>, RetentionError> {
        self.retention.backups()
    }

    /// Blocks until every retention sweep scheduled so far has finished.
    pub fn wait_for_cleanup(&self) {
        self.retention.wait_idle();
    }

    /// The retention policy shared with background sweeps.
    #[must_use]
    pub fn retention(&self) -> &Arc<Retention> {
        &self.retention
    }
}

fn exhausted(path: PathBuf) -> RotationError {
    RotationError::Probe {
        path,
        source: io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free backup sequence number left",
        ),
    }
}

impl io::Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RollingFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        RollingFile::flush(self).map_err(io::Error::from)
    }
}
