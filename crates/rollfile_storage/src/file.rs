//! Append-only file handle.

use crate::error::{StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Permission bits used when creating a file that did not exist before.
pub const DEFAULT_MODE: u32 = 0o644;

/// Highest value accepted as permission bits (setuid, setgid, sticky, rwx).
const MODE_MASK: u32 = 0o7777;

/// An open file that only ever grows at its end.
///
/// The handle is opened with `O_APPEND`, so every write lands at the current
/// end of the file even if something else extended it in the meantime.
///
/// # Durability
///
/// - `flush()` pushes data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// Nothing is synced implicitly, including on `close()`.
///
/// # Example
///
/// ```no_run
/// use rollfile_storage::AppendFile;
/// use std::path::Path;
///
/// let mut file = AppendFile::create(Path::new("events.log"), 0o600).unwrap();
/// file.append(b"started\n").unwrap();
/// file.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct AppendFile {
    path: PathBuf,
    file: File,
    mode: u32,
}

impl AppendFile {
    /// Opens or creates the file at `path` in append mode.
    ///
    /// With `mode` set to `None`, an existing file's permission bits are
    /// inherited and a new file gets [`DEFAULT_MODE`]. The resolved mode is
    /// remembered so that later files created for the same path (after a
    /// rotation) get the same bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode is invalid or the file cannot be opened.
    pub fn open(path: &Path, mode: Option<u32>) -> StorageResult<Self> {
        let mode = match mode {
            Some(mode) => mode,
            None => inherited_mode(path)?.unwrap_or(DEFAULT_MODE),
        };
        Self::create(path, mode)
    }

    /// Opens or creates the file at `path` in append mode with explicit
    /// permission bits.
    ///
    /// The bits only take effect when the file is created, and are subject to
    /// the process umask. They are ignored on non-unix platforms.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode is invalid or the file cannot be opened.
    pub fn create(path: &Path, mode: u32) -> StorageResult<Self> {
        if mode & !MODE_MASK != 0 {
            return Err(StorageError::InvalidMode(mode));
        }

        let mut options = OpenOptions::new();
        options.read(true).append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        let file = options.open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mode,
        })
    }

    /// Returns the path this handle was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the permission bits used when the file was opened.
    #[must_use]
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Returns the current on-disk length of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn len(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Returns true if the file is currently empty on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Appends `data` to the end of the file.
    ///
    /// Returns the number of bytes written, which is always `data.len()` on
    /// success. If the OS stops accepting data part way through, the error is
    /// a [`StorageError::ShortWrite`] carrying the count that did land.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails.
    pub fn append(&mut self, data: &[u8]) -> StorageResult<usize> {
        let len = data.len();
        let mut written = 0;

        while written < len {
            match self.file.write(&data[written..]) {
                Ok(0) => {
                    return Err(StorageError::ShortWrite {
                        written,
                        len,
                        source: io::Error::new(io::ErrorKind::WriteZero, "file accepted no bytes"),
                    });
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if written == 0 => return Err(StorageError::Io(e)),
                Err(source) => {
                    return Err(StorageError::ShortWrite {
                        written,
                        len,
                        source,
                    });
                }
            }
        }

        Ok(written)
    }

    /// Pushes buffered data to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Syncs data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    pub fn sync(&self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Flushes and closes the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails. The handle is released
    /// either way.
    pub fn close(mut self) -> StorageResult<()> {
        let flushed = self.file.flush();
        drop(self.file);
        flushed?;
        Ok(())
    }
}

/// Returns the permission bits of an existing file, or `None` if there is no
/// file at `path` (or the platform has no unix permissions).
///
/// # Errors
///
/// Returns an error if the file exists but its metadata cannot be read.
pub fn inherited_mode(path: &Path) -> StorageResult<Option<u32>> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Ok(Some(metadata.permissions().mode() & MODE_MASK))
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");

        let file = AppendFile::open(&path, None).unwrap();
        assert!(path.exists());
        assert_eq!(file.len().unwrap(), 0);
        assert!(file.is_empty().unwrap());
        assert_eq!(file.mode(), DEFAULT_MODE);
        assert_eq!(file.path(), path);
    }

    #[test]
    fn append_returns_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");

        let mut file = AppendFile::open(&path, None).unwrap();
        assert_eq!(file.append(b"hello").unwrap(), 5);
        assert_eq!(file.append(b" world").unwrap(), 6);
        file.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn reopen_appends_instead_of_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");

        {
            let mut file = AppendFile::open(&path, None).unwrap();
            file.append(b"first\n").unwrap();
            file.close().unwrap();
        }

        let mut file = AppendFile::open(&path, None).unwrap();
        assert_eq!(file.len().unwrap(), 6);
        file.append(b"second\n").unwrap();
        file.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"first\nsecond\n");
    }

    #[test]
    fn invalid_mode_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");

        let result = AppendFile::create(&path, 0o10000);
        assert!(matches!(result, Err(StorageError::InvalidMode(0o10000))));
        assert!(!path.exists());
    }

    #[test]
    fn inherited_mode_missing_file() {
        let dir = tempdir().unwrap();
        assert_eq!(inherited_mode(&dir.path().join("nope.log")).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn explicit_mode_applied_on_create() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("secret.log");

        let file = AppendFile::create(&path, 0o600).unwrap();
        assert_eq!(file.mode(), 0o600);
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn existing_mode_is_inherited() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let file = AppendFile::open(&path, None).unwrap();
        assert_eq!(file.mode(), 0o600);
        assert_eq!(inherited_mode(&path).unwrap(), Some(0o600));
    }

    #[test]
    fn flush_and_sync() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");

        let mut file = AppendFile::open(&path, None).unwrap();
        file.append(b"data").unwrap();

        assert!(file.flush().is_ok());
        assert!(file.sync().is_ok());
    }

    #[test]
    fn bytes_written_only_for_short_writes() {
        let err = StorageError::ShortWrite {
            written: 3,
            len: 8,
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(err.bytes_written(), 3);

        let err = StorageError::Io(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.bytes_written(), 0);
    }
}
