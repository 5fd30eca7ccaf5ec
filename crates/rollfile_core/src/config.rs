//! Rolling file configuration.

use crate::error::{RetentionError, RollError, RollResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Receives retention problems that cannot be returned to a writer.
///
/// The default handler prints one line per problem to standard error.
#[derive(Clone)]
pub struct CleanupErrorHandler(Arc<dyn Fn(RetentionError) + Send + Sync>);

impl CleanupErrorHandler {
    /// Wraps a callback.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(RetentionError) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// A handler that writes a diagnostic line to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(|err| eprintln!("rollfile: cleanup error: {err}"))
    }

    /// A handler that drops every problem.
    #[must_use]
    pub fn ignore() -> Self {
        Self::new(|_| {})
    }

    /// Delivers a problem to the callback.
    pub fn handle(&self, err: RetentionError) {
        (self.0)(err);
    }
}

impl Default for CleanupErrorHandler {
    fn default() -> Self {
        Self::stderr()
    }
}

impl fmt::Debug for CleanupErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CleanupErrorHandler(..)")
    }
}

/// Configuration for opening a rolling file.
///
/// Zero means "unbounded" for `max_bytes`, `max_backups` and `max_age`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Rotate once the active file would reach this many bytes (0 = never).
    pub max_bytes: u64,

    /// Number of most recent backups to keep (0 = all).
    pub max_backups: usize,

    /// Delete backups older than this (zero = never).
    pub max_age: Duration,

    /// Permission bits for created files. `None` inherits the bits of an
    /// existing file, or uses `0o644` for a new one.
    pub mode: Option<u32>,

    /// Stamp backup names with UTC instead of the local wall clock.
    pub utc: bool,

    /// Receives retention problems.
    pub on_cleanup_error: CleanupErrorHandler,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_bytes: 0,
            max_backups: 0,
            max_age: Duration::ZERO,
            mode: None,
            utc: false,
            on_cleanup_error: CleanupErrorHandler::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rotation threshold in bytes.
    #[must_use]
    pub const fn max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    /// Sets the number of backups to keep.
    #[must_use]
    pub const fn max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    /// Sets the maximum backup age.
    #[must_use]
    pub const fn max_age(mut self, age: Duration) -> Self {
        self.max_age = age;
        self
    }

    /// Sets the permission bits for created files.
    #[must_use]
    pub const fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets whether backup names use UTC.
    #[must_use]
    pub const fn utc(mut self, value: bool) -> Self {
        self.utc = value;
        self
    }

    /// Sets the cleanup error callback.
    #[must_use]
    pub fn on_cleanup_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(RetentionError) + Send + Sync + 'static,
    {
        self.on_cleanup_error = CleanupErrorHandler::new(handler);
        self
    }

    /// Returns true if a rotation threshold is configured.
    #[must_use]
    pub const fn rotates(&self) -> bool {
        self.max_bytes > 0
    }

    /// Returns true if any retention limit is configured.
    #[must_use]
    pub fn prunes(&self) -> bool {
        self.max_backups > 0 || !self.max_age.is_zero()
    }

    /// Checks the configuration for values that cannot be honoured.
    ///
    /// # Errors
    ///
    /// Returns [`RollError::InvalidConfig`] if the mode has bits outside
    /// `0o7777` or the maximum age is too large to compare timestamps with.
    pub fn validate(&self) -> RollResult<()> {
        if let Some(mode) = self.mode {
            if mode > 0o7777 {
                return Err(RollError::invalid_config(format!(
                    "file mode {mode:#o} has bits outside 0o7777"
                )));
            }
        }

        if chrono::Duration::from_std(self.max_age).is_err() {
            return Err(RollError::invalid_config(format!(
                "maximum backup age {:?} is out of range",
                self.max_age
            )));
        }

        Ok(())
    }
}
