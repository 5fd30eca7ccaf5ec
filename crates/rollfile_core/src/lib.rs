//! # rollfile core
//!
//! A size-bounded, rotating, append-only file writer.
//!
//! This crate provides:
//! - [`RollingFile`], which appends records and rotates the active file into
//!   a timestamped backup once it would reach a byte threshold
//! - Backup naming and ordering ([`BackupKey`])
//! - Retention sweeps that keep the newest N backups and drop backups older
//!   than a maximum age, off the writer's thread
//!
//! ## Example
//!
//! ```no_run
//! use rollfile_core::{Config, RollingFile};
//!
//! let config = Config::new()
//!     .max_bytes(1024 * 1024)
//!     .max_backups(3)
//!     .on_cleanup_error(|err| eprintln!("retention: {err}"));
//!
//! let mut file = RollingFile::open("/var/log/app.log", config).unwrap();
//! file.write(b"hello\n").unwrap();
//! file.wait_for_cleanup();
//! file.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod naming;
mod retention;
mod writer;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{CleanupErrorHandler, Config};
pub use error::{RetentionError, RollError, RollResult, RotationError};
pub use naming::{Backup, BackupKey, TIMESTAMP_FORMAT};
pub use retention::{Plan, Removal, RemovalReason, Retention, SweepReport};
pub use writer::RollingFile;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
