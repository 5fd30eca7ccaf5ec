//! # rollfile storage
//!
//! The file handle underneath a rolling file.
//!
//! This crate is the lowest layer of rollfile. It knows how to open or create
//! a file in append mode with the right permission bits and how to push bytes
//! into it. It has no notion of rotation, backups or retention; those live in
//! `rollfile_core`.
//!
//! ## Design Principles
//!
//! - Files are always opened in append mode, never truncated
//! - A pre-existing file keeps its permission bits unless overridden
//! - Short writes report how many bytes reached the file
//! - Closing is explicit so close-time failures can be surfaced
//!
//! ## Example
//!
//! ```no_run
//! use rollfile_storage::AppendFile;
//! use std::path::Path;
//!
//! let mut file = AppendFile::open(Path::new("app.log"), None).unwrap();
//! file.append(b"hello world\n").unwrap();
//! file.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;

pub use error::{StorageError, StorageResult};
pub use file::{inherited_mode, AppendFile, DEFAULT_MODE};
