//! Backup file naming.
//!
//! A backup of `<path>` is named `<path>.<YYYYMMDD-HHMMSS>.<n>`:
//!
//! ```text
//! app.log                      active file
//! app.log.20260314-092653.0    first rotation in that second
//! app.log.20260314-092653.1    second rotation in the same second
//! app.log.20260314-101502.0
//! ```
//!
//! The sequence number is not zero-padded, so names do not sort correctly as
//! plain strings once a second sees ten or more rotations. Ordering goes
//! through [`BackupKey`] instead, which compares the timestamp and then the
//! sequence as a number.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike, Utc};
use std::fmt;
use std::path::{Path, PathBuf};

/// `chrono` format of the timestamp part of a backup name.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Length of a rendered timestamp, e.g. `20260314-092653`.
const TIMESTAMP_LEN: usize = 15;

/// Position of the `-` between date and time.
const TIMESTAMP_SEPARATOR: usize = 8;

/// Ordering key of a backup: wall-clock second of the rotation plus the
/// disambiguating sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupKey {
    timestamp: NaiveDateTime,
    sequence: u32,
}

impl BackupKey {
    /// Creates a key from its parts.
    ///
    /// Sub-second precision in `timestamp` is discarded.
    #[must_use]
    pub fn new(timestamp: NaiveDateTime, sequence: u32) -> Self {
        Self {
            timestamp: truncate_to_second(timestamp),
            sequence,
        }
    }

    /// Creates the first key for a rotation happening at `instant`.
    ///
    /// The timestamp is the wall clock in UTC if `utc` is set, in the local
    /// time zone otherwise.
    #[must_use]
    pub fn at(instant: DateTime<Utc>, utc: bool) -> Self {
        let wall = if utc {
            instant.naive_utc()
        } else {
            instant.with_timezone(&Local).naive_local()
        };
        Self::new(wall, 0)
    }

    /// Wall-clock timestamp of the rotation.
    #[must_use]
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Disambiguator within the same second.
    #[must_use]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The key for the next free slot in the same second, if any.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        Some(Self {
            timestamp: self.timestamp,
            sequence: self.sequence.checked_add(1)?,
        })
    }

    /// Parses the part of a backup name after `<path>.`.
    ///
    /// Returns `None` unless the suffix is exactly `YYYYMMDD-HHMMSS.<digits>`
    /// with a valid calendar date and time.
    #[must_use]
    pub fn parse_suffix(suffix: &str) -> Option<Self> {
        let (stamp, sequence) = suffix.split_once('.')?;

        let bytes = stamp.as_bytes();
        if bytes.len() != TIMESTAMP_LEN || bytes[TIMESTAMP_SEPARATOR] != b'-' {
            return None;
        }
        let mut digits = bytes[..TIMESTAMP_SEPARATOR]
            .iter()
            .chain(&bytes[TIMESTAMP_SEPARATOR + 1..]);
        if !digits.all(u8::is_ascii_digit) {
            return None;
        }
        if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let sequence = sequence.parse().ok()?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            timestamp,
            sequence,
        })
    }

    /// Resolves the wall-clock timestamp to an instant.
    ///
    /// Local timestamps that fall in a daylight-saving gap have no instant
    /// and return `None`; ambiguous ones resolve to the earlier instant.
    #[must_use]
    pub fn instant(&self, utc: bool) -> Option<DateTime<Utc>> {
        if utc {
            Some(Utc.from_utc_datetime(&self.timestamp))
        } else {
            Local
                .from_local_datetime(&self.timestamp)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
        }
    }

    /// Full path of the backup of `active` carrying this key.
    #[must_use]
    pub fn backup_path(&self, active: &Path) -> PathBuf {
        with_suffix(active, &self.to_string())
    }
}

impl fmt::Display for BackupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.sequence
        )
    }
}

/// A backup discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Path of the backup file as found in the directory.
    pub path: PathBuf,
    /// Key parsed from the file name.
    pub key: BackupKey,
}

/// Appends `.<suffix>` to `active` without touching its directory part.
pub(crate) fn with_suffix(active: &Path, suffix: &str) -> PathBuf {
    let mut name = active.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn truncate_to_second(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}
