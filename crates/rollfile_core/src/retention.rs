//! Backup retention.
//!
//! Retention is enforced by sweeps. A sweep lists the backups of one active
//! file, orders them oldest first by [`BackupKey`], and deletes every backup
//! that is beyond the newest `max_backups` or older than `max_age`.
//!
//! Sweeps triggered by rotation run on their own thread and never report back
//! to the writer; problems go to the configured [`CleanupErrorHandler`].
//! Sweeps for the same file are serialized by a lock held for the whole
//! list-then-delete sequence.
//!
//! At most one background thread exists per file. Rotations that happen while
//! it is busy only mark it to sweep once more before exiting.

use crate::clock::Clock;
use crate::config::{CleanupErrorHandler, Config};
use crate::error::RetentionError;
use crate::naming::{Backup, BackupKey};
use chrono::NaiveDateTime;
use parking_lot::{Condvar, Mutex};
use std::fs;
use std::path::{Path, PathBuf};
use std::str;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

/// Name given to background sweep threads.
const SWEEP_THREAD_NAME: &str = "rollfile-sweep";

/// Why a backup is scheduled for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Older than the maximum backup age.
    Age,
    /// Not among the newest `max_backups` backups.
    Count,
}

/// A backup that a sweep would delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// The backup.
    pub backup: Backup,
    /// Which limit it violates. Age wins when both apply.
    pub reason: RemovalReason,
}

/// What a sweep would do, computed without touching the filesystem beyond
/// the directory listing.
#[derive(Debug, Default)]
pub struct Plan {
    /// Backups to delete, oldest first.
    pub removals: Vec<Removal>,
    /// Backups that survive, oldest first.
    pub kept: Vec<Backup>,
    /// Problems found while planning.
    pub problems: Vec<RetentionError>,
}

/// Result of a sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Backups deleted because of the count limit.
    pub removed_by_count: usize,
    /// Backups deleted because of the age limit.
    pub removed_by_age: usize,
    /// Paths of all deleted backups.
    pub removed_paths: Vec<PathBuf>,
    /// Problems reported to the cleanup handler.
    pub failures: usize,
}

impl SweepReport {
    /// Total number of backups deleted.
    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.removed_by_count + self.removed_by_age
    }
}

/// Outcome of listing the directory.
#[derive(Default)]
struct Scan {
    backups: Vec<Backup>,
    unrecognized: Vec<PathBuf>,
}

/// Retention policy and sweep coordination for one active file.
///
/// Shared between the writer, which schedules sweeps after rotation, and the
/// sweep threads themselves.
#[derive(Debug)]
pub struct Retention {
    path: PathBuf,
    max_backups: usize,
    max_age: Option<chrono::Duration>,
    utc: bool,
    on_error: CleanupErrorHandler,
    clock: Arc<dyn Clock>,
    /// Held for the duration of a sweep.
    sweep_lock: Mutex<()>,
    worker: Mutex<Worker>,
    idle: Condvar,
}

/// State of the background sweep thread.
#[derive(Debug, Default)]
struct Worker {
    /// A sweep thread is alive.
    running: bool,
    /// A rotation asked for a sweep after the running one started.
    rerun: bool,
}

impl Retention {
    /// Creates the retention policy for backups of `path`.
    #[must_use]
    pub fn new(path: &Path, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let max_age = if config.max_age.is_zero() {
            None
        } else {
            chrono::Duration::from_std(config.max_age).ok()
        };

        Self {
            path: path.to_path_buf(),
            max_backups: config.max_backups,
            max_age,
            utc: config.utc,
            on_error: config.on_cleanup_error.clone(),
            clock,
            sweep_lock: Mutex::new(()),
            worker: Mutex::new(Worker::default()),
            idle: Condvar::new(),
        }
    }

    /// Path of the active file whose backups this manages.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if any limit is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_backups > 0 || self.max_age.is_some()
    }

    /// Lists the backups of the active file, oldest first.
    ///
    /// Entries that carry the backup prefix but no valid key are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn backups(&self) -> Result<Vec<Backup>, RetentionError> {
        Ok(self.scan()?.backups)
    }

    /// Highest sequence number among backups stamped with `timestamp`.
    pub(crate) fn last_sequence(
        &self,
        timestamp: NaiveDateTime,
    ) -> Result<Option<u32>, RetentionError> {
        Ok(self
            .scan()?
            .backups
            .iter()
            .filter(|backup| backup.key.timestamp() == timestamp)
            .map(|backup| backup.key.sequence())
            .max())
    }

    /// Works out which backups a sweep would delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn plan(&self) -> Result<Plan, RetentionError> {
        let scan = self.scan()?;
        let mut plan = Plan {
            problems: scan
                .unrecognized
                .into_iter()
                .map(|path| RetentionError::UnrecognizedBackup { path })
                .collect(),
            ..Plan::default()
        };

        let now = self.clock.now();
        let total = scan.backups.len();

        for (index, backup) in scan.backups.into_iter().enumerate() {
            let expired = match self.max_age {
                Some(max_age) => match backup.key.instant(self.utc) {
                    Some(stamped) => now.signed_duration_since(stamped) > max_age,
                    None => {
                        plan.problems.push(RetentionError::Timestamp {
                            path: backup.path.clone(),
                            reason: format!(
                                "local time {} does not exist",
                                backup.key.timestamp()
                            ),
                        });
                        false
                    }
                },
                None => false,
            };
            let surplus = self.max_backups > 0 && total - index > self.max_backups;

            let reason = if expired {
                Some(RemovalReason::Age)
            } else if surplus {
                Some(RemovalReason::Count)
            } else {
                None
            };

            match reason {
                Some(reason) => plan.removals.push(Removal { backup, reason }),
                None => plan.kept.push(backup),
            }
        }

        Ok(plan)
    }

    /// Runs one sweep on the calling thread.
    ///
    /// Blocks while another sweep for the same file is running. Every problem
    /// is handed to the cleanup handler and counted in the report; a failed
    /// deletion does not stop the sweep.
    pub fn sweep(&self) -> SweepReport {
        let _guard = self.sweep_lock.lock();
        let mut report = SweepReport::default();

        if !self.is_enabled() {
            return report;
        }

        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(err) => {
                self.report(&mut report, err);
                return report;
            }
        };

        for problem in plan.problems {
            self.report(&mut report, problem);
        }

        for Removal { backup, reason } in plan.removals {
            match fs::remove_file(&backup.path) {
                Ok(()) => {
                    debug!(path = %backup.path.display(), ?reason, "removed backup");
                    match reason {
                        RemovalReason::Age => report.removed_by_age += 1,
                        RemovalReason::Count => report.removed_by_count += 1,
                    }
                    report.removed_paths.push(backup.path);
                }
                Err(source) => self.report(
                    &mut report,
                    RetentionError::Remove {
                        path: backup.path,
                        source,
                    },
                ),
            }
        }

        report
    }

    /// Requests a sweep on the background thread and returns immediately.
    ///
    /// Starts the thread if none is running. Otherwise the running thread
    /// sweeps once more before it exits, so every request is covered by a
    /// sweep that starts after it. Does nothing if no limit is configured.
    pub fn schedule(self: &Arc<Self>) {
        if !self.is_enabled() {
            return;
        }

        {
            let mut worker = self.worker.lock();
            if worker.running {
                worker.rerun = true;
                trace!(path = %self.path.display(), "sweep already running, queued rerun");
                return;
            }
            worker.running = true;
        }

        let retention = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(SWEEP_THREAD_NAME.to_string())
            .spawn(move || {
                let _idle = IdleOnPanic(&retention);
                loop {
                    let report = retention.sweep();
                    debug!(
                        path = %retention.path.display(),
                        removed_by_count = report.removed_by_count,
                        removed_by_age = report.removed_by_age,
                        failures = report.failures,
                        "retention sweep finished"
                    );
                    if !retention.take_rerun() {
                        break;
                    }
                }
            });

        if let Err(err) = spawned {
            self.mark_idle();
            warn!(path = %self.path.display(), error = %err, "could not start retention sweep");
            self.on_error.handle(RetentionError::Spawn(err));
        }
    }

    /// Returns true if no background sweep is running or queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.worker.lock().running
    }

    /// Blocks until every sweep requested so far has finished.
    pub fn wait_idle(&self) {
        let mut worker = self.worker.lock();
        while worker.running {
            self.idle.wait(&mut worker);
        }
    }

    /// Consumes a queued rerun, or marks the worker idle if there is none.
    ///
    /// Both happen under one lock so a request made after the last sweep
    /// finished either sees `running` cleared or is picked up here.
    fn take_rerun(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.rerun {
            worker.rerun = false;
            return true;
        }
        worker.running = false;
        self.idle.notify_all();
        false
    }

    fn mark_idle(&self) {
        let mut worker = self.worker.lock();
        worker.running = false;
        worker.rerun = false;
        self.idle.notify_all();
    }

    fn report(&self, report: &mut SweepReport, err: RetentionError) {
        report.failures += 1;
        self.on_error.handle(err);
    }

    fn scan(&self) -> Result<Scan, RetentionError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let Some(file_name) = self.path.file_name() else {
            return Ok(Scan::default());
        };
        let mut prefix = file_name.as_encoded_bytes().to_vec();
        prefix.push(b'.');

        let list_error = |source| RetentionError::List {
            dir: dir.to_path_buf(),
            source,
        };

        let mut backups = Vec::new();
        let mut unrecognized = Vec::new();
        for entry in fs::read_dir(dir).map_err(list_error)? {
            let entry = entry.map_err(list_error)?;
            let name = entry.file_name();
            let Some(suffix) = name.as_encoded_bytes().strip_prefix(prefix.as_slice()) else {
                continue;
            };
            if suffix.is_empty() {
                continue;
            }

            let path = self.path.with_file_name(&name);
            match str::from_utf8(suffix).ok().and_then(BackupKey::parse_suffix) {
                Some(key) => backups.push(Backup { path, key }),
                None => unrecognized.push(path),
            }
        }

        backups.sort_by(|a, b| a.key.cmp(&b.key));
        unrecognized.sort();

        Ok(Scan {
            backups,
            unrecognized,
        })
    }
}

/// Marks the worker idle if a sweep panics, so waiters are released.
struct IdleOnPanic<'a>(&'a Retention);

impl Drop for IdleOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.mark_idle();
        }
    }
}
