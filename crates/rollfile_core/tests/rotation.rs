//! End-to-end tests for rotation and retention on a real directory.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rollfile_core::{Clock, Config, MockClock, RetentionError, RollError, RollingFile};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

fn quiet() -> Config {
    Config::new().on_cleanup_error(|_| {})
}

/// Active file plus backups, oldest first.
fn all_files(file: &RollingFile) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = file
        .backups()
        .unwrap()
        .into_iter()
        .map(|b| b.path)
        .collect();
    files.push(file.name().to_path_buf());
    files
}

fn concatenated(files: &[PathBuf]) -> Vec<u8> {
    files
        .iter()
        .filter(|p| p.exists())
        .flat_map(|p| fs::read(p).unwrap())
        .collect()
}

fn line_count(path: &Path) -> usize {
    fs::read(path)
        .unwrap()
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

#[test]
fn ten_small_records_survive_rotation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotate.log");

    let mut file = RollingFile::open(&path, quiet().max_bytes(100).max_backups(5)).unwrap();
    let record = format!("{}\n", "x".repeat(15));
    for _ in 0..10 {
        assert_eq!(file.write(record.as_bytes()).unwrap(), 16);
    }
    file.sync().unwrap();
    file.wait_for_cleanup();

    let files = all_files(&file);
    file.close().unwrap();

    assert!(files.len() >= 2, "expected at least one backup");
    let total: usize = files.iter().map(|p| line_count(p)).sum();
    assert_eq!(total, 10);
}

#[test]
fn max_backups_enforced_after_cleanup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("maxbackup.log");

    let mut file = RollingFile::open(&path, quiet().max_bytes(100).max_backups(3)).unwrap();
    let record = format!("{}\n", "y".repeat(80));
    for _ in 0..5 {
        file.write(record.as_bytes()).unwrap();
    }
    file.close().unwrap();
    file.wait_for_cleanup();

    assert_eq!(file.backups().unwrap().len(), 3);
}

#[test]
fn every_line_retained_across_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("file.log");

    const LINE_COUNT: usize = 50;
    const LINE_SIZE: usize = 15;
    const ROTATION_SIZE: u64 = 100;

    let mut file = RollingFile::open(
        &path,
        quiet().max_bytes(ROTATION_SIZE).max_backups(100),
    )
    .unwrap();
    for _ in 0..LINE_COUNT {
        let line = format!("{}\n", "y".repeat(LINE_SIZE));
        file.write(line.as_bytes()).unwrap();
    }
    file.wait_for_cleanup();

    // Six 16-byte lines fit under 100 bytes, the seventh rotates.
    let files = all_files(&file);
    assert_eq!(files.len(), LINE_COUNT / 6 + 1);

    let total: usize = files.iter().map(|p| line_count(p)).sum();
    assert_eq!(total, LINE_COUNT);
}

#[test]
fn records_stay_in_write_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("order.log");

    let mut file = RollingFile::open(&path, quiet().max_bytes(64)).unwrap();
    let mut expected = Vec::new();
    for i in 0..200 {
        let line = format!("record {i:04}\n");
        file.write(line.as_bytes()).unwrap();
        expected.extend_from_slice(line.as_bytes());
    }

    // More than ten rotations land in the same second here, so this also
    // checks that backup .10 sorts after .9.
    assert!(file.backups().unwrap().len() > 10);
    assert_eq!(concatenated(&all_files(&file)), expected);
}

#[test]
fn oversize_record_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exceed.log");

    let mut file = RollingFile::open(&path, quiet().max_bytes(100).max_backups(5)).unwrap();
    file.write(b"before\n").unwrap();

    let long = format!("{}\n", "x".repeat(200));
    let err = file.write(long.as_bytes()).unwrap_err();
    assert!(matches!(err, RollError::OversizeRecord { .. }));
    assert_eq!(file.write(long.as_bytes()).unwrap_or(0), 0);

    file.close().unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"before\n");
    assert!(file.backups().unwrap().is_empty());
}

#[test]
fn old_backups_expire_on_next_rotation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("age.log");
    let clock = Arc::new(MockClock::new(
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
    ));

    let config = quiet()
        .utc(true)
        .max_bytes(4)
        .max_backups(100)
        .max_age(Duration::from_secs(3600));
    let mut file =
        RollingFile::with_clock(&path, config, Arc::clone(&clock) as Arc<dyn Clock>).unwrap();

    file.write(b"aaa").unwrap();
    file.write(b"bbb").unwrap();
    file.write(b"ccc").unwrap();
    file.wait_for_cleanup();
    assert_eq!(file.backups().unwrap().len(), 2);

    clock.advance(chrono::Duration::hours(2));
    file.write(b"ddd").unwrap();
    file.wait_for_cleanup();

    let backups = file.backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].key.to_string(), "20260201-110000.0");
    assert_eq!(fs::read(&backups[0].path).unwrap(), b"ccc");
}

#[test]
fn cleanup_errors_reach_handler() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("handler.log");
    fs::write(dir.path().join("handler.log.old"), b"").unwrap();

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let config = Config::new()
        .max_bytes(4)
        .max_backups(1)
        .on_cleanup_error(move |err: RetentionError| sink.lock().unwrap().push(err.to_string()));

    let mut file = RollingFile::open(&path, config).unwrap();
    file.write(b"aaa").unwrap();
    file.write(b"bbb").unwrap();
    file.wait_for_cleanup();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("handler.log.old"));
    assert!(dir.path().join("handler.log.old").exists());
}

#[test]
fn writes_continue_while_sweeps_run() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("busy.log");

    let mut file = RollingFile::open(&path, quiet().max_bytes(32).max_backups(4)).unwrap();
    let mut written = 0;
    for i in 0..500 {
        written += file.write(format!("line {i:05}\n").as_bytes()).unwrap();
    }
    assert_eq!(written, 500 * 11);

    file.wait_for_cleanup();
    assert!(file.retention().is_idle());
    assert_eq!(file.backups().unwrap().len(), 4);
}

#[test]
fn existing_content_is_preserved() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("resume.log");
    fs::write(&path, b"from last run\n").unwrap();

    let mut file = RollingFile::open(&path, quiet().max_bytes(20)).unwrap();
    file.write(b"new run\n").unwrap();

    let backups = file.backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(fs::read(&backups[0].path).unwrap(), b"from last run\n");
    assert_eq!(fs::read(&path).unwrap(), b"new run\n");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn no_bytes_lost_across_rotations(
        max_bytes in 8u64..128,
        sizes in prop::collection::vec(1usize..8, 1..64),
    ) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prop.log");
        let clock = Arc::new(MockClock::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
        ));

        let config = quiet().utc(true).max_bytes(max_bytes);
        let mut file =
            RollingFile::with_clock(&path, config, Arc::clone(&clock) as Arc<dyn Clock>).unwrap();

        let mut expected = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            let record = vec![b'a' + (i % 26) as u8; *size];
            prop_assert_eq!(file.write(&record).unwrap(), *size);
            expected.extend_from_slice(&record);
            if i % 5 == 4 {
                clock.advance(chrono::Duration::seconds(1));
            }
        }

        prop_assert!(file.size() < max_bytes);
        for backup in file.backups().unwrap() {
            prop_assert!(fs::metadata(&backup.path).unwrap().len() < max_bytes);
        }
        prop_assert_eq!(concatenated(&all_files(&file)), expected);
    }
}
