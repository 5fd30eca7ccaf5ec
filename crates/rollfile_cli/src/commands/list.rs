//! List command implementation.

use rollfile_core::{Config, Retention, SystemClock};
use rollfile_storage::inherited_mode;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One backup in a listing.
#[derive(Debug, Serialize)]
pub struct BackupEntry {
    /// Backup path.
    pub path: String,
    /// Wall-clock timestamp embedded in the name.
    pub timestamp: String,
    /// Disambiguator within the same second.
    pub sequence: u32,
    /// Size in bytes, if the file could be read.
    pub size: Option<u64>,
}

/// Listing of a rolling file and its backups.
#[derive(Debug, Serialize)]
pub struct ListResult {
    /// Active file path.
    pub path: String,
    /// Active file size in bytes, if it exists.
    pub active_size: Option<u64>,
    /// Active file permission bits in octal, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_mode: Option<String>,
    /// Backups, oldest first.
    pub backups: Vec<BackupEntry>,
    /// Total bytes across backups.
    pub backup_bytes: u64,
}

/// Collects the listing for `path`.
pub fn collect(path: &Path, utc: bool) -> Result<ListResult, Box<dyn std::error::Error>> {
    let retention = Retention::new(path, &Config::new().utc(utc), Arc::new(SystemClock));

    let backups: Vec<BackupEntry> = retention
        .backups()?
        .into_iter()
        .map(|backup| BackupEntry {
            size: fs::metadata(&backup.path).ok().map(|m| m.len()),
            path: backup.path.display().to_string(),
            timestamp: backup.key.timestamp().to_string(),
            sequence: backup.key.sequence(),
        })
        .collect();

    Ok(ListResult {
        path: path.display().to_string(),
        active_size: fs::metadata(path).ok().map(|m| m.len()),
        active_mode: inherited_mode(path)?.map(|mode| format!("{mode:o}")),
        backup_bytes: backups.iter().filter_map(|b| b.size).sum(),
        backups,
    })
}

/// Runs the list command.
pub fn run(path: &Path, utc: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path, utc)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text(&result),
        other => return Err(format!("Unknown format: {other}").into()),
    }

    Ok(())
}

fn print_text(result: &ListResult) {
    println!("Rolling file: {}", result.path);
    match result.active_size {
        Some(size) => println!("  Active size: {size} bytes"),
        None => println!("  Active file does not exist"),
    }
    if let Some(mode) = &result.active_mode {
        println!("  Mode:        {mode}");
    }
    println!();

    if result.backups.is_empty() {
        println!("No backups");
        return;
    }

    println!(
        "Backups ({}, {} bytes, oldest first):",
        result.backups.len(),
        result.backup_bytes
    );
    for backup in &result.backups {
        let size = backup
            .size
            .map_or_else(|| "?".to_string(), |s| s.to_string());
        println!(
            "  {}  #{:<3} {:>10} bytes  {}",
            backup.timestamp, backup.sequence, size, backup.path
        );
    }
}
