//! Write command implementation.

use rollfile_core::{Config, RollingFile};
use std::io::{self, BufRead};
use std::path::Path;
use tracing::{info, warn};

/// Summary of a write session.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Records written.
    pub records: usize,
    /// Bytes written.
    pub bytes: u64,
}

/// Parses permission bits given in octal, with or without a `0o` prefix.
pub fn parse_mode(value: &str) -> Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    let mode = u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode {value:?}: {e}"))?;
    if mode > 0o7777 {
        return Err(format!("mode {value} has bits outside 0o7777"));
    }
    Ok(mode)
}

/// Runs the write command.
pub fn run(path: &Path, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let config = config.on_cleanup_error(|err| warn!(error = %err, "cleanup problem"));
    let mut file = RollingFile::open(path, config)?;

    let stdin = io::stdin();
    let stats = copy_lines(stdin.lock(), &mut file)?;

    file.wait_for_cleanup();
    file.close()?;

    info!(
        path = %path.display(),
        records = stats.records,
        bytes = stats.bytes,
        "write finished"
    );
    Ok(())
}

/// Writes every line of `input`, newline included, as one record.
pub fn copy_lines<R: BufRead>(
    mut input: R,
    file: &mut RollingFile,
) -> Result<WriteStats, Box<dyn std::error::Error>> {
    let mut stats = WriteStats::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let written = file.write(&line)?;
        stats.records += 1;
        stats.bytes += written as u64;
    }

    Ok(stats)
}
