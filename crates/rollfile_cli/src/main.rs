//! rollfile CLI
//!
//! Command-line tools for rolling files.
//!
//! # Commands
//!
//! - `write` - Append stdin to a rolling file, one record per line
//! - `list` - Show the backups of a rolling file
//! - `prune` - Enforce retention limits on existing backups

mod commands;

use clap::{Args, Parser, Subcommand};
use rollfile_core::Config;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// rollfile command-line tools.
#[derive(Parser)]
#[command(name = "rollfile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Retention limits shared by `write` and `prune`.
#[derive(Args, Debug, Clone)]
struct Limits {
    /// Keep only this many most recent backups (0 = all)
    #[arg(long, default_value_t = 0)]
    max_backups: usize,

    /// Delete backups older than this many seconds (0 = never)
    #[arg(long, default_value_t = 0)]
    max_age_secs: u64,

    /// Backup timestamps are in UTC rather than local time
    #[arg(long)]
    utc: bool,
}

impl Limits {
    fn config(&self) -> Config {
        Config::new()
            .max_backups(self.max_backups)
            .max_age(Duration::from_secs(self.max_age_secs))
            .utc(self.utc)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Append stdin to a rolling file, one record per line
    Write {
        /// Path of the active file
        path: PathBuf,

        /// Rotate before the file would reach this many bytes (0 = never)
        #[arg(long, default_value_t = 0)]
        max_bytes: u64,

        /// Permission bits for created files, in octal
        #[arg(long, value_parser = commands::write::parse_mode)]
        mode: Option<u32>,

        #[command(flatten)]
        limits: Limits,
    },

    /// Show the backups of a rolling file
    List {
        /// Path of the active file
        path: PathBuf,

        /// Backup timestamps are in UTC rather than local time
        #[arg(long)]
        utc: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Enforce retention limits on existing backups
    Prune {
        /// Path of the active file
        path: PathBuf,

        #[command(flatten)]
        limits: Limits,

        /// Dry run - show what would be deleted
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with records or listings
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Write {
            path,
            max_bytes,
            mode,
            limits,
        } => {
            let mut config = limits.config().max_bytes(max_bytes);
            config.mode = mode;
            commands::write::run(&path, config)?;
        }
        Commands::List { path, utc, format } => {
            commands::list::run(&path, utc, &format)?;
        }
        Commands::Prune {
            path,
            limits,
            dry_run,
        } => {
            commands::prune::run(&path, limits.config(), dry_run)?;
        }
        Commands::Version => {
            println!("rollfile CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("rollfile core v{}", rollfile_core::VERSION);
        }
    }

    Ok(())
}
