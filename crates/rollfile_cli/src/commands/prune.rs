//! Prune command implementation.

use rollfile_core::{Config, RemovalReason, Retention, SweepReport, SystemClock};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs the prune command.
pub fn run(path: &Path, config: Config, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !config.prunes() {
        return Err("Nothing to do: set --max-backups or --max-age-secs".into());
    }

    let config = config.on_cleanup_error(|err| warn!(error = %err, "cleanup problem"));
    config.validate()?;
    let retention = Retention::new(path, &config, Arc::new(SystemClock));

    println!("Pruning backups of {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
        println!();

        let plan = retention.plan()?;
        for problem in &plan.problems {
            println!("  skip    {problem}");
        }
        for removal in &plan.removals {
            println!(
                "  delete  {}  ({})",
                removal.backup.path.display(),
                reason_label(removal.reason)
            );
        }
        println!();
        println!(
            "Would delete {} of {} backups",
            plan.removals.len(),
            plan.removals.len() + plan.kept.len()
        );
        return Ok(());
    }

    let report = retention.sweep();
    print_report(&report);
    info!(
        path = %path.display(),
        removed = report.total_removed(),
        failures = report.failures,
        "prune finished"
    );

    if report.failures > 0 {
        return Err(format!("{} problem(s) during prune", report.failures).into());
    }
    Ok(())
}

fn reason_label(reason: RemovalReason) -> &'static str {
    match reason {
        RemovalReason::Age => "older than max age",
        RemovalReason::Count => "beyond max backups",
    }
}

fn print_report(report: &SweepReport) {
    println!();
    for path in &report.removed_paths {
        println!("  deleted {}", path.display());
    }
    println!();
    println!("Prune Summary:");
    println!("  Removed by count: {}", report.removed_by_count);
    println!("  Removed by age:   {}", report.removed_by_age);
    println!("  Problems:         {}", report.failures);
}
