//! Sync command handler

use anyhow::Result;
use tracing::info;

use terminotes_core::{Store, SyncReport};

use crate::output::Output;

/// Run one synchronization and print its report
///
/// The caller turns the report into the process exit status.
pub fn sync(store: &mut Store, dry_run: bool, output: &Output) -> Result<SyncReport> {
    let report = store.sync(dry_run)?;
    info!(
        "Sync finished: {} (exit {})",
        report.outcome.label(),
        report.exit_code()
    );
    output.print_sync_report(&report);
    Ok(report)
}
