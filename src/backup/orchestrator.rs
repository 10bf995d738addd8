//! Run orchestrator
//!
//! Sequences one backup run: sync first, and only once the new snapshot is
//! confirmed written, retention. A failed sync never prunes, so a broken run
//! can't reduce the number of good snapshots on the remote.

use tracing::{error, info, warn};

use super::report::RunReport;
use super::retention;
use super::sync::SyncExecutor;
use crate::cancel::CancellationToken;
use crate::config::BackupConfig;
use crate::error::TransportError;
use crate::snapshot::Clock;
use crate::transport::Transport;

/// Execute one backup run described by `config`
pub fn run(
    config: &BackupConfig,
    transport: &dyn Transport,
    clock: &dyn Clock,
    cancel: &CancellationToken,
) -> RunReport {
    let mut report = RunReport {
        success: false,
        backup_root: config.backup_root.to_string(),
        transport: transport.name(),
        started_at: clock.now(),
        finished_at: clock.now(),
        snapshot: None,
        stats: None,
        attempts: 0,
        sync_error: None,
        retention: None,
        cancelled: false,
    };

    info!(
        "Sync started: {} -> {} via {}",
        config.local_source.display(),
        config.backup_root,
        transport.name()
    );

    let executor = SyncExecutor::new(transport, clock, config.retry);
    let outcome = match executor.run_sync(
        &config.local_source,
        &config.backup_root,
        &config.host_id,
        &config.copy,
        cancel,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Sync failed: {}", e);
            report.cancelled = e == TransportError::Cancelled;
            report.sync_error = Some(e);
            report.finished_at = clock.now();
            return report;
        }
    };

    match &outcome.stats {
        Some(stats) => info!(
            "Sync finished: {} ({} transferred, {} unchanged)",
            outcome.snapshot.remote_path, stats.files_transferred, stats.files_skipped
        ),
        None => info!("Sync finished: {}", outcome.snapshot.remote_path),
    }

    report.success = true;
    report.attempts = outcome.attempts;
    report.stats = outcome.stats;

    if cancel.is_cancelled() {
        warn!("Run cancelled after sync, skipping retention");
        report.cancelled = true;
        report.snapshot = Some(outcome.snapshot);
        report.finished_at = clock.now();
        return report;
    }

    info!("Retention started: {}", config.backup_root);
    let retention = retention::enforce(
        transport,
        &config.backup_root,
        &config.retention,
        Some(&outcome.snapshot.name),
        cancel,
    );
    if retention.has_warnings() {
        warn!(
            "Retention finished with warnings: {} deleted, {} failed",
            retention.deleted.len(),
            retention.failures.len()
        );
    } else {
        info!("Retention finished: {} deleted", retention.deleted.len());
    }

    report.cancelled = retention.cancelled;
    report.retention = Some(retention);
    report.snapshot = Some(outcome.snapshot);
    report.finished_at = clock.now();
    report
}
