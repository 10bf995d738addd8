//! Run report
//!
//! The summary of one backup invocation, handed back to whoever triggered
//! it. Nothing here is persisted by the engine.

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::retention::{DeletionFailure, RetentionReport};
use crate::error::TransportError;
use crate::snapshot::Snapshot;
use crate::transport::CopyStats;

/// Outcome of one backup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Whether the snapshot was written; prune problems don't affect this
    pub success: bool,
    /// Backup root the run targeted
    pub backup_root: String,
    /// Transport backend used
    pub transport: &'static str,
    /// When the run started (local time)
    pub started_at: NaiveDateTime,
    /// When the run finished (local time)
    pub finished_at: NaiveDateTime,
    /// The snapshot written, when the sync succeeded
    pub snapshot: Option<Snapshot>,
    /// Copy statistics, when the sync succeeded
    pub stats: Option<CopyStats>,
    /// Copy attempts made
    pub attempts: u32,
    /// Why the sync failed, if it did
    pub sync_error: Option<TransportError>,
    /// Retention outcome; absent when retention did not run
    pub retention: Option<RetentionReport>,
    /// Whether the run was interrupted by a cancellation signal
    pub cancelled: bool,
}

impl RunReport {
    /// Destination path written by this run
    pub fn destination(&self) -> Option<String> {
        self.snapshot.as_ref().map(|s| s.remote_path.to_string())
    }

    /// Snapshots deleted by retention
    pub fn deleted(&self) -> &[String] {
        self.retention
            .as_ref()
            .map(|r| r.deleted.as_slice())
            .unwrap_or_default()
    }

    /// Snapshot deletions that failed
    pub fn deletion_failures(&self) -> &[DeletionFailure] {
        self.retention
            .as_ref()
            .map(|r| r.failures.as_slice())
            .unwrap_or_default()
    }

    /// Whether pruning ran into problems
    pub fn has_warnings(&self) -> bool {
        self.retention.as_ref().is_some_and(RetentionReport::has_warnings)
    }

    /// Process exit code: 0 when the snapshot was written, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.success {
            0
        } else {
            1
        }
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let mut out = String::new();

        match (&self.snapshot, &self.sync_error) {
            (Some(snapshot), _) => {
                let _ = writeln!(out, "Snapshot: {}", snapshot.name);
                let _ = writeln!(out, "Location: {}", snapshot.remote_path);
                if let Some(stats) = &self.stats {
                    let _ = writeln!(
                        out,
                        "Files:    {} transferred, {} unchanged ({} bytes)",
                        stats.files_transferred, stats.files_skipped, stats.bytes_transferred
                    );
                }
            }
            (None, Some(error)) => {
                let _ = writeln!(out, "Backup failed: {}", error);
            }
            (None, None) => {
                let _ = writeln!(out, "Backup did not run");
            }
        }

        if let Some(retention) = &self.retention {
            match retention.max_backups {
                Some(max) => {
                    let _ = writeln!(
                        out,
                        "Pruned:   {} snapshot(s) (keeping at most {})",
                        retention.deleted.len(),
                        max
                    );
                }
                None => {
                    let _ = writeln!(out, "Pruned:   nothing (no retention cap)");
                }
            }
            for name in &retention.deleted {
                let _ = writeln!(out, "  - {}", name);
            }
            if let Some(error) = &retention.list_error {
                let _ = writeln!(out, "Warning:  could not list snapshots: {}", error);
            }
            for failure in &retention.failures {
                let _ = writeln!(
                    out,
                    "Warning:  could not delete {}: {}",
                    failure.snapshot, failure.error
                );
            }
            if retention.cancelled {
                let _ = writeln!(out, "Warning:  pruning was interrupted");
            }
        }

        if self.cancelled && self.retention.is_none() && self.success {
            let _ = writeln!(out, "Pruning skipped: run was cancelled");
        }

        out
    }
}
