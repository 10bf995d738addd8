//! Retention enforcement
//!
//! Keeps at most `max_backups` snapshots under the backup root, besides the
//! latest one, by deleting the oldest ones. Snapshot names sort
//! chronologically as plain strings, so "oldest" is simply "smallest name";
//! no dates are parsed for ordering.
//!
//! The latest snapshot is the one a run just wrote, or, for a standalone
//! prune, the newest snapshot on the store. Either way it sits outside the
//! cap, so a prune right after a run selects nothing the run kept.
//!
//! Pruning is best effort: a failed deletion is recorded and the remaining
//! deletions are still attempted.

use std::num::NonZeroUsize;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{SavesnapError, SavesnapResult, TransportError};
use crate::snapshot::{RemotePath, SnapshotName};
use crate::transport::Transport;

/// How many snapshots to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RetentionPolicy {
    max_backups: Option<NonZeroUsize>,
}

impl RetentionPolicy {
    /// Keep every snapshot
    pub fn unlimited() -> Self {
        Self { max_backups: None }
    }

    /// Keep at most `max` snapshots
    pub fn keep(max: NonZeroUsize) -> Self {
        Self {
            max_backups: Some(max),
        }
    }

    /// Build a policy from a raw configured value
    ///
    /// `None` means unlimited. Zero and negative values are rejected rather
    /// than being read as "keep nothing".
    pub fn from_setting(value: Option<i64>) -> SavesnapResult<Self> {
        match value {
            None => Ok(Self::unlimited()),
            Some(n) if n < 0 => Err(SavesnapError::Config(format!(
                "max_backups must not be negative (got {})",
                n
            ))),
            Some(n) => usize::try_from(n)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(Self::keep)
                .ok_or_else(|| {
                    SavesnapError::Config(
                        "max_backups must be at least 1; leave it unset to keep every snapshot"
                            .into(),
                    )
                }),
        }
    }

    /// The cap, if any
    pub fn max_backups(&self) -> Option<usize> {
        self.max_backups.map(NonZeroUsize::get)
    }
}

/// What retention would do with a given listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    /// Well-formed snapshots, oldest first
    pub snapshots: Vec<SnapshotName>,
    /// Entries that don't look like snapshots
    pub ignored: Vec<String>,
    /// Snapshots to delete, oldest first
    pub to_delete: Vec<SnapshotName>,
}

impl RetentionPlan {
    /// Number of snapshots left once the plan is carried out
    pub fn remaining(&self) -> usize {
        self.snapshots.len() - self.to_delete.len()
    }
}

/// A snapshot that could not be deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionFailure {
    pub snapshot: String,
    pub error: TransportError,
}

/// Outcome of one retention pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    /// The cap that was applied, if any
    pub max_backups: Option<usize>,
    /// Well-formed snapshots found before pruning
    pub snapshots_found: usize,
    /// Entries ignored because they aren't snapshots
    pub ignored: Vec<String>,
    /// Snapshots deleted, oldest first
    pub deleted: Vec<String>,
    /// Deletions that failed
    pub failures: Vec<DeletionFailure>,
    /// Set when the backup root could not be listed
    pub list_error: Option<TransportError>,
    /// Set when pruning stopped early because the run was cancelled
    pub cancelled: bool,
}

impl RetentionReport {
    /// Whether anything went wrong while pruning
    pub fn has_warnings(&self) -> bool {
        !self.failures.is_empty() || self.list_error.is_some() || self.cancelled
    }
}

/// Decide which entries to delete so that at most `max_backups` snapshots
/// remain besides the latest one
///
/// Malformed entries are neither counted nor deleted. `protect`, the snapshot
/// a run just wrote, is not counted against the cap and is never selected,
/// even if clock skew made it sort before older snapshots. Without it the
/// newest snapshot in the listing takes its place.
pub fn plan_retention(
    entries: &[String],
    max_backups: usize,
    protect: Option<&SnapshotName>,
) -> RetentionPlan {
    let mut snapshots = Vec::new();
    let mut ignored = Vec::new();

    for entry in entries {
        match SnapshotName::parse(entry) {
            Some(name) => snapshots.push(name),
            None => ignored.push(entry.clone()),
        }
    }

    snapshots.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    snapshots.dedup_by(|a, b| a.as_str() == b.as_str());
    ignored.sort();

    let latest = protect.or_else(|| snapshots.last()).map(SnapshotName::as_str);
    let candidates: Vec<&SnapshotName> = snapshots
        .iter()
        .filter(|name| Some(name.as_str()) != latest)
        .collect();
    let excess = candidates.len().saturating_sub(max_backups);
    let to_delete = candidates.into_iter().take(excess).cloned().collect();

    RetentionPlan {
        snapshots,
        ignored,
        to_delete,
    }
}

/// List the backup root and plan a retention pass
///
/// A backup root that doesn't exist yet holds no snapshots.
pub fn plan(
    transport: &dyn Transport,
    backup_root: &RemotePath,
    max_backups: usize,
    protect: Option<&SnapshotName>,
    cancel: &CancellationToken,
) -> Result<RetentionPlan, TransportError> {
    let entries = match transport.list(backup_root, cancel) {
        Ok(entries) => entries,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e),
    };

    Ok(plan_retention(&entries, max_backups, protect))
}

/// Delete the oldest snapshots beyond the policy's cap
pub fn enforce(
    transport: &dyn Transport,
    backup_root: &RemotePath,
    policy: &RetentionPolicy,
    protect: Option<&SnapshotName>,
    cancel: &CancellationToken,
) -> RetentionReport {
    let Some(max_backups) = policy.max_backups() else {
        debug!("No retention cap configured, keeping every snapshot");
        return RetentionReport::default();
    };

    let mut report = RetentionReport {
        max_backups: Some(max_backups),
        ..RetentionReport::default()
    };

    let plan = match plan(transport, backup_root, max_backups, protect, cancel) {
        Ok(plan) => plan,
        Err(e) => {
            warn!("Could not list snapshots under {}: {}", backup_root, e);
            report.list_error = Some(e);
            return report;
        }
    };

    for entry in &plan.ignored {
        debug!("Ignoring {} (not a snapshot)", entry);
    }

    report.snapshots_found = plan.snapshots.len();
    report.ignored = plan.ignored.clone();

    for name in &plan.to_delete {
        if cancel.is_cancelled() {
            let left = plan.to_delete.len() - report.deleted.len() - report.failures.len();
            warn!("Pruning interrupted, {} snapshot(s) left over the cap", left);
            report.cancelled = true;
            break;
        }

        match transport.delete(&backup_root.join(name.as_str()), cancel) {
            Ok(()) => {
                info!("Deleted snapshot {}", name);
                report.deleted.push(name.to_string());
            }
            Err(TransportError::Cancelled) => {
                warn!("Pruning interrupted while deleting {}", name);
                report.cancelled = true;
                break;
            }
            Err(e) => {
                warn!("Failed to delete snapshot {}: {}", name, e);
                report.failures.push(DeletionFailure {
                    snapshot: name.to_string(),
                    error: e,
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn root() -> RemotePath {
        "mem:/backups".parse().unwrap()
    }

    fn names(days: &[u32]) -> Vec<String> {
        days.iter()
            .map(|d| format!("2025-11-{:02}_120000-box", d))
            .collect()
    }

    fn keep(n: usize) -> RetentionPolicy {
        RetentionPolicy::keep(NonZeroUsize::new(n).unwrap())
    }

    #[test]
    fn test_policy_from_setting() {
        assert_eq!(RetentionPolicy::from_setting(None).unwrap().max_backups(), None);
        assert_eq!(RetentionPolicy::from_setting(Some(10)).unwrap().max_backups(), Some(10));
        assert!(RetentionPolicy::from_setting(Some(0)).unwrap_err().is_config());
        assert!(RetentionPolicy::from_setting(Some(-3)).unwrap_err().is_config());
    }

    #[test]
    fn test_plan_deletes_smallest_names() {
        // Listing order is deliberately scrambled
        let entries = names(&[5, 1, 4, 2, 3]);
        let plan = plan_retention(&entries, 2, None);

        let deleted: Vec<&str> = plan.to_delete.iter().map(|n| n.as_str()).collect();
        assert_eq!(deleted, vec!["2025-11-01_120000-box", "2025-11-02_120000-box"]);
        // Two under the cap plus the newest
        assert_eq!(plan.remaining(), 3);
    }

    #[test]
    fn test_plan_within_cap_deletes_nothing() {
        let entries = names(&[1, 2, 3]);
        assert!(plan_retention(&entries, 3, None).to_delete.is_empty());
        assert!(plan_retention(&entries, 10, None).to_delete.is_empty());
        assert!(plan_retention(&[], 1, None).to_delete.is_empty());
    }

    #[test]
    fn test_plan_ignores_malformed_entries() {
        let mut entries = names(&[1, 2, 3]);
        entries.push("README.txt".into());
        entries.push("0000-stray".into());
        entries.push("backup_20251101_120000.tar.gz".into());

        let plan = plan_retention(&entries, 1, None);
        assert_eq!(plan.snapshots.len(), 3);
        assert_eq!(plan.ignored.len(), 3);
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].as_str(), "2025-11-01_120000-box");
    }

    #[test]
    fn test_plan_never_deletes_protected() {
        let entries = names(&[1, 2, 3]);
        let protect = SnapshotName::parse("2025-11-01_120000-box").unwrap();

        let plan = plan_retention(&entries, 1, Some(&protect));
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].as_str(), "2025-11-02_120000-box");
    }

    #[test]
    fn test_plan_does_not_count_new_snapshot() {
        let mut entries = names(&[1, 2, 3]);
        entries.push("2025-11-27_143022-box".into());
        let protect = SnapshotName::parse("2025-11-27_143022-box").unwrap();

        let plan = plan_retention(&entries, 2, Some(&protect));
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].as_str(), "2025-11-01_120000-box");
        assert_eq!(plan.remaining(), 3);
    }

    #[test]
    fn test_plan_after_run_selects_nothing_more() {
        // What a run with cap 2 leaves behind: B, C and its own snapshot
        let mut entries = names(&[1, 2, 3]);
        let new = SnapshotName::parse("2025-11-27_143022-box").unwrap();
        entries.push(new.to_string());

        let after_run = plan_retention(&entries, 2, Some(&new));
        let left: Vec<String> = after_run
            .snapshots
            .iter()
            .filter(|n| !after_run.to_delete.contains(n))
            .map(|n| n.to_string())
            .collect();

        let standalone = plan_retention(&left, 2, None);
        assert!(standalone.to_delete.is_empty());
        assert_eq!(standalone.remaining(), 3);
    }

    #[test]
    fn test_enforce_unlimited_is_noop() {
        let transport = MemoryTransport::with_entries(&root(), &["2025-11-01_120000-box"]);
        let report = enforce(
            &transport,
            &root(),
            &RetentionPolicy::unlimited(),
            None,
            &CancellationToken::new(),
        );

        assert_eq!(report, RetentionReport::default());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_enforce_deletes_excess() {
        let entries = names(&[1, 2, 3, 4]);
        let refs: Vec<&str> = entries.iter().map(String::as_str).collect();
        let transport = MemoryTransport::with_entries(&root(), &refs);

        let report = enforce(&transport, &root(), &keep(1), None, &CancellationToken::new());

        assert_eq!(report.snapshots_found, 4);
        assert_eq!(report.deleted, names(&[1, 2]));
        assert!(!report.has_warnings());
        assert_eq!(transport.entries(&root()), names(&[3, 4]));
    }

    #[test]
    fn test_enforce_within_cap_touches_nothing() {
        let entries = names(&[1, 2]);
        let refs: Vec<&str> = entries.iter().map(String::as_str).collect();
        let transport = MemoryTransport::with_entries(&root(), &refs);

        let report = enforce(&transport, &root(), &keep(2), None, &CancellationToken::new());

        assert!(report.deleted.is_empty());
        assert!(transport.delete_calls().is_empty());
    }

    #[test]
    fn test_enforce_continues_after_failure() {
        let entries = names(&[1, 2, 3, 4]);
        let refs: Vec<&str> = entries.iter().map(String::as_str).collect();
        let transport = MemoryTransport::with_entries(&root(), &refs);
        transport.fail_delete(
            &root().join("2025-11-01_120000-box"),
            TransportError::PermissionDenied("locked".into()),
        );

        let report = enforce(&transport, &root(), &keep(1), None, &CancellationToken::new());

        assert_eq!(report.deleted, names(&[2]));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].snapshot, "2025-11-01_120000-box");
        assert!(report.has_warnings());
        assert_eq!(transport.delete_calls().len(), 2);
    }

    #[test]
    fn test_enforce_missing_root() {
        let transport = MemoryTransport::new();
        let report = enforce(&transport, &root(), &keep(2), None, &CancellationToken::new());

        assert!(report.list_error.is_none());
        assert_eq!(report.snapshots_found, 0);
    }

    #[test]
    fn test_enforce_list_failure_deletes_nothing() {
        let transport = MemoryTransport::with_entries(&root(), &["2025-11-01_120000-box"]);
        transport.fail_list(TransportError::Unreachable("offline".into()));

        let report = enforce(&transport, &root(), &keep(1), None, &CancellationToken::new());

        assert!(matches!(report.list_error, Some(TransportError::Unreachable(_))));
        assert!(transport.delete_calls().is_empty());
    }

    #[test]
    fn test_enforce_stops_when_cancelled() {
        let entries = names(&[1, 2, 3]);
        let refs: Vec<&str> = entries.iter().map(String::as_str).collect();
        let transport = MemoryTransport::with_entries(&root(), &refs);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = enforce(&transport, &root(), &keep(1), None, &cancel);

        assert!(report.cancelled);
        assert!(transport.delete_calls().is_empty());
    }
}
