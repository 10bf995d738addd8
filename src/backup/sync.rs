//! Sync executor
//!
//! Copies the local save directory into a new snapshot under the backup
//! root. The snapshot name is fixed before the first attempt, so retries
//! resume into the same destination instead of scattering partial copies.
//! A name that is already taken on the remote (two runs within the same
//! second) fails the run rather than writing into the older snapshot.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::error::TransportError;
use crate::snapshot::{make_snapshot_name, Clock, HostId, RemotePath, Snapshot};
use crate::transport::{CopyOptions, CopyStats, Transport};

const CANCEL_POLL: Duration = Duration::from_millis(100);

/// How often to retry a failed copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub retries: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Try once and give up
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_secs(10),
        }
    }
}

/// A snapshot that was written successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub snapshot: Snapshot,
    /// Transfer counts, when the transport reports them
    pub stats: Option<CopyStats>,
    /// Number of copy attempts made, including the successful one
    pub attempts: u32,
}

/// Drives the copy of one backup run
pub struct SyncExecutor<'a> {
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
    retry: RetryPolicy,
}

impl<'a> SyncExecutor<'a> {
    /// Create a new SyncExecutor
    pub fn new(transport: &'a dyn Transport, clock: &'a dyn Clock, retry: RetryPolicy) -> Self {
        Self {
            transport,
            clock,
            retry,
        }
    }

    /// Copy `source` into a new snapshot under `backup_root`
    ///
    /// An empty source still produces a (empty) snapshot. A missing source
    /// fails with `NotFound` before anything is sent to the remote.
    pub fn run_sync(
        &self,
        source: &Path,
        backup_root: &RemotePath,
        host: &HostId,
        opts: &CopyOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, TransportError> {
        let is_empty = match fs::read_dir(source) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) => {
                return Err(TransportError::NotFound(format!(
                    "source {}: {}",
                    source.display(),
                    e
                )))
            }
        };
        if is_empty {
            warn!("Source {} is empty, the snapshot will be empty too", source.display());
        }

        let snapshot = Snapshot::new(backup_root, make_snapshot_name(self.clock, host));
        self.ensure_new(backup_root, &snapshot, cancel)?;

        let max_attempts = self.retry.retries + 1;
        let mut attempt = 1;

        loop {
            cancel.check()?;
            info!(
                "Copying {} to {} (attempt {}/{})",
                source.display(),
                snapshot.remote_path,
                attempt,
                max_attempts
            );

            match self
                .transport
                .copy(source, &snapshot.remote_path, opts, cancel)
            {
                Ok(stats) => {
                    return Ok(SyncOutcome {
                        snapshot,
                        stats,
                        attempts: attempt,
                    })
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "Copy attempt {} failed: {}; retrying in {}s",
                        attempt,
                        e,
                        self.retry.delay.as_secs()
                    );
                    wait(self.retry.delay, cancel)?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fail if a snapshot with the same name is already under `backup_root`
    ///
    /// A listing failure other than a missing root is only logged; the copy
    /// that follows reports (and retries) connectivity problems.
    fn ensure_new(
        &self,
        backup_root: &RemotePath,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        match self.transport.list(backup_root, cancel) {
            Ok(entries) if entries.iter().any(|e| e == snapshot.name.as_str()) => Err(
                TransportError::AlreadyExists(format!("snapshot {}", snapshot.remote_path)),
            ),
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(TransportError::Cancelled) => Err(TransportError::Cancelled),
            Err(e) => {
                warn!("Could not check {} for existing snapshots: {}", backup_root, e);
                Ok(())
            }
        }
    }
}

/// Sleep for `delay`, waking early if the run is cancelled
fn wait(delay: Duration, cancel: &CancellationToken) -> Result<(), TransportError> {
    let deadline = Instant::now() + delay;

    loop {
        cancel.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep(CANCEL_POLL.min(deadline - now));
    }
}
