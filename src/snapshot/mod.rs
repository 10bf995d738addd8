//! Snapshots and where they live
//!
//! A snapshot is one immutable, timestamped copy of the save directory stored
//! under the backup root. Each run creates a new one; existing snapshots are
//! never updated, only deleted by retention.

mod location;
mod name;

pub use location::RemotePath;
pub use name::{make_snapshot_name, Clock, FixedClock, HostId, SnapshotName, SystemClock, TIMESTAMP_FORMAT};

use serde::Serialize;

/// A snapshot written (or about to be written) under the backup root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Name of the snapshot directory
    pub name: SnapshotName,
    /// Full location on the remote store (`<backup root>/<name>`)
    pub remote_path: RemotePath,
}

impl Snapshot {
    /// Place a snapshot under a backup root
    pub fn new(backup_root: &RemotePath, name: SnapshotName) -> Self {
        let remote_path = backup_root.join(name.as_str());
        Self { name, remote_path }
    }
}
