//! Remote storage transports
//!
//! The engine never talks to a storage backend directly. It goes through the
//! `Transport` trait, which offers exactly three operations:
//!
//! - `copy`: recursively copy a local directory to a remote path
//! - `list`: list the entry names directly under a remote directory
//! - `delete`: recursively delete a remote directory
//!
//! Transports own no state about snapshots; the remote store is the only
//! source of truth. They also never retry, retry policy lives with the caller.
//!
//! # Implementations
//!
//! - `LocalTransport`: another local or mounted filesystem, copied natively
//! - `RcloneTransport`: any rclone remote, driven through the `rclone` binary
//! - `MemoryTransport`: an in-memory fake that records calls, for tests

mod local;
mod memory;
mod rclone;

pub use local::LocalTransport;
pub use memory::{MemoryTransport, TransportCall};
pub use rclone::RcloneTransport;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::TransportError;
use crate::snapshot::RemotePath;

/// Default number of parallel file transfers
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Options controlling a recursive copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOptions {
    /// Recreate directories that contain no files
    pub preserve_empty_dirs: bool,
    /// Copy the targets of symbolic links instead of skipping the links
    pub follow_links: bool,
    /// Number of files transferred in parallel
    pub concurrency: usize,
    /// Compare and verify file contents by checksum rather than size and mtime
    pub integrity_check: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            preserve_empty_dirs: true,
            follow_links: false,
            concurrency: DEFAULT_CONCURRENCY,
            integrity_check: true,
        }
    }
}

/// What a copy did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    /// Files written to the destination
    pub files_transferred: u64,
    /// Files already present and identical at the destination
    pub files_skipped: u64,
    /// Bytes written to the destination
    pub bytes_transferred: u64,
}

impl CopyStats {
    /// Total number of files considered
    pub fn files_total(&self) -> u64 {
        self.files_transferred + self.files_skipped
    }
}

/// A capability over a remote store
///
/// Every operation takes the run's cancellation token; a backend that runs
/// long operations must abort them when it is raised.
pub trait Transport: Send + Sync {
    /// Recursively copy `source` into `dest`
    ///
    /// Must be safe to re-run against a partially populated `dest`: files
    /// already present and identical are skipped, not transferred again.
    /// Returns `None` when the backend does not report what it transferred.
    fn copy(
        &self,
        source: &Path,
        dest: &RemotePath,
        opts: &CopyOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<CopyStats>, TransportError>;

    /// Names of the entries directly under `dir`, in no particular order
    fn list(
        &self,
        dir: &RemotePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TransportError>;

    /// Recursively delete `path`
    fn delete(&self, path: &RemotePath, cancel: &CancellationToken) -> Result<(), TransportError>;

    /// Short human-readable name of the backend
    fn name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn copy(
        &self,
        source: &Path,
        dest: &RemotePath,
        opts: &CopyOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<CopyStats>, TransportError> {
        (**self).copy(source, dest, opts, cancel)
    }

    fn list(
        &self,
        dir: &RemotePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TransportError> {
        (**self).list(dir, cancel)
    }

    fn delete(&self, path: &RemotePath, cancel: &CancellationToken) -> Result<(), TransportError> {
        (**self).delete(path, cancel)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
