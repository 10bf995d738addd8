//! In-memory transport
//!
//! A fake remote store for tests. Copies read the real local source tree but
//! land in a map keyed by remote path. Every call is recorded, and copy, list
//! and delete can each be told to fail.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use walkdir::WalkDir;

use super::{CopyOptions, CopyStats, Transport};
use crate::cancel::CancellationToken;
use crate::error::TransportError;
use crate::snapshot::RemotePath;

/// One recorded call against a `MemoryTransport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Copy { source: PathBuf, dest: String },
    List { dir: String },
    Delete { path: String },
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    calls: Vec<TransportCall>,
    transferred: Vec<String>,
    copy_failures: VecDeque<TransportError>,
    list_failure: Option<TransportError>,
    delete_failures: HashMap<String, TransportError>,
}

/// Transport that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds the given directories under `root`
    pub fn with_entries(root: &RemotePath, names: &[&str]) -> Self {
        let transport = Self::new();
        for name in names {
            transport.add_dir(&root.join(name));
        }
        transport
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an (empty) directory on the store
    pub fn add_dir(&self, path: &RemotePath) {
        self.state().dirs.insert(path.to_string());
    }

    /// Make the next copy fail with `error`
    ///
    /// Queued failures are consumed one per copy, in order.
    pub fn fail_next_copy(&self, error: TransportError) {
        self.state().copy_failures.push_back(error);
    }

    /// Make every list fail with `error`
    pub fn fail_list(&self, error: TransportError) {
        self.state().list_failure = Some(error);
    }

    /// Make deleting `path` fail with `error`
    pub fn fail_delete(&self, path: &RemotePath, error: TransportError) {
        self.state().delete_failures.insert(path.to_string(), error);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    /// Paths passed to `delete`, in order
    pub fn delete_calls(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Delete { path } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `copy` calls made so far
    pub fn copy_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, TransportCall::Copy { .. }))
            .count()
    }

    /// Remote file paths actually written by copies, in order
    pub fn transferred_files(&self) -> Vec<String> {
        self.state().transferred.clone()
    }

    /// Names directly under `dir`, sorted, without recording a call
    pub fn entries(&self, dir: &RemotePath) -> Vec<String> {
        children(&self.state(), &dir.to_string()).into_iter().collect()
    }

    /// Contents of a stored file
    pub fn file(&self, path: &RemotePath) -> Option<Vec<u8>> {
        self.state().files.get(&path.to_string()).cloned()
    }
}

/// Immediate children of `dir` among stored files and directories
fn children(state: &State, dir: &str) -> BTreeSet<String> {
    let prefix = format!("{}/", dir.trim_end_matches('/'));

    state
        .files
        .keys()
        .chain(state.dirs.iter())
        .filter_map(|key| key.strip_prefix(&prefix))
        .filter_map(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_under(key: &str, path: &str) -> bool {
    key == path
        || key
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl Transport for MemoryTransport {
    fn copy(
        &self,
        source: &Path,
        dest: &RemotePath,
        opts: &CopyOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<CopyStats>, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Copy {
            source: source.to_path_buf(),
            dest: dest.to_string(),
        });

        if let Some(error) = state.copy_failures.pop_front() {
            return Err(error);
        }
        cancel.check()?;

        if !source.is_dir() {
            return Err(TransportError::NotFound(format!(
                "source directory {}",
                source.display()
            )));
        }

        let dest = dest.to_string();
        state.dirs.insert(dest.clone());
        let mut stats = CopyStats::default();

        for entry in WalkDir::new(source).follow_links(opts.follow_links).min_depth(1) {
            let entry = entry.map_err(|e| TransportError::Unknown(e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| TransportError::Unknown(e.to_string()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let key = format!("{}/{}", dest, relative);

            if entry.file_type().is_dir() {
                if opts.preserve_empty_dirs {
                    state.dirs.insert(key);
                }
            } else if entry.file_type().is_file() {
                let contents = fs::read(entry.path())?;
                if state.files.get(&key) == Some(&contents) {
                    stats.files_skipped += 1;
                } else {
                    stats.files_transferred += 1;
                    stats.bytes_transferred += contents.len() as u64;
                    state.transferred.push(key.clone());
                    state.files.insert(key, contents);
                }
            }
        }

        Ok(Some(stats))
    }

    fn list(
        &self,
        dir: &RemotePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TransportError> {
        let mut state = self.state();
        let dir = dir.to_string();
        state.calls.push(TransportCall::List { dir: dir.clone() });
        cancel.check()?;

        if let Some(error) = &state.list_failure {
            return Err(error.clone());
        }

        let names = children(&state, &dir);
        if names.is_empty() && !state.dirs.contains(&dir) {
            return Err(TransportError::NotFound(dir));
        }

        // Newest first, so callers can't get away with trusting listing order
        Ok(names.into_iter().rev().collect())
    }

    fn delete(&self, path: &RemotePath, cancel: &CancellationToken) -> Result<(), TransportError> {
        let mut state = self.state();
        let path = path.to_string();
        state.calls.push(TransportCall::Delete { path: path.clone() });
        cancel.check()?;

        if let Some(error) = state.delete_failures.get(&path) {
            return Err(error.clone());
        }

        let before = state.files.len() + state.dirs.len();
        state.files.retain(|key, _| !is_under(key, &path));
        state.dirs.retain(|key| !is_under(key, &path));

        if state.files.len() + state.dirs.len() == before {
            return Err(TransportError::NotFound(path));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
