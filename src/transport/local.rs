//! Local filesystem transport
//!
//! Treats a local (or mounted) directory as the remote store. Files are
//! copied on a dedicated rayon pool sized to the requested concurrency.
//! Each file is written to a uniquely named partial file next to its final
//! location and renamed into place, so an interrupted copy never leaves a
//! truncated file under the real name.

use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use super::{CopyOptions, CopyStats, Transport};
use crate::cancel::CancellationToken;
use crate::error::TransportError;
use crate::snapshot::RemotePath;

const BUFFER_SIZE: usize = 64 * 1024;

/// Transport backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

/// One file to copy
#[derive(Debug)]
struct FileJob {
    source: PathBuf,
    dest: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Transferred(u64),
    Skipped,
}

impl LocalTransport {
    /// Create a new LocalTransport
    pub fn new() -> Self {
        Self
    }

    fn resolve(&self, path: &RemotePath) -> Result<PathBuf, TransportError> {
        match path.remote() {
            Some(remote) => Err(TransportError::Unknown(format!(
                "local transport cannot reach remote '{}'",
                remote
            ))),
            None => Ok(path.to_local_path()),
        }
    }
}

impl Transport for LocalTransport {
    fn copy(
        &self,
        source: &Path,
        dest: &RemotePath,
        opts: &CopyOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<CopyStats>, TransportError> {
        cancel.check()?;
        let dest_root = self.resolve(dest)?;

        let source_meta = fs::metadata(source).map_err(|e| {
            TransportError::NotFound(format!("source {}: {}", source.display(), e))
        })?;
        if !source_meta.is_dir() {
            return Err(TransportError::Unknown(format!(
                "source {} is not a directory",
                source.display()
            )));
        }

        ensure_not_nested(source, &dest_root)?;
        fs::create_dir_all(&dest_root)?;

        let (dirs, files) = plan_copy(source, &dest_root, opts)?;
        debug!(
            "Copying {} file(s) from {} with {} worker(s)",
            files.len(),
            source.display(),
            opts.concurrency
        );

        if opts.preserve_empty_dirs {
            for dir in &dirs {
                fs::create_dir_all(dir)?;
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.concurrency.max(1))
            .thread_name(|i| format!("savesnap-copy-{}", i))
            .build()
            .map_err(|e| TransportError::Unknown(format!("failed to start copy workers: {}", e)))?;

        let outcomes: Vec<FileOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|job| {
                    cancel.check()?;
                    transfer_file(job, opts.integrity_check)
                })
                .collect::<Result<Vec<_>, TransportError>>()
        })?;

        let mut stats = CopyStats::default();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Transferred(bytes) => {
                    stats.files_transferred += 1;
                    stats.bytes_transferred += bytes;
                }
                FileOutcome::Skipped => stats.files_skipped += 1,
            }
        }

        Ok(Some(stats))
    }

    fn list(
        &self,
        dir: &RemotePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TransportError> {
        cancel.check()?;
        let dir = self.resolve(dir)?;

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        Ok(names)
    }

    fn delete(&self, path: &RemotePath, cancel: &CancellationToken) -> Result<(), TransportError> {
        cancel.check()?;
        let path = self.resolve(path)?;

        let meta = fs::symlink_metadata(&path)?;
        if meta.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Refuse to copy a directory into itself
///
/// Runs before the destination is created, so `dest_root` is resolved
/// through its deepest existing ancestor.
fn ensure_not_nested(source: &Path, dest_root: &Path) -> Result<(), TransportError> {
    let source = fs::canonicalize(source)?;
    let dest = canonicalize_partial(dest_root)?;

    if dest.starts_with(&source) {
        return Err(TransportError::Unknown(format!(
            "destination {} is inside source {}",
            dest.display(),
            source.display()
        )));
    }

    Ok(())
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the rest
fn canonicalize_partial(path: &Path) -> Result<PathBuf, TransportError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();

    loop {
        match fs::canonicalize(existing) {
            Ok(resolved) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(resolved, |acc: PathBuf, part| acc.join(part)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e.into());
                };
                missing.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Walk the source tree and work out which directories and files to copy
fn plan_copy(
    source: &Path,
    dest_root: &Path,
    opts: &CopyOptions,
) -> Result<(Vec<PathBuf>, Vec<FileJob>), TransportError> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(source).follow_links(opts.follow_links).min_depth(1) {
        let entry = entry.map_err(walk_error)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| TransportError::Unknown(e.to_string()))?;
        let target = dest_root.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            dirs.push(target);
        } else if file_type.is_file() {
            files.push(FileJob {
                source: entry.path().to_path_buf(),
                dest: target,
            });
        } else {
            debug!("Skipping {} (not a regular file)", entry.path().display());
        }
    }

    Ok((dirs, files))
}

fn walk_error(err: walkdir::Error) -> TransportError {
    let message = err.to_string();
    match err.into_io_error() {
        Some(io) => std::io::Error::new(io.kind(), message).into(),
        None => TransportError::Unknown(message),
    }
}

/// Copy one file unless an identical copy already exists
fn transfer_file(job: &FileJob, integrity_check: bool) -> Result<FileOutcome, TransportError> {
    let source_meta = fs::metadata(&job.source)?;

    if let Ok(dest_meta) = fs::metadata(&job.dest) {
        if dest_meta.is_file() && dest_meta.len() == source_meta.len() {
            let identical = if integrity_check {
                file_digest(&job.source)? == file_digest(&job.dest)?
            } else {
                matches!(
                    (source_meta.modified(), dest_meta.modified()),
                    (Ok(a), Ok(b)) if a == b
                )
            };

            if identical {
                return Ok(FileOutcome::Skipped);
            }
        }
    }

    let parent = job
        .dest
        .parent()
        .ok_or_else(|| TransportError::Unknown(format!("no parent for {}", job.dest.display())))?;
    fs::create_dir_all(parent)?;

    let file_name = job
        .dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = parent.join(format!(".{}.{}.partial", file_name, Uuid::new_v4().simple()));

    let result = write_partial(job, &partial, &source_meta, integrity_check)
        .and_then(|bytes| fs::rename(&partial, &job.dest).map(|_| bytes).map_err(Into::into));

    match result {
        Ok(bytes) => Ok(FileOutcome::Transferred(bytes)),
        Err(e) => {
            // Try to clean up the partial file if anything failed
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

/// Stream the source into `partial`, returning the number of bytes written
fn write_partial(
    job: &FileJob,
    partial: &Path,
    source_meta: &fs::Metadata,
    integrity_check: bool,
) -> Result<u64, TransportError> {
    let mut reader = BufReader::new(File::open(&job.source)?);
    let mut out = File::create(partial)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if integrity_check {
            hasher.update(&buf[..n]);
        }
        out.write_all(&buf[..n])?;
        written += n as u64;
    }

    out.flush()?;
    if let Ok(modified) = source_meta.modified() {
        out.set_modified(modified)?;
    }
    out.sync_all()?;
    drop(out);

    if integrity_check {
        let expected = hasher.finalize().to_vec();
        if file_digest(partial)? != expected {
            return Err(TransportError::Unknown(format!(
                "checksum mismatch writing {}",
                job.dest.display()
            )));
        }
    }

    Ok(written)
}

/// SHA-256 of a file's contents
fn file_digest(path: &Path) -> Result<Vec<u8>, TransportError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().to_vec())
}
