//! rclone transport
//!
//! Drives the `rclone` binary for any remote it knows about (object storage,
//! SFTP, cloud drives). rclone already skips files that are identical at the
//! destination, which gives `copy` its resume-on-rerun behaviour. Every
//! invocation, including a `purge` during pruning, is killed when the run is
//! cancelled.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{CopyOptions, CopyStats, Transport};
use crate::cancel::CancellationToken;
use crate::error::TransportError;
use crate::snapshot::RemotePath;

/// How often a running rclone process is checked for exit or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Transport that shells out to rclone
#[derive(Debug, Clone)]
pub struct RcloneTransport {
    binary: PathBuf,
    extra_args: Vec<String>,
}

/// Captured result of one rclone invocation
#[derive(Debug)]
struct Invocation {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl RcloneTransport {
    /// Create a transport that runs `binary` with `extra_args` appended to every call
    pub fn new(binary: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args,
        }
    }

    /// Arguments for `rclone copy`
    fn copy_args(&self, source: &Path, dest: &RemotePath, opts: &CopyOptions) -> Vec<String> {
        let mut args = vec![
            "copy".to_string(),
            source.to_string_lossy().into_owned(),
            dest.to_string(),
            "--transfers".to_string(),
            opts.concurrency.max(1).to_string(),
        ];

        if opts.preserve_empty_dirs {
            args.push("--create-empty-src-dirs".to_string());
        }
        if opts.follow_links {
            args.push("--copy-links".to_string());
        }
        if opts.integrity_check {
            args.push("--checksum".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn list_args(&self, dir: &RemotePath) -> Vec<String> {
        let mut args = vec!["lsf".to_string(), "--dirs-only".to_string(), dir.to_string()];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn delete_args(&self, path: &RemotePath) -> Vec<String> {
        let mut args = vec!["purge".to_string(), path.to_string()];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Run rclone to completion, killing it if `cancel` is raised
    fn invoke(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<Invocation, TransportError> {
        cancel.check()?;
        debug!("Running: {} {}", self.binary.display(), args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TransportError::Unknown(format!(
                    "failed to start {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        // Drain both pipes on their own threads so a chatty rclone can't block
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_or_cancel(&mut child, cancel);

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        Ok(Invocation {
            status: status?,
            stdout,
            stderr,
        })
    }

    fn run(&self, args: &[String], cancel: &CancellationToken) -> Result<String, TransportError> {
        let invocation = self.invoke(args, cancel)?;

        if invocation.status.success() {
            Ok(invocation.stdout)
        } else {
            Err(classify_failure(invocation.status.code(), &invocation.stderr))
        }
    }
}

impl Default for RcloneTransport {
    fn default() -> Self {
        Self::new("rclone", Vec::new())
    }
}

impl Transport for RcloneTransport {
    fn copy(
        &self,
        source: &Path,
        dest: &RemotePath,
        opts: &CopyOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<CopyStats>, TransportError> {
        cancel.check()?;

        if !source.is_dir() {
            return Err(TransportError::NotFound(format!(
                "source directory {}",
                source.display()
            )));
        }

        self.run(&self.copy_args(source, dest, opts), cancel)?;

        // rclone reports transfer counts only in its human-oriented log output
        Ok(None)
    }

    fn list(
        &self,
        dir: &RemotePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TransportError> {
        let output = self.run(&self.list_args(dir), cancel)?;
        Ok(parse_lsf(&output))
    }

    fn delete(&self, path: &RemotePath, cancel: &CancellationToken) -> Result<(), TransportError> {
        self.run(&self.delete_args(path), cancel)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rclone"
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

fn wait_or_cancel(child: &mut Child, cancel: &CancellationToken) -> Result<ExitStatus, TransportError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                return Err(e.into());
            }
        }

        if cancel.is_cancelled() {
            debug!("Cancellation requested, stopping rclone (pid {})", child.id());
            let _ = child.kill();
            let _ = child.wait();
            return Err(TransportError::Cancelled);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Entry names from `rclone lsf --dirs-only` output
fn parse_lsf(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim_end_matches('/'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Map an rclone exit code and its stderr to a transport error
///
/// Exit codes follow rclone's documented list: 3 directory not found,
/// 4 file not found, 5 temporary error.
fn classify_failure(code: Option<i32>, stderr: &str) -> TransportError {
    let detail = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("rclone exited without output")
        .to_string();

    let lowered = stderr.to_lowercase();
    if lowered.contains("permission denied")
        || lowered.contains("access denied")
        || lowered.contains("accessdenied")
        || lowered.contains("403 forbidden")
    {
        return TransportError::PermissionDenied(detail);
    }

    match code {
        Some(3) | Some(4) => TransportError::NotFound(detail),
        Some(5) => TransportError::Unreachable(detail),
        Some(code) => TransportError::Unknown(format!("rclone exited with {}: {}", code, detail)),
        None => TransportError::Unknown(format!("rclone terminated by signal: {}", detail)),
    }
}
