//! Backup settings for savesnap
//!
//! Settings come from up to two layers: a JSON config file and the command
//! line (each flag also readable from a `SAVESNAP_*` environment variable).
//! Command-line values win. The merged `BackupSettings` is then validated
//! into a `BackupConfig`, which is what the engine actually runs on.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::SavesnapPaths;
use crate::backup::{RetentionPolicy, RetryPolicy};
use crate::error::{SavesnapError, SavesnapResult};
use crate::snapshot::{HostId, RemotePath};
use crate::transport::{CopyOptions, DEFAULT_CONCURRENCY};

/// Which transport carries the snapshot to the backup root
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// rclone for `remote:path` roots, the local filesystem otherwise
    #[default]
    Auto,
    /// Native copy to a local or mounted filesystem
    Local,
    /// The external `rclone` binary
    Rclone,
}

impl TransportKind {
    /// Pick a concrete transport for `backup_root`
    pub fn resolve(self, backup_root: &RemotePath) -> SavesnapResult<Self> {
        match self {
            Self::Auto if backup_root.is_remote() => Ok(Self::Rclone),
            Self::Auto => Ok(Self::Local),
            Self::Local if backup_root.is_remote() => Err(SavesnapError::Config(format!(
                "the local transport cannot reach remote backup root {}",
                backup_root
            ))),
            other => Ok(other),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Local => write!(f, "local"),
            Self::Rclone => write!(f, "rclone"),
        }
    }
}

/// Raw, unvalidated settings as read from a config file or the command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupSettings {
    /// Directory whose contents are backed up
    #[serde(alias = "localSource", skip_serializing_if = "Option::is_none")]
    pub local_source: Option<PathBuf>,

    /// Directory under which snapshots are created, `remote:path` or a path
    #[serde(alias = "backupRoot", skip_serializing_if = "Option::is_none")]
    pub backup_root: Option<String>,

    /// Host identifier embedded in snapshot names
    #[serde(alias = "hostId", skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,

    /// Retention cap; absent keeps every snapshot
    #[serde(alias = "maxBackups", skip_serializing_if = "Option::is_none")]
    pub max_backups: Option<i64>,

    /// Parallel file transfers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_empty_dirs: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_links: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_check: Option<bool>,

    /// Extra copy attempts after a transient failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_secs: Option<u64>,

    /// Path or name of the rclone executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rclone_binary: Option<PathBuf>,

    /// Extra flags appended to every rclone invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rclone_flags: Option<Vec<String>>,
}

/// Fully validated configuration for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupConfig {
    pub local_source: PathBuf,
    pub backup_root: RemotePath,
    pub host_id: HostId,
    pub retention: RetentionPolicy,
    pub copy: CopyOptions,
    pub retry: RetryPolicy,
    /// Concrete transport, never `Auto`
    pub transport: TransportKind,
    pub rclone_binary: PathBuf,
    pub rclone_flags: Vec<String>,
}

impl BackupSettings {
    /// Load settings from a JSON config file
    pub fn load(path: &Path) -> SavesnapResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SavesnapError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            SavesnapError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load the config file layer
    ///
    /// An explicit path must exist. Without one, the default config file is
    /// read if present; otherwise the layer is empty.
    pub fn load_layer(explicit: Option<&Path>) -> SavesnapResult<Self> {
        match SavesnapPaths::find_config_file(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Overlay `overrides` on top of these settings
    pub fn merge(self, overrides: BackupSettings) -> Self {
        Self {
            local_source: overrides.local_source.or(self.local_source),
            backup_root: overrides.backup_root.or(self.backup_root),
            host_id: overrides.host_id.or(self.host_id),
            max_backups: overrides.max_backups.or(self.max_backups),
            concurrency: overrides.concurrency.or(self.concurrency),
            transport: overrides.transport.or(self.transport),
            preserve_empty_dirs: overrides.preserve_empty_dirs.or(self.preserve_empty_dirs),
            follow_links: overrides.follow_links.or(self.follow_links),
            integrity_check: overrides.integrity_check.or(self.integrity_check),
            retries: overrides.retries.or(self.retries),
            retry_delay_secs: overrides.retry_delay_secs.or(self.retry_delay_secs),
            rclone_binary: overrides.rclone_binary.or(self.rclone_binary),
            rclone_flags: overrides.rclone_flags.or(self.rclone_flags),
        }
    }

    /// The backup root alone, for commands that never touch the source
    pub fn backup_root(&self) -> SavesnapResult<RemotePath> {
        self.backup_root
            .as_deref()
            .ok_or_else(|| {
                SavesnapError::Config(
                    "backup root is required (--backup-root or SAVESNAP_BACKUP_ROOT)".into(),
                )
            })?
            .parse()
    }

    /// The retention policy alone
    pub fn retention(&self) -> SavesnapResult<RetentionPolicy> {
        RetentionPolicy::from_setting(self.max_backups)
    }

    /// Check every value and produce the configuration a run uses
    pub fn validate(&self) -> SavesnapResult<BackupConfig> {
        let local_source = self.local_source.clone().ok_or_else(|| {
            SavesnapError::Config("source directory is required (--source or SAVESNAP_SOURCE)".into())
        })?;
        let backup_root = self.backup_root()?;
        let host_id = match &self.host_id {
            Some(id) => HostId::new(id.as_str())?,
            None => HostId::detect(),
        };

        let concurrency = NonZeroUsize::new(self.concurrency.unwrap_or(DEFAULT_CONCURRENCY))
            .ok_or_else(|| SavesnapError::Config("concurrency must be at least 1".into()))?;
        let defaults = CopyOptions::default();
        let copy = CopyOptions {
            preserve_empty_dirs: self
                .preserve_empty_dirs
                .unwrap_or(defaults.preserve_empty_dirs),
            follow_links: self.follow_links.unwrap_or(defaults.follow_links),
            concurrency: concurrency.get(),
            integrity_check: self.integrity_check.unwrap_or(defaults.integrity_check),
        };

        let default_retry = RetryPolicy::default();
        let retry = RetryPolicy {
            retries: self.retries.unwrap_or(default_retry.retries),
            delay: self
                .retry_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(default_retry.delay),
        };

        Ok(BackupConfig {
            local_source,
            transport: self.transport.unwrap_or_default().resolve(&backup_root)?,
            backup_root,
            host_id,
            retention: self.retention()?,
            copy,
            retry,
            rclone_binary: self
                .rclone_binary
                .clone()
                .unwrap_or_else(|| PathBuf::from("rclone")),
            rclone_flags: self.rclone_flags.clone().unwrap_or_default(),
        })
    }
}
