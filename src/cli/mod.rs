//! CLI command handlers
//!
//! This module contains the implementation of CLI commands, bridging the
//! clap argument parsing with the backup engine. Every command accepts the
//! same configuration flags; each flag can also come from a `SAVESNAP_*`
//! environment variable or the JSON config file.

pub mod config;
pub mod output;
pub mod run;
pub mod snapshots;

pub use config::{handle_config_command, ShowConfigArgs};
pub use output::OutputFormat;
pub use run::{handle_run_command, RunArgs};
pub use snapshots::{handle_list_command, handle_prune_command, ListArgs, PruneArgs};

use std::path::PathBuf;

use clap::Args;

use crate::config::{BackupSettings, TransportKind};
use crate::error::SavesnapResult;
use crate::snapshot::RemotePath;
use crate::transport::{LocalTransport, RcloneTransport, Transport};

/// Configuration flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON config file (default: config.json in the user config directory)
    #[arg(long, env = "SAVESNAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local directory to back up
    #[arg(long, env = "SAVESNAP_SOURCE")]
    pub source: Option<PathBuf>,

    /// Directory under which snapshots live, as `remote:path` or a local path
    #[arg(long, env = "SAVESNAP_BACKUP_ROOT")]
    pub backup_root: Option<String>,

    /// Host identifier embedded in snapshot names (default: host name)
    #[arg(long, env = "SAVESNAP_HOST_ID")]
    pub host_id: Option<String>,

    /// Keep at most this many snapshots (default: keep all)
    #[arg(long, env = "SAVESNAP_MAX_BACKUPS", allow_negative_numbers = true)]
    pub max_backups: Option<i64>,

    /// Number of files transferred in parallel (default: 8)
    #[arg(long, env = "SAVESNAP_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Transport used to reach the backup root (default: auto)
    #[arg(long, env = "SAVESNAP_TRANSPORT", value_enum)]
    pub transport: Option<TransportKind>,

    /// Extra copy attempts after a transient failure (default: 2)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Seconds to wait between copy attempts (default: 10)
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,

    /// Don't recreate empty source directories in the snapshot
    #[arg(long)]
    pub no_empty_dirs: bool,

    /// Copy the targets of symbolic links
    #[arg(long)]
    pub follow_links: bool,

    /// Compare files by size and modification time instead of checksum
    #[arg(long)]
    pub no_checksum: bool,

    /// Path to the rclone executable
    #[arg(long, env = "SAVESNAP_RCLONE")]
    pub rclone_binary: Option<PathBuf>,
}

impl ConfigArgs {
    /// Settings given on the command line or through the environment
    ///
    /// Boolean switches only override the config file when they are set.
    pub fn overrides(&self) -> BackupSettings {
        BackupSettings {
            local_source: self.source.clone(),
            backup_root: self.backup_root.clone(),
            host_id: self.host_id.clone(),
            max_backups: self.max_backups,
            concurrency: self.concurrency,
            transport: self.transport,
            preserve_empty_dirs: self.no_empty_dirs.then_some(false),
            follow_links: self.follow_links.then_some(true),
            integrity_check: self.no_checksum.then_some(false),
            retries: self.retries,
            retry_delay_secs: self.retry_delay_secs,
            rclone_binary: self.rclone_binary.clone(),
            rclone_flags: None,
        }
    }

    /// The config file layer with command-line values on top
    pub fn settings(&self) -> SavesnapResult<BackupSettings> {
        Ok(BackupSettings::load_layer(self.config.as_deref())?.merge(self.overrides()))
    }
}

/// Build the transport that reaches `backup_root`
pub fn build_transport(
    settings: &BackupSettings,
    backup_root: &RemotePath,
) -> SavesnapResult<Box<dyn Transport>> {
    let transport: Box<dyn Transport> =
        match settings.transport.unwrap_or_default().resolve(backup_root)? {
            TransportKind::Rclone => Box::new(RcloneTransport::new(
                settings
                    .rclone_binary
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("rclone")),
                settings.rclone_flags.clone().unwrap_or_default(),
            )),
            TransportKind::Local | TransportKind::Auto => Box::new(LocalTransport::new()),
        };

    Ok(transport)
}
