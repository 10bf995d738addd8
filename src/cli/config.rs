//! Config CLI command
//!
//! Shows the configuration a `run` would use, after layering the config file,
//! environment and flags. Fails with a configuration error exactly where
//! `run` would.

use std::fmt::Write as _;

use clap::Args;
use serde::Serialize;

use super::output::{print_output, OutputFormat};
use super::ConfigArgs;
use crate::config::{BackupConfig, SavesnapPaths};

/// Arguments for `savesnap config`
#[derive(Args, Debug, Clone)]
pub struct ShowConfigArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct ConfigView<'a> {
    config_file: Option<String>,
    #[serde(flatten)]
    config: &'a BackupConfig,
}

fn describe(config: &BackupConfig, config_file: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "savesnap Configuration");
    let _ = writeln!(out, "======================");
    let _ = writeln!(out, "Config file:      {}", config_file.unwrap_or("(none)"));
    let _ = writeln!(out, "Source:           {}", config.local_source.display());
    let _ = writeln!(out, "Backup root:      {}", config.backup_root);
    let _ = writeln!(out, "Host id:          {}", config.host_id);
    match config.retention.max_backups() {
        Some(max) => {
            let _ = writeln!(out, "Max backups:      {}", max);
        }
        None => {
            let _ = writeln!(out, "Max backups:      unlimited");
        }
    }
    let _ = writeln!(out, "Transport:        {}", config.transport);
    let _ = writeln!(out, "Concurrency:      {}", config.copy.concurrency);
    let _ = writeln!(out, "Empty dirs:       {}", config.copy.preserve_empty_dirs);
    let _ = writeln!(out, "Follow links:     {}", config.copy.follow_links);
    let _ = writeln!(out, "Checksums:        {}", config.copy.integrity_check);
    let _ = writeln!(
        out,
        "Retries:          {} ({}s apart)",
        config.retry.retries,
        config.retry.delay.as_secs()
    );
    if config.transport == crate::config::TransportKind::Rclone {
        let _ = writeln!(out, "rclone binary:    {}", config.rclone_binary.display());
        if !config.rclone_flags.is_empty() {
            let _ = writeln!(out, "rclone flags:     {}", config.rclone_flags.join(" "));
        }
    }
    out
}

/// Handle `savesnap config`
pub fn handle_config_command(args: &ShowConfigArgs) -> anyhow::Result<u8> {
    let config_file = SavesnapPaths::find_config_file(args.config.config.as_deref())
        .map(|path| path.display().to_string());
    let config = args.config.settings()?.validate()?;

    let view = ConfigView {
        config_file: config_file.clone(),
        config: &config,
    };
    print_output(&view, args.format, || {
        describe(&config, config_file.as_deref())
    })?;

    Ok(0)
}
