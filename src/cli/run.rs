//! Run CLI command
//!
//! Performs one backup: sync, then retention. The report goes to stdout;
//! progress is logged to stderr.

use anyhow::Context;
use clap::Args;
use tracing::debug;

use super::output::{print_output, OutputFormat};
use super::{build_transport, ConfigArgs};
use crate::backup;
use crate::cancel::CancellationToken;
use crate::snapshot::SystemClock;

/// Arguments for `savesnap run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Handle `savesnap run`, returning the process exit code
pub fn handle_run_command(args: &RunArgs, cancel: &CancellationToken) -> anyhow::Result<u8> {
    let settings = args.config.settings()?;
    let config = settings.validate()?;
    debug!("Resolved configuration: {:?}", config);

    let transport = build_transport(&settings, &config.backup_root)?;
    let report = backup::run(&config, transport.as_ref(), &SystemClock, cancel);

    print_output(&report, args.format, || report.summary())
        .context("Failed to print the run report")?;

    Ok(report.exit_code())
}
