use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use savesnap::cancel::CancellationToken;
use savesnap::cli::{
    handle_config_command, handle_list_command, handle_prune_command, handle_run_command, ListArgs,
    PruneArgs, RunArgs, ShowConfigArgs,
};
use savesnap::SavesnapError;

#[derive(Parser)]
#[command(
    name = "savesnap",
    author = "Kaylee Beyene",
    version,
    about = "Rolling snapshot backups for game save directories",
    long_about = "savesnap copies a local save directory into a new timestamped \
                  snapshot under a backup root (a local path or any rclone remote), \
                  then deletes the oldest snapshots beyond the retention cap."
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a snapshot, then apply retention
    Run(RunArgs),

    /// List the snapshots under the backup root
    #[command(alias = "ls")]
    List(ListArgs),

    /// Delete snapshots beyond the retention cap
    Prune(PruneArgs),

    /// Show the resolved configuration
    Config(ShowConfigArgs),
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    // Ctrl-C and SIGTERM stop the run at the next checkpoint
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupted, stopping");
        on_signal.cancel();
    }) {
        warn!("Could not install the interrupt handler: {}", e);
    }

    let result = match &cli.command {
        Commands::Run(args) => handle_run_command(args, &cancel),
        Commands::List(args) => handle_list_command(args, &cancel),
        Commands::Prune(args) => handle_prune_command(args, &cancel),
        Commands::Config(args) => handle_config_command(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<SavesnapError>()
                .map(SavesnapError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}
