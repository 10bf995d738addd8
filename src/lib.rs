//! savesnap - rolling snapshot backups for game save directories
//!
//! This library copies a local save directory into timestamped, immutable
//! snapshots under a backup root (a local path or any rclone remote) and
//! keeps the number of snapshots under a retention cap.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration layering, validation and path management
//! - `error`: Custom error types
//! - `snapshot`: Snapshot names, host ids and remote locations
//! - `transport`: The copy/list/delete capability over a remote store
//! - `cancel`: The cancellation signal shared by a run
//! - `backup`: Sync, retention and the run orchestrator
//! - `cli`: Command handlers for the `savesnap` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use savesnap::backup;
//! use savesnap::cancel::CancellationToken;
//! use savesnap::config::BackupSettings;
//! use savesnap::snapshot::SystemClock;
//! use savesnap::transport::LocalTransport;
//!
//! let config = BackupSettings::load_layer(None)?.validate()?;
//! let report = backup::run(&config, &LocalTransport::new(), &SystemClock, &CancellationToken::new());
//! std::process::exit(report.exit_code().into());
//! ```

pub mod backup;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod transport;

pub use error::{SavesnapError, SavesnapResult, TransportError};
