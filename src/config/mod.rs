//! Configuration module for savesnap
//!
//! This module provides:
//! - Platform config directory resolution
//! - Layered settings (config file, then command line and environment)
//! - Validation into the `BackupConfig` a run executes

pub mod paths;
pub mod settings;

pub use paths::SavesnapPaths;
pub use settings::{BackupConfig, BackupSettings, TransportKind};
