//! Path management for savesnap
//!
//! savesnap keeps no state of its own; the only file it looks for is an
//! optional `config.json` in the platform config directory.
//!
//! ## Path Resolution Order
//!
//! 1. `SAVESNAP_CONFIG_DIR` environment variable (if set)
//! 2. Linux: `$XDG_CONFIG_HOME/savesnap` or `~/.config/savesnap`
//! 3. macOS: `~/Library/Application Support/savesnap`
//! 4. Windows: `%APPDATA%\savesnap\config`

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::SavesnapError;

/// Locates savesnap's configuration files
#[derive(Debug, Clone)]
pub struct SavesnapPaths {
    config_dir: PathBuf,
}

impl SavesnapPaths {
    /// Resolve the config directory for the current user
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, SavesnapError> {
        if let Ok(custom) = std::env::var("SAVESNAP_CONFIG_DIR") {
            return Ok(Self::with_config_dir(PathBuf::from(custom)));
        }

        let dirs = ProjectDirs::from("", "", "savesnap").ok_or_else(|| {
            SavesnapError::Config("Could not determine the user config directory".into())
        })?;

        Ok(Self::with_config_dir(dirs.config_dir().to_path_buf()))
    }

    /// Use a custom config directory (useful for testing)
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the path to the default config file
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// The config file a command should read, if any
    ///
    /// An explicit path is always returned, whether or not it exists, so that
    /// a typo surfaces as an error. The default file is only used when present.
    pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        Self::new()
            .ok()
            .map(|paths| paths.config_file())
            .filter(|path| path.exists())
    }
}
