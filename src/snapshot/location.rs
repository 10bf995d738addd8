//! Remote locations
//!
//! A backup root is either a plain filesystem path (`/mnt/nas/saves`) or a
//! remote identifier followed by a sub-path (`gdrive:satisfactory-backups`),
//! the way rclone addresses its remotes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SavesnapError;

/// A path on the remote store, optionally qualified by a remote identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath {
    remote: Option<String>,
    path: String,
}

impl RemotePath {
    /// A path on the local filesystem
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            remote: None,
            path: path.into().to_string_lossy().into_owned(),
        }
    }

    /// A path on a named remote
    pub fn on_remote(remote: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            remote: Some(remote.into()),
            path: path.into(),
        }
    }

    /// The remote identifier, if any
    pub fn remote(&self) -> Option<&str> {
        self.remote.as_deref()
    }

    /// The path part, without the remote identifier
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this location lives on a named remote rather than a local path
    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// The path as a local filesystem path
    pub fn to_local_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Append one entry name to this location
    pub fn join(&self, name: &str) -> Self {
        let path = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path.trim_end_matches('/'), name)
        };

        Self {
            remote: self.remote.clone(),
            path,
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.remote {
            Some(remote) => write!(f, "{}:{}", remote, self.path),
            None => f.write_str(&self.path),
        }
    }
}

impl FromStr for RemotePath {
    type Err = SavesnapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SavesnapError::Config("backup root must not be empty".into()));
        }

        if let Some((remote, path)) = s.split_once(':') {
            // A single letter before the colon is a Windows drive, not a remote
            let is_remote = remote.len() > 1
                && remote
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '));

            if is_remote {
                return Ok(Self::on_remote(remote, path));
            }
        }

        Ok(Self::local(s))
    }
}

impl TryFrom<String> for RemotePath {
    type Error = SavesnapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote() {
        let root: RemotePath = "gdrive:/satisfactory-backups".parse().unwrap();
        assert_eq!(root.remote(), Some("gdrive"));
        assert_eq!(root.path(), "/satisfactory-backups");
        assert!(root.is_remote());
        assert_eq!(root.to_string(), "gdrive:/satisfactory-backups");
    }

    #[test]
    fn test_parse_remote_root_path() {
        let root: RemotePath = "s3-bucket:".parse().unwrap();
        assert_eq!(root.remote(), Some("s3-bucket"));
        assert_eq!(root.path(), "");
        assert_eq!(root.join("snap").to_string(), "s3-bucket:snap");
    }

    #[test]
    fn test_parse_local() {
        let root: RemotePath = "/mnt/nas/saves".parse().unwrap();
        assert_eq!(root.remote(), None);
        assert_eq!(root.to_local_path(), PathBuf::from("/mnt/nas/saves"));

        // Colons later in a path don't make it remote
        let root: RemotePath = "/srv/odd:name".parse().unwrap();
        assert!(!root.is_remote());

        let root: RemotePath = "C:\\Backups".parse().unwrap();
        assert!(!root.is_remote());
    }

    #[test]
    fn test_parse_empty() {
        assert!("   ".parse::<RemotePath>().unwrap_err().is_config());
    }

    #[test]
    fn test_join() {
        let root: RemotePath = "gdrive:/backups/".parse().unwrap();
        let snap = root.join("2025-11-27_143022-box");
        assert_eq!(snap.to_string(), "gdrive:/backups/2025-11-27_143022-box");

        let local = RemotePath::local("/tmp/backups");
        assert_eq!(local.join("a").path(), "/tmp/backups/a");
    }
}
