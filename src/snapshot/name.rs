//! Snapshot naming
//!
//! A snapshot name is `<timestamp>-<host>` where the timestamp uses a fixed
//! width `YYYY-MM-DD_HHMMSS` layout. Because the most significant field comes
//! first, sorting names as plain strings sorts them chronologically, which is
//! what retention relies on instead of parsing dates.

use std::ffi::OsString;
use std::fmt;
use std::io;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SavesnapError;

/// strftime layout of the timestamp part of a snapshot name
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Character length of a formatted timestamp (`2025-11-27_143022`)
const TIMESTAMP_LEN: usize = 17;

/// Source of wall-clock time for naming snapshots
pub trait Clock: Send + Sync {
    /// Current local wall-clock time
    fn now(&self) -> NaiveDateTime;
}

/// The system's local clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at a given instant (useful for testing)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// A validated host tag
///
/// Only ASCII alphanumerics, `-`, `_` and `.` are allowed, so a host tag can
/// never introduce a path separator into a remote path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostId(String);

impl HostId {
    /// Validate and wrap a host tag
    pub fn new(value: impl Into<String>) -> Result<Self, SavesnapError> {
        let value = value.into();

        if value.is_empty() {
            return Err(SavesnapError::Config("host id must not be empty".into()));
        }

        if let Some(bad) = value.chars().find(|c| !is_host_char(*c)) {
            return Err(SavesnapError::Config(format!(
                "host id '{}' contains invalid character '{}'",
                value, bad
            )));
        }

        Ok(Self(value))
    }

    /// Detect the local host name and reduce it to a valid tag
    ///
    /// Asks the operating system, not the environment. Only the part before
    /// the first `.` is kept; `localhost` is used if the lookup fails.
    pub fn detect() -> Self {
        Self::from_lookup(hostname::get())
    }

    fn from_lookup(lookup: io::Result<OsString>) -> Self {
        match lookup {
            Ok(name) => Self::sanitize(name.to_string_lossy().trim()),
            Err(e) => {
                debug!("Could not look up the host name: {}", e);
                Self("localhost".to_string())
            }
        }
    }

    /// Turn an arbitrary host name into a valid tag
    fn sanitize(name: &str) -> Self {
        let short = name.split('.').next().unwrap_or(name);
        let cleaned: String = short
            .chars()
            .map(|c| if is_host_char(c) { c } else { '-' })
            .collect();

        if cleaned.is_empty() {
            Self("localhost".to_string())
        } else {
            Self(cleaned)
        }
    }

    /// Get the tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HostId {
    type Error = SavesnapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HostId> for String {
    fn from(host: HostId) -> Self {
        host.0
    }
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// The name of one snapshot under the backup root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct SnapshotName {
    name: String,
    created_at: NaiveDateTime,
}

impl SnapshotName {
    /// Build the name for a snapshot taken at `timestamp` on `host`
    pub fn new(timestamp: NaiveDateTime, host: &HostId) -> Self {
        Self {
            name: format!("{}-{}", timestamp.format(TIMESTAMP_FORMAT), host),
            created_at: timestamp,
        }
    }

    /// Recognize a well-formed snapshot name
    ///
    /// Returns `None` for anything that isn't `<timestamp>-<host>`, so stray
    /// objects under the backup root are never mistaken for snapshots.
    pub fn parse(name: &str) -> Option<Self> {
        let stamp = name.get(..TIMESTAMP_LEN)?;
        let host = name.get(TIMESTAMP_LEN..)?.strip_prefix('-')?;

        let created_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        // Round-trip guards against layouts chrono accepts loosely
        if created_at.format(TIMESTAMP_FORMAT).to_string() != stamp {
            return None;
        }
        let host = HostId::new(host).ok()?;

        Some(Self::new(created_at, &host))
    }

    /// The full name
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// When the snapshot was taken, in local wall-clock time
    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    /// The host part of the name
    pub fn host(&self) -> &str {
        &self.name[TIMESTAMP_LEN + 1..]
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<SnapshotName> for String {
    fn from(name: SnapshotName) -> Self {
        name.name
    }
}

/// Derive the name for a new snapshot from the clock and host tag
pub fn make_snapshot_name(clock: &dyn Clock, host: &HostId) -> SnapshotName {
    SnapshotName::new(clock.now(), host)
}
