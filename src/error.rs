//! Custom error types for savesnap
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.
//!
//! Two layers exist:
//!
//! - `TransportError`: what a remote store can report back for a single
//!   copy, list or delete call
//! - `SavesnapError`: everything the engine and CLI can fail with, including
//!   configuration problems

use serde::Serialize;
use thiserror::Error;

/// Errors reported by a transport for a single operation
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransportError {
    /// The remote store could not be reached
    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    /// The remote store refused the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The source or remote path does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A snapshot with the same name is already on the remote store
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The operation was aborted by a cancellation signal
    #[error("operation cancelled")]
    Cancelled,

    /// Anything the transport could not classify
    #[error("transport error: {0}")]
    Unknown(String),
}

impl TransportError {
    /// Whether a repeated attempt of the same operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Unknown(_))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::TimedOut => Self::Unreachable(err.to_string()),
            _ => Self::Unknown(err.to_string()),
        }
    }
}

/// The main error type for savesnap operations
#[derive(Error, Debug)]
pub enum SavesnapError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from the remote store
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Report or config serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The run was interrupted before it could finish
    #[error("Run cancelled")]
    Cancelled,
}

impl SavesnapError {
    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Process exit code for this error
    ///
    /// Configuration problems exit with 2, everything else with 1.
    pub fn exit_code(&self) -> u8 {
        if self.is_config() {
            2
        } else {
            1
        }
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for SavesnapError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SavesnapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for savesnap operations
pub type SavesnapResult<T> = Result<T, SavesnapError>;
