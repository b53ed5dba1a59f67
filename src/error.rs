//! Error types and exit codes for the registry service

use std::process::ExitCode;
use thiserror::Error;

use crate::store::EntryId;

/// Main error type for registry operations
///
/// Semantic errors (`BadFormat`, `IncompleteData`, `EntryNotFound`,
/// `StringNotFound`) come back from the server as `-ERR` lines and are never
/// retried. Transport errors (`Connection`, `Disconnected`, `Io`) mean the
/// request may not have been applied.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("bad format: {message}")]
    BadFormat { message: String },

    #[error("incomplete data: {message}")]
    IncompleteData { message: String },

    #[error("no such entry ID: {id}")]
    EntryNotFound { id: EntryId },

    #[error("no such string ID {pos} in entry {id}")]
    StringNotFound { id: EntryId, pos: usize },

    #[error("unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("server error: {message}")]
    Server { message: String },

    #[error("unexpected response from registry: {line}")]
    Protocol { line: String },

    #[error("registry closed the connection")]
    Disconnected,

    #[error("cannot connect to registry at {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    pub fn bad_format(message: impl Into<String>) -> Self {
        Self::BadFormat {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for errors caused by the transport rather than by the request
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Disconnected | Self::Io(_)
        )
    }

    /// Convert error to a process exit code:
    /// - 1: IO / connection failure
    /// - 2: bad format or unknown command
    /// - 3: incomplete data
    /// - 4: entry or string not found
    /// - 5: protocol violation or unclassified server error
    /// - 6: configuration error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Connection { .. } | Self::Disconnected | Self::Io(_) => ExitCode::from(1),
            Self::BadFormat { .. } | Self::UnknownCommand { .. } => ExitCode::from(2),
            Self::IncompleteData { .. } => ExitCode::from(3),
            Self::EntryNotFound { .. } | Self::StringNotFound { .. } => ExitCode::from(4),
            Self::Server { .. } | Self::Protocol { .. } => ExitCode::from(5),
            Self::Config { .. } => ExitCode::from(6),
        }
    }
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
