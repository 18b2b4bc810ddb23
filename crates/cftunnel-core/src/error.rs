//! Error types for the tunnel lifecycle library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using the cftunnel `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the tunnel lifecycle operations and their adapters.
#[derive(Debug, Error)]
pub enum Error {
    /// A tunnel directory with this name already exists in the config store.
    #[error("tunnel '{name}' already exists at {}", path.display())]
    AlreadyExists { name: String, path: PathBuf },

    /// No tunnel directory with this name exists in the config store.
    #[error("tunnel '{name}' not found")]
    NotFound { name: String },

    /// User-provided input was rejected before any side effect.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The external tool binary could not be located.
    #[error("{tool} not found; is it installed and on PATH?")]
    ExternalToolMissing { tool: String },

    /// The external tool did not finish within the configured timeout.
    #[error("{tool} did not finish within {timeout:?} and was killed")]
    ExternalToolTimeout { tool: String, timeout: Duration },

    /// The registry already has a tunnel identity with this name.
    #[error("registry already has a tunnel named '{name}': {message}")]
    NameConflict { name: String, message: String },

    /// The registry tool exited with a non-zero status.
    #[error("registry error: {0}")]
    Registry(String),

    /// The registry reported success but no credential file path could be
    /// located in its output. The identity may exist remotely.
    #[error("could not find the credentials file path in the registry output:\n{output}")]
    CredentialsNotFound { output: String },

    /// A privileged file or service operation was refused.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Unexpected I/O failure on the local filesystem.
    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The service supervisor rejected a command.
    #[error("service supervisor error: {0}")]
    Supervisor(String),
}

impl Error {
    /// Wrap an I/O error with a human-readable context line.
    pub fn fs(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            context: context.into(),
            source,
        }
    }
}
