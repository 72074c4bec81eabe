//! Telemetry error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level or a directive is not valid `EnvFilter` syntax.
    #[error("invalid log filter {directive:?}: {reason}")]
    InvalidFilter {
        /// The offending level or directive.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// The format name is none of `pretty`, `compact`, `json`, `full`.
    #[error("unknown log format {0:?}")]
    UnknownFormat(String),

    /// The log directory could not be created.
    #[error("cannot create log directory {path}: {source}")]
    LogDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("cannot install log subscriber: {0}")]
    SubscriberInit(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
