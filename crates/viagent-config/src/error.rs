//! Errors raised while locating, reading and checking config files.

use std::io;

use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A config file is not valid TOML or does not fit the schema.
    #[error("malformed config {path}: {source}")]
    Parse {
        /// File that failed to parse.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A config file is larger than the loader accepts.
    #[error("{path} is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        /// Offending file.
        path: String,
        /// Its size in bytes.
        size: u64,
        /// Largest accepted size.
        limit: u64,
    },

    /// The merged configuration holds a value the engine cannot use.
    #[error("invalid `{field}`: {message}")]
    Invalid {
        /// Dotted key, e.g. `sync.concurrency`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// No home directory to look for the user config in.
    #[error("home directory not found")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
