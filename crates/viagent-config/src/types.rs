//! Configuration types for Via-gent.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header in TOML produces a working
//! configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sync engine behaviour.
    pub sync: SyncSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
    /// Where workspace state (handle references, project metadata) lives.
    pub storage: StorageSection,
}

// ---------------------------------------------------------------------------
// SyncSection
// ---------------------------------------------------------------------------

/// Sync engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// `"incremental"` (add/overwrite only) or `"full"` (also delete
    /// container paths that no longer exist locally).
    pub mode: String,
    /// User exclusion patterns, merged after the built-in defaults.
    pub exclude_patterns: Vec<String>,
    /// Start from the extended default list (editor swap files, IDE
    /// folders, local env files) instead of the base list.
    pub include_extended_defaults: bool,
    /// Maximum number of file copies in flight. `1` is strictly sequential.
    pub concurrency: usize,
    /// Run an initial sync as soon as the container reports it is booted.
    pub auto_sync_on_boot: bool,
    /// Extra extensions (without the dot) to treat as binary.
    pub binary_extensions: Vec<String>,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            mode: "incremental".to_owned(),
            exclude_patterns: Vec::new(),
            include_extended_defaults: false,
            concurrency: 1,
            auto_sync_on_boot: true,
            binary_extensions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["viagent_sync=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageSection
// ---------------------------------------------------------------------------

/// Workspace state persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// `"json"` (single file on disk) or `"memory"` (nothing survives the
    /// process).
    pub backend: String,
    /// Path of the JSON state file. `None` uses `~/.viagent/state.json`.
    pub path: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "json".to_owned(),
            path: None,
        }
    }
}

impl StorageSection {
    /// Resolve the state file location against the given `.viagent` home.
    #[must_use]
    pub fn resolve_path(&self, viagent_home: &std::path::Path) -> PathBuf {
        self.path
            .as_ref()
            .map_or_else(|| viagent_home.join("state.json"), PathBuf::from)
    }
}
