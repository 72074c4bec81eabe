//! Layered configuration for Via-gent.
//!
//! A value is looked up in the workspace file, then the user file, then a
//! `VIAGENT_*` variable, then the embedded defaults; the first hit wins.
//! Environment variables only fill fields that neither file sets.
//!
//! ```rust,no_run
//! use viagent_config::Config;
//!
//! # fn main() -> viagent_config::ConfigResult<()> {
//! let resolved = Config::load(Some(std::path::Path::new(".")))?;
//! println!("sync mode: {}", resolved.config.sync.mode);
//! # Ok(())
//! # }
//! ```
//!
//! Files live at `~/.viagent/config.toml` and `{root}/.viagent/config.toml`.
//! The crate depends on no other viagent crate; the sync engine converts
//! [`SyncSection`] into its own options.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::Path;

pub mod env;
pub mod error;
pub mod loader;
pub mod merge;
pub mod show;
pub mod types;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::viagent_home;
pub use merge::{ConfigLayer, Layered};
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Resolve all layers for `workspace_root` (or none) under `~/.viagent`.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable, malformed or oversized file, or when the
    /// merged result is invalid.
    pub fn load(workspace_root: Option<&Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None)
    }

    /// [`Config::load`] with `home_dir` standing in for `~/.viagent`.
    ///
    /// # Errors
    ///
    /// As [`Config::load`].
    pub fn load_with_home(
        workspace_root: Option<&Path>,
        home_dir: &Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, Some(home_dir))
    }

    /// Read and validate one file on its own, without defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, malformed or invalid.
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
