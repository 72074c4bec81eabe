//! Subcommand implementations.

pub(crate) mod config;
pub(crate) mod patterns;
pub(crate) mod permission;
pub(crate) mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;
use viagent_config::Config;
use viagent_storage::{JsonFileKvStore, KvStore, MemoryKvStore};

/// Open the state store named by the `[storage]` section.
pub(crate) async fn open_state_store(config: &Config) -> Result<Arc<dyn KvStore>> {
    if config.storage.backend == "memory" {
        debug!("using in-memory state store");
        return Ok(Arc::new(MemoryKvStore::new()));
    }
    let home = viagent_config::viagent_home()?;
    let path = config.storage.resolve_path(&home);
    debug!(path = %path.display(), "opening state store");
    let store = JsonFileKvStore::open(&path)
        .await
        .with_context(|| format!("cannot open state file {}", path.display()))?;
    Ok(Arc::new(store))
}
