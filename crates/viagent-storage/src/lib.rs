//! Via-gent Storage - small persistent state for workspaces.
//!
//! The sync engine keeps two kinds of records between runs: the reference
//! to a granted directory handle, and per-project metadata (exclusion
//! patterns, last sync time). Both go through the namespaced [`KvStore`]
//! trait:
//!
//! - [`MemoryKvStore`]: ephemeral, for tests and throwaway sessions
//! - [`JsonFileKvStore`]: one JSON document on disk
//!
//! [`ScopedKvStore`] pre-binds a namespace and adds JSON helpers.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod file;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use file::JsonFileKvStore;
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};
