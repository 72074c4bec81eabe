//! Via-gent Test - shared test utilities for the sync engine.
//!
//! Mocks for both sides of a sync pass and for the event sink, plus a few
//! canned project trees.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! viagent-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use viagent_test::{CapturingSink, MemoryDirHandle, RecordingContainerFs};
//!
//! let root = MemoryDirHandle::new("project")
//!     .with_file("src/main.ts", "console.log(1)")
//!     .with_failing_file("bad.ts", "disk error");
//! let fs = RecordingContainerFs::new();
//! let sink = CapturingSink::new();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
