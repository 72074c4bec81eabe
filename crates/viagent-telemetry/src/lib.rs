//! Via-gent Telemetry - logging setup for the sync engine and its CLI.
//!
//! Everything logs through `tracing`; this crate only installs the
//! subscriber. With the `config` feature, [`LogConfig::from_section`] builds
//! a config from the `[logging]` section of `viagent-config`.
//!
//! # Example
//!
//! ```rust,no_run
//! use viagent_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), viagent_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("viagent_sync=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!(files = 12, "sync finished");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
};
