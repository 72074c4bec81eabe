//! Via-gent Events - sync lifecycle events and the event bus.
//!
//! This crate provides:
//! - [`SyncEvent`] and its payload types ([`SyncProgress`], [`SyncResult`])
//! - [`EventSink`], the emit-only capability the sync engine is given
//! - [`EventBus`], a broadcast bus implementing [`EventSink`] for UI layers
//!
//! # Example
//!
//! ```rust
//! use viagent_events::{EventBus, EventSink, SyncEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(SyncEvent::FileModified { path: "src/main.ts".into() });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "file:modified");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bus;
mod event;
mod sink;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{
    EventEnvelope, EventMetadata, SyncEvent, SyncMode, SyncProgress, SyncResult, SyncStatus,
    percentage,
};
pub use sink::{EventSink, NullSink};
