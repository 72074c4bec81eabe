//! Emit-only capability handed to the sync engine.

use crate::event::SyncEvent;

/// Something the sync engine can emit events into.
///
/// This is the only event capability the engine holds; it never
/// subscribes to what it emits.
pub trait EventSink: Send + Sync {
    /// Emit one event.
    fn emit(&self, event: SyncEvent);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SyncEvent) {}
}
