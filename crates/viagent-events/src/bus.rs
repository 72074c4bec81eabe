//! Broadcast bus carrying sync events from the engine to UI layers.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{trace, warn};

use crate::event::{EventEnvelope, EventMetadata, SyncEvent};
use crate::sink::EventSink;

/// Queue depth per receiver before the slowest one starts losing events.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Fan-out of [`SyncEvent`]s to any number of [`EventReceiver`]s.
///
/// Each receiver sees events in publish order. Clones publish into the same
/// channel. A receiver that falls more than the capacity behind skips the
/// oldest events and logs how many.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<EventEnvelope>>,
    source: Arc<str>,
}

impl EventBus {
    /// Bus with [`DEFAULT_CHANNEL_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus with room for `capacity` queued events per receiver.
    ///
    /// # Panics
    ///
    /// If `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            source: Arc::from("sync"),
        }
    }

    /// Name stamped into [`EventMetadata::source`] of every event.
    #[must_use]
    pub fn with_source(mut self, source: impl AsRef<str>) -> Self {
        self.source = Arc::from(source.as_ref());
        self
    }

    /// Wrap `event` in an envelope and send it. Returns how many receivers
    /// it reached; zero is not an error.
    pub fn publish(&self, event: SyncEvent) -> usize {
        let envelope = Arc::new(EventEnvelope {
            metadata: EventMetadata::new(&*self.source),
            event,
        });
        let reached = self.sender.send(Arc::clone(&envelope)).unwrap_or(0);
        trace!(event_type = %envelope.event_type(), reached, "event published");
        reached
    }

    /// Every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            filter: TypeFilter::All,
        }
    }

    /// Only events whose type is `pattern`, or starts with it when the
    /// pattern ends in `*` (`file:*`).
    #[must_use]
    pub fn subscribe_type(&self, pattern: &str) -> EventReceiver {
        let filter = match pattern.strip_suffix('*') {
            Some(prefix) => TypeFilter::Prefix(prefix.to_owned()),
            None => TypeFilter::Exact(pattern.to_owned()),
        };
        EventReceiver {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    /// Live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: SyncEvent) {
        self.publish(event);
    }
}

#[derive(Debug)]
enum TypeFilter {
    All,
    Exact(String),
    Prefix(String),
}

impl TypeFilter {
    fn admits(&self, envelope: &EventEnvelope) -> bool {
        let event_type = envelope.event_type();
        match self {
            Self::All => true,
            Self::Exact(name) => event_type == name,
            Self::Prefix(prefix) => event_type.starts_with(prefix.as_str()),
        }
    }
}

/// One subscription to an [`EventBus`].
#[derive(Debug)]
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<EventEnvelope>>,
    filter: TypeFilter,
}

impl EventReceiver {
    /// Wait for the next admitted event. `None` once every bus clone is gone.
    pub async fn recv(&mut self) -> Option<Arc<EventEnvelope>> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if self.filter.admits(&envelope) => return Some(envelope),
                Ok(_) => {},
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event receiver lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// The next admitted event already queued, if any.
    pub fn try_recv(&mut self) -> Option<Arc<EventEnvelope>> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) if self.filter.admits(&envelope) => return Some(envelope),
                Ok(_) => {},
                Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "event receiver lagged"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SyncProgress;

    #[tokio::test]
    async fn test_publish_and_receive_in_order() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        bus.emit(SyncEvent::Progress(SyncProgress::new(2, 1, "a.ts")));
        bus.emit(SyncEvent::Progress(SyncProgress::new(2, 2, "b.ts")));

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        match (&first.event, &second.event) {
            (SyncEvent::Progress(a), SyncEvent::Progress(b)) => {
                assert_eq!(a.current_file, "a.ts");
                assert_eq!(b.current_file, "b.ts");
                assert_eq!(b.percentage, 100);
            },
            other => panic!("unexpected events: {other:?}"),
        }
        assert_eq!(first.metadata.source, "sync");
    }

    #[test]
    fn test_publish_without_receivers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(SyncEvent::FileModified { path: "a".into() }), 0);
    }

    #[test]
    fn test_type_filter() {
        let bus = EventBus::new();
        let mut files = bus.subscribe_type("file:*");
        let mut errors = bus.subscribe_type("sync:error");

        bus.publish(SyncEvent::Progress(SyncProgress::new(1, 1, "a")));
        bus.publish(SyncEvent::FileDeleted { path: "gone".into() });
        bus.publish(SyncEvent::Error {
            error: "boom".into(),
            file: None,
        });

        assert_eq!(files.try_recv().unwrap().event_type(), "file:deleted");
        assert!(files.try_recv().is_none());
        assert_eq!(errors.try_recv().unwrap().event_type(), "sync:error");
        assert!(errors.try_recv().is_none());
    }

    #[test]
    fn test_lagging_receiver_skips_oldest() {
        let bus = EventBus::with_capacity(2);
        let mut receiver = bus.subscribe();
        for path in ["a", "b", "c"] {
            bus.publish(SyncEvent::FileModified { path: path.into() });
        }
        match &receiver.try_recv().unwrap().event {
            SyncEvent::FileModified { path } => assert_eq!(path, "b"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clone_shares_channel_and_source() {
        let bus = EventBus::new().with_source("workspace");
        let clone = bus.clone();
        let mut receiver = bus.subscribe();
        clone.publish(SyncEvent::FileModified { path: "x".into() });
        drop((bus, clone));

        assert_eq!(receiver.recv().await.unwrap().metadata.source, "workspace");
        assert!(receiver.recv().await.is_none());
    }
}
