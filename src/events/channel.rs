//! Event channel implementation using crossbeam-channel.
//!
//! Provides a thread-safe way to send events from the engine to any
//! front end, from async tasks and plain threads alike.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

use super::Event;

/// Sends events from the core library.
///
/// This is a thin wrapper around crossbeam's Sender that can be
/// cloned and sent across threads.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Create a new EventSender from a raw crossbeam sender.
    pub fn new(sender: Sender<Event>) -> Self {
        Self { inner: sender }
    }

    /// Send an event without blocking.
    ///
    /// If the receiver is dropped or a bounded channel is full, the event
    /// is discarded. Reporting is optional; the operation carries on.
    pub fn send(&self, event: Event) {
        if let Err(TrySendError::Full(event)) = self.inner.try_send(event) {
            tracing::trace!(?event, "event channel full, event dropped");
        }
    }
}

/// Receives events from the core library.
///
/// Used by UI layers to subscribe to progress updates.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event is received, or every sender is gone
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Returns an iterator over received events
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructs connected sender/receiver pairs.
pub struct EventChannel;

impl EventChannel {
    /// Create a new unbounded event channel.
    ///
    /// Use this for most cases - events are small and fast.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }

    /// Create a bounded event channel with the specified capacity.
    ///
    /// Events beyond `capacity` are dropped until the receiver catches up.
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A no-op event sender for when you don't need progress reporting.
///
/// This is useful for tests or when running without a front end.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{IngestEvent, LifecycleEvent};
    use std::thread;

    fn purged(id: &str) -> Event {
        Event::Lifecycle(LifecycleEvent::Purged {
            trash_id: id.to_string(),
        })
    }

    #[test]
    fn events_can_be_sent_across_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Ingest(IngestEvent::Persisted {
                id: "img-1".to_string(),
            }));
        });

        handle.join().unwrap();

        match receiver.recv().unwrap() {
            Event::Ingest(IngestEvent::Persisted { id }) => assert_eq!(id, "img-1"),
            other => panic!("Wrong event type: {:?}", other),
        }
    }

    #[test]
    fn null_sender_does_not_panic() {
        let sender = null_sender();
        sender.send(purged("t-1"));
    }

    #[test]
    fn full_bounded_channel_drops_instead_of_blocking() {
        let (sender, receiver) = EventChannel::bounded(2);

        sender.send(purged("1"));
        sender.send(purged("2"));
        sender.send(purged("3"));

        assert_eq!(receiver.try_recv(), Some(purged("1")));
        assert_eq!(receiver.try_recv(), Some(purged("2")));
        assert!(receiver.try_recv().is_none());
    }
}
