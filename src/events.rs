//! Provider lifecycle events.
//!
//! Events are fanned out through a [`tokio::sync::broadcast`] channel. Every [`EventStream`] sees
//! the events emitted after it was created; nothing is replayed. Emitting never blocks: when a
//! subscriber falls more than [`EVENT_CHANNEL_CAPACITY`] events behind, its oldest events are
//! dropped.
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Number of undelivered events buffered per subscriber.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Lifecycle event emitted by [`ConfigCatProvider`](crate::ConfigCatProvider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ProviderEvent {
    /// The provider received usable flag data for the first time.
    Ready,
}

#[derive(Debug)]
pub(crate) struct EventHandler {
    sender: broadcast::Sender<ProviderEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        EventHandler { sender }
    }

    pub fn send(&self, event: ProviderEvent) {
        // Err only means there are no subscribers right now.
        let receivers = self.sender.send(event).unwrap_or(0);
        log::debug!(target: "configcat", event:? = event, receivers = receivers; "emitted provider event");
    }

    pub fn observe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }
}

/// A forward-only view of provider events, created by
/// [`ConfigCatProvider::observe`](crate::ConfigCatProvider::observe).
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<ProviderEvent>,
}

impl EventStream {
    /// Wait for the next event.
    ///
    /// Returns `None` once the provider has been dropped and all buffered events were consumed.
    pub async fn recv(&mut self) -> Option<ProviderEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(target: "configcat", skipped = skipped; "event subscriber lagged, dropped oldest events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Return the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ProviderEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!(target: "configcat", skipped = skipped; "event subscriber lagged, dropped oldest events");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventHandler, ProviderEvent, EVENT_CHANNEL_CAPACITY};

    #[test]
    fn every_subscriber_receives_event() {
        let handler = EventHandler::new();
        let mut first = handler.observe();
        let mut second = handler.observe();

        handler.send(ProviderEvent::Ready);

        assert_eq!(first.try_recv(), Some(ProviderEvent::Ready));
        assert_eq!(second.try_recv(), Some(ProviderEvent::Ready));
        assert_eq!(first.try_recv(), None);
        assert_eq!(second.try_recv(), None);
    }

    #[test]
    fn past_events_are_not_replayed() {
        let handler = EventHandler::new();
        handler.send(ProviderEvent::Ready);

        let mut late = handler.observe();
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn send_without_subscribers_does_not_fail() {
        let handler = EventHandler::new();
        handler.send(ProviderEvent::Ready);
    }

    #[test]
    fn slow_subscriber_drops_oldest_events() {
        let handler = EventHandler::new();
        let mut stream = handler.observe();

        for _ in 0..EVENT_CHANNEL_CAPACITY * 2 {
            handler.send(ProviderEvent::Ready);
        }

        let mut received = 0;
        while stream.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, EVENT_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn recv_ends_when_handler_dropped() {
        let handler = EventHandler::new();
        let mut stream = handler.observe();
        handler.send(ProviderEvent::Ready);
        drop(handler);

        assert_eq!(stream.recv().await, Some(ProviderEvent::Ready));
        assert_eq!(stream.recv().await, None);
    }
}
