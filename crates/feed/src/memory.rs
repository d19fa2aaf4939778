//! In-memory change feed for tests/dev.

use std::sync::{mpsc, Mutex};

use crate::feed::{ChangeFeed, Subscription};

#[derive(Debug)]
pub enum InMemoryFeedError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

/// In-memory fan-out feed.
///
/// - No IO / no async
/// - Best-effort broadcast
/// - At-least-once acceptable (subscribers must be idempotent)
#[derive(Debug)]
pub struct InMemoryFeed<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryFeed<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> Default for InMemoryFeed<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> ChangeFeed<M> for InMemoryFeed<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryFeedError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryFeedError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_message() {
        let feed = InMemoryFeed::new();
        let first = feed.subscribe();
        let second = feed.subscribe();

        feed.publish("stock low").unwrap();

        assert_eq!(first.try_recv().unwrap(), "stock low");
        assert_eq!(second.try_recv().unwrap(), "stock low");
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let feed = InMemoryFeed::new();
        drop(feed.subscribe());
        let live = feed.subscribe();

        feed.publish(1u32).unwrap();
        feed.publish(2u32).unwrap();

        assert_eq!(live.try_recv().unwrap(), 1);
        assert_eq!(live.try_recv().unwrap(), 2);
    }

    #[test]
    fn subscription_only_sees_messages_after_subscribe() {
        let feed = InMemoryFeed::new();
        feed.publish(1u32).unwrap();

        let late = feed.subscribe();
        feed.publish(2u32).unwrap();

        assert_eq!(late.try_recv().unwrap(), 2);
        assert!(late.try_recv().is_err());
    }
}
