//! Publish/subscribe abstraction for committed-change notifications.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// A subscription to a change feed.
///
/// Each subscription receives a copy of every notification published after
/// it was opened (broadcast semantics). Designed for single-threaded
/// consumption; spin up one subscription per consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next notification is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notification without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a notification.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic change feed.
///
/// Notifications are published only after the originating transaction
/// committed, so a subscriber never observes an effect that was rolled
/// back. The feed itself stores nothing; replay is a store concern.
pub trait ChangeFeed<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, F> ChangeFeed<M> for Arc<F>
where
    F: ChangeFeed<M> + ?Sized,
{
    type Error = F::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
