//! Broadcast relay carrying dispatched actions to the saga process.
//!
//! Every subscriber registered at the time of a `put` receives its own
//! copy of the action, so concurrent takers each observe the full stream.
//! Subscribers registered later see only later actions.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Duplex action conduit: `put` on one side, `subscribe` on the other.
pub struct ActionRelay<A> {
    inner: Arc<Mutex<RelayInner<A>>>,
}

struct RelayInner<A> {
    subscribers: Vec<UnboundedSender<A>>,
    closed: bool,
    delivered: u64,
}

impl<A> Clone for ActionRelay<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Clone> Default for ActionRelay<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone> ActionRelay<A> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RelayInner {
                subscribers: Vec::new(),
                closed: false,
                delivered: 0,
            })),
        }
    }

    /// Deliver `action` to every current subscriber.
    ///
    /// Returns `false` if the relay is closed. Subscribers whose receiving
    /// side was dropped are pruned here.
    pub fn put(&self, action: A) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(action.clone()).is_ok());
        inner.delivered += 1;
        tracing::trace!(
            subscribers = inner.subscribers.len(),
            delivered = inner.delivered,
            "Relay delivered action"
        );
        true
    }

    /// Register a subscriber for all actions put from now on.
    ///
    /// Subscribing to a closed relay yields a subscription that is
    /// already exhausted.
    pub fn subscribe(&self) -> Subscription<A> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        Subscription { rx }
    }

    /// Close the relay. Pending actions already delivered to a
    /// subscription can still be drained from it.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of live subscribers as of the last `put`.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Total number of actions delivered since creation.
    pub fn delivered(&self) -> u64 {
        self.inner.lock().delivered
    }
}

/// Receiving side of one relay subscription.
pub struct Subscription<A> {
    rx: UnboundedReceiver<A>,
}

impl<A> Subscription<A> {
    /// Next delivered action, or `None` once the relay is closed and the
    /// backlog is drained.
    pub async fn next(&mut self) -> Option<A> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Subscription::next`].
    pub fn try_next(&mut self) -> Option<A> {
        self.rx.try_recv().ok()
    }
}
