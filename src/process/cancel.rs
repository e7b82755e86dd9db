//! Cancellation tree for a saga process and its forks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Lightweight handle for signalling and observing cancellation.
///
/// Cancelling a token cancels every child created from it, recursively.
/// A child created from an already-cancelled token starts cancelled.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<TokenInner>>>,
}

impl TokenInner {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
        true
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner::new()),
        }
    }

    /// Create a token cancelled together with this one.
    pub fn child(&self) -> CancelToken {
        let child = Arc::new(TokenInner::new());
        {
            let mut children = self.inner.children.lock();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        // Checked after registering so a concurrent cancel cannot be missed.
        if self.is_cancelled() {
            child.cancel();
        }
        CancelToken { inner: child }
    }

    /// Cancel this token and its subtree. Returns `true` only for the call
    /// that actually performed the cancellation.
    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        // Enabled before the flag check so a concurrent cancel() is not lost.
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}
