//! The dispatch handle shared by the owner and its saga.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::action::Action;
use super::cell::StateCell;
use super::reducer::Reducer;
use crate::error::DispatchError;
use crate::relay::ActionRelay;

type DispatchFn<A> = dyn Fn(A) -> Result<(), DispatchError> + Send + Sync;

/// Commits an action to the state cell, then queues it for relay delivery.
///
/// Clones share identity; use [`Dispatch::ptr_eq`] to check that two
/// handles came from the same activation.
pub struct Dispatch<A> {
    inner: Arc<DispatchFn<A>>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Action> Dispatch<A> {
    /// Wire a cell to a delivery queue.
    ///
    /// The reducer runs synchronously on the caller's turn. Delivery into
    /// `relay` happens later, when the queue is drained. A rejected action
    /// is never queued.
    pub fn wire<R>(cell: StateCell<R>, queue: UnboundedSender<A>, relay: ActionRelay<A>) -> Self
    where
        R: Reducer<Action = A>,
    {
        let inner = move |action: A| {
            cell.apply(&action)
                .map_err(|source| DispatchError::Reducer {
                    action_type: action.action_type().to_string(),
                    source: Box::new(source),
                })?;

            if relay.is_closed() || queue.send(action).is_err() {
                tracing::warn!("Action committed after teardown; not relayed");
            }
            Ok(())
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Build a dispatch from an arbitrary function. Useful for substituting
    /// the state cell in runner tests.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(A) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn dispatch(&self, action: A) -> Result<(), DispatchError> {
        (self.inner)(action)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::from_fn;
    use thiserror::Error;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, PartialEq)]
    struct Named(&'static str);

    impl Action for Named {
        fn action_type(&self) -> &str {
            self.0
        }
    }

    #[derive(Debug, Error)]
    #[error("rejected")]
    struct Rejected;

    struct RejectBad;

    impl Reducer for RejectBad {
        type State = Vec<&'static str>;
        type Action = Named;
        type Error = Rejected;

        fn reduce(&self, state: &Self::State, action: &Named) -> Result<Self::State, Rejected> {
            if action.0 == "BAD" {
                return Err(Rejected);
            }
            let mut next = state.clone();
            next.push(action.0);
            Ok(next)
        }
    }

    #[test]
    fn commits_before_queueing() {
        let cell = StateCell::new(RejectBad, Vec::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatch = Dispatch::wire(cell.clone(), tx, ActionRelay::new());

        dispatch.dispatch(Named("A")).unwrap();

        assert_eq!(cell.get(), vec!["A"]);
        assert_eq!(rx.try_recv().unwrap(), Named("A"));
    }

    #[test]
    fn rejected_action_is_not_queued() {
        let cell = StateCell::new(RejectBad, Vec::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatch = Dispatch::wire(cell.clone(), tx, ActionRelay::new());

        let err = dispatch.dispatch(Named("BAD")).unwrap_err();

        assert!(matches!(err, DispatchError::Reducer { ref action_type, .. } if action_type == "BAD"));
        assert!(cell.get().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clones_share_identity() {
        let cell = StateCell::new(from_fn(|s: &u32, _: &Named| s + 1), 0);
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = Dispatch::wire(cell.clone(), tx.clone(), ActionRelay::new());
        let b = a.clone();
        let c = Dispatch::wire(cell, tx, ActionRelay::new());
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn dispatch_after_close_still_commits() {
        let cell = StateCell::new(from_fn(|s: &u32, _: &Named| s + 1), 0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay = ActionRelay::new();
        let dispatch = Dispatch::wire(cell.clone(), tx, relay.clone());

        relay.close();
        dispatch.dispatch(Named("LATE")).unwrap();

        assert_eq!(cell.get(), 1);
        assert!(rx.try_recv().is_err());
    }
}
