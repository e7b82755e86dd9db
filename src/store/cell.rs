//! The state cell: single owner of the reducer's current value.

use std::sync::Arc;

use parking_lot::RwLock;

use super::reducer::Reducer;

/// Reducer-driven value holder.
///
/// Uses a read-write lock: readers (render, saga `select`) clone the
/// current value while commits are exclusive. The reducer runs under the
/// write lock, so it must not dispatch re-entrantly.
pub struct StateCell<R: Reducer> {
    reducer: Arc<R>,
    value: Arc<RwLock<R::State>>,
}

impl<R: Reducer> Clone for StateCell<R> {
    fn clone(&self) -> Self {
        Self {
            reducer: Arc::clone(&self.reducer),
            value: Arc::clone(&self.value),
        }
    }
}

impl<R: Reducer> StateCell<R> {
    pub fn new(reducer: R, initial: R::State) -> Self {
        Self {
            reducer: Arc::new(reducer),
            value: Arc::new(RwLock::new(initial)),
        }
    }

    /// Get a clone of the most recently committed state.
    pub fn get(&self) -> R::State {
        self.value.read().clone()
    }

    /// Apply the reducer and replace the state wholesale.
    ///
    /// On error the previous state is kept.
    pub fn apply(&self, action: &R::Action) -> Result<(), R::Error> {
        let mut guard = self.value.write();
        let next = self.reducer.reduce(&guard, action)?;
        *guard = next;
        Ok(())
    }

    /// Stable read-only accessor over the same storage.
    pub fn accessor(&self) -> StateAccessor<R::State> {
        StateAccessor {
            value: Arc::clone(&self.value),
        }
    }
}

/// Read-only view of a [`StateCell`] handed to the saga process.
///
/// Always observes the latest commit, never a snapshot taken at
/// process start.
pub struct StateAccessor<S> {
    value: Arc<RwLock<S>>,
}

impl<S> Clone for StateAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<S: Clone> StateAccessor<S> {
    pub fn get(&self) -> S {
        self.value.read().clone()
    }
}
