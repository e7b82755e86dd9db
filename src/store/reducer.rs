//! Reducer trait and closure adapter.

use std::convert::Infallible;
use std::marker::PhantomData;

use super::action::Action;

/// Reducer transforms state based on actions.
///
/// The reducer is the only place where state transitions happen.
/// It must be a pure function: (State, Action) -> State. Returning an
/// error rejects the action: nothing is committed and the action is not
/// relayed to the saga.
pub trait Reducer: Send + Sync + 'static {
    /// The state type this reducer operates on.
    type State: Clone + Send + Sync + 'static;

    /// The action type this reducer handles.
    type Action: Action;

    /// Error returned when an action is rejected.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Process an action and return the new state.
    fn reduce(&self, state: &Self::State, action: &Self::Action)
        -> Result<Self::State, Self::Error>;
}

/// Infallible reducer built from a closure. See [`from_fn`].
pub struct FnReducer<F, S, A> {
    f: F,
    _marker: PhantomData<fn(&S, &A) -> S>,
}

/// Wrap a plain `(state, action) -> state` closure as a [`Reducer`].
pub fn from_fn<S, A, F>(f: F) -> FnReducer<F, S, A>
where
    F: Fn(&S, &A) -> S + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    FnReducer {
        f,
        _marker: PhantomData,
    }
}

impl<F, S, A> Reducer for FnReducer<F, S, A>
where
    F: Fn(&S, &A) -> S + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    type State = S;
    type Action = A;
    type Error = Infallible;

    fn reduce(&self, state: &S, action: &A) -> Result<S, Infallible> {
        Ok((self.f)(state, action))
    }
}
