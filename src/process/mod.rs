//! Process driver: runs a saga against a state cell and action relay.
//!
//! The runner is a capability behind [`ProcessRunner`] so it can be
//! substituted in tests. [`TokioRunner`] is the default implementation.

mod cancel;
mod context;
mod effect;
mod runner;
mod task;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::SagaError;
use crate::options::OptionBundle;
use crate::relay::ActionRelay;
use crate::store::{Action, Dispatch, StateAccessor};

pub use cancel::CancelToken;
pub use context::SagaContext;
pub use effect::{
    intercept_all, make_custom_effect, CustomEffect, Effect, EffectId, EffectInterceptor,
    EffectKind, Interception, Pattern, Resolution,
};
pub use runner::TokioRunner;
pub use task::Task;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Outcome of a saga body.
pub type SagaResult = Result<(), SagaError>;

type SagaFn<A, S> = dyn Fn(SagaContext<A, S>) -> BoxFuture<SagaResult> + Send + Sync;

/// A named, restartable saga body.
pub struct Saga<A, S> {
    name: String,
    body: Arc<SagaFn<A, S>>,
}

impl<A, S> Clone for Saga<A, S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            body: Arc::clone(&self.body),
        }
    }
}

impl<A: 'static, S: 'static> Saga<A, S> {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(SagaContext<A, S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SagaResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(move |ctx| -> BoxFuture<SagaResult> { Box::pin(body(ctx)) }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self, ctx: SagaContext<A, S>) -> BoxFuture<SagaResult> {
        (self.body)(ctx)
    }
}

/// The three channels binding a saga to its owner.
pub struct SagaIo<A, S> {
    /// Source of actions for take effects.
    pub relay: ActionRelay<A>,
    /// Latest committed state, for select effects.
    pub get_state: StateAccessor<S>,
    /// Sink for put effects; same path the owner dispatches through.
    pub dispatch: Dispatch<A>,
}

impl<A, S> Clone for SagaIo<A, S> {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
            get_state: self.get_state.clone(),
            dispatch: self.dispatch.clone(),
        }
    }
}

/// Handle to a started process tree.
pub trait ProcessHandle: Send + Sync {
    /// Cancel the tree. Idempotent. After the first call no effect of the
    /// tree fires monitor hooks, dispatches or touches state.
    fn cancel(&self);

    fn is_running(&self) -> bool;
}

/// Starts saga processes.
pub trait ProcessRunner<A, S>: Send + Sync {
    fn start(&self, options: OptionBundle<A>, io: SagaIo<A, S>, saga: Saga<A, S>) -> Box<dyn ProcessHandle>;
}

/// Convenience for `Saga::new("saga", body)`.
pub fn saga<A, S, F, Fut>(body: F) -> Saga<A, S>
where
    A: Action,
    S: 'static,
    F: Fn(SagaContext<A, S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SagaResult> + Send + 'static,
{
    Saga::new("saga", body)
}
