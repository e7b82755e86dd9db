//! Owner-bound saga reducer.
//!
//! A [`SagaReducer`] is held by one owner (a component instance, a
//! session, a widget) for its whole lifetime. The owner calls
//! [`SagaReducer::activate`] on every render or re-entry; the first call
//! wires the relay and dispatch and starts the saga, later calls only
//! return the current state and the same dispatch. Teardown (explicit or
//! on drop) cancels the saga exactly once.
//!
//! ```ignore
//! let mut counter = SagaReducer::new(counter_saga(), CounterReducer, Counter::default());
//! let (state, dispatch) = counter.activate(&scope);
//! dispatch.dispatch(CounterAction::Increment)?;
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::options::{merge, OptionBundle};
use crate::process::{ProcessHandle, ProcessRunner, Saga, SagaIo, TokioRunner};
use crate::relay::ActionRelay;
use crate::scope::Scope;
use crate::store::{Dispatch, Reducer, StateCell};

/// Initial value of the state cell.
pub enum InitialState<S> {
    Value(S),
    /// Computed once, when the reducer is created.
    Lazy(Box<dyn FnOnce() -> S + Send>),
}

impl<S> InitialState<S> {
    /// Mirror of `initializer(arg)`.
    pub fn lazy<I>(arg: I, init: impl FnOnce(I) -> S + Send + 'static) -> Self
    where
        I: Send + 'static,
    {
        InitialState::Lazy(Box::new(move || init(arg)))
    }

    fn resolve(self) -> S {
        match self {
            InitialState::Value(value) => value,
            InitialState::Lazy(init) => init(),
        }
    }
}

impl<S> From<S> for InitialState<S> {
    fn from(value: S) -> Self {
        InitialState::Value(value)
    }
}

struct Mounted<A> {
    relay: ActionRelay<A>,
    dispatch: Dispatch<A>,
    handle: Box<dyn ProcessHandle>,
    pump: JoinHandle<()>,
}

enum Lifecycle<A> {
    Idle,
    Mounted(Mounted<A>),
    TornDown(Dispatch<A>),
}

/// Reducer state plus a saga process bound to one owner's lifetime.
pub struct SagaReducer<R: Reducer> {
    saga: Saga<R::Action, R::State>,
    cell: StateCell<R>,
    local: OptionBundle<R::Action>,
    runner: Arc<dyn ProcessRunner<R::Action, R::State>>,
    lifecycle: Lifecycle<R::Action>,
}

impl<R: Reducer> SagaReducer<R> {
    /// Create the state cell. Nothing is started until the first
    /// [`activate`](Self::activate).
    pub fn new(
        saga: Saga<R::Action, R::State>,
        reducer: R,
        initial: impl Into<InitialState<R::State>>,
    ) -> Self {
        Self {
            saga,
            cell: StateCell::new(reducer, initial.into().resolve()),
            local: OptionBundle::default(),
            runner: Arc::new(TokioRunner::new()),
            lifecycle: Lifecycle::Idle,
        }
    }

    /// Call-local options, merged over the scope's ambient bundle.
    pub fn with_options(mut self, options: OptionBundle<R::Action>) -> Self {
        self.local = options;
        self
    }

    /// Substitute the process runner.
    pub fn with_runner(mut self, runner: impl ProcessRunner<R::Action, R::State> + 'static) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    /// Per-render entry point. Must be called on every activation of the
    /// owner, unconditionally.
    ///
    /// Reads the ambient bundle from `scope` and merges the local options
    /// over it. Only the first call starts the saga; option changes on
    /// later calls do not restart it.
    ///
    /// # Panics
    ///
    /// The first call panics outside a tokio runtime.
    pub fn activate(&mut self, scope: &Scope<R::Action>) -> (R::State, Dispatch<R::Action>) {
        let options = merge(scope.current(), &self.local);

        if let Some(dispatch) = self.dispatch() {
            if let Lifecycle::TornDown(_) = self.lifecycle {
                tracing::warn!(saga = %self.saga.name(), "Activated after teardown; saga not restarted");
            } else {
                tracing::trace!(saga = %self.saga.name(), "Re-activation; saga already running");
            }
            return (self.cell.get(), dispatch);
        }

        let mounted = self.mount(options);
        let dispatch = mounted.dispatch.clone();
        self.lifecycle = Lifecycle::Mounted(mounted);
        (self.cell.get(), dispatch)
    }

    /// Latest committed state.
    pub fn get_state(&self) -> R::State {
        self.cell.get()
    }

    /// The activation's dispatch, once the first activation happened.
    pub fn dispatch(&self) -> Option<Dispatch<R::Action>> {
        match &self.lifecycle {
            Lifecycle::Idle => None,
            Lifecycle::Mounted(mounted) => Some(mounted.dispatch.clone()),
            Lifecycle::TornDown(dispatch) => Some(dispatch.clone()),
        }
    }

    /// True between the first activation and teardown.
    pub fn is_active(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Mounted(_))
    }

    /// Whether the saga's root task or any of its attached forks is still
    /// running.
    pub fn is_process_running(&self) -> bool {
        match &self.lifecycle {
            Lifecycle::Mounted(mounted) => mounted.handle.is_running(),
            _ => false,
        }
    }

    /// Cancel the saga and close the relay. Idempotent; also run on drop.
    pub fn teardown(&mut self) {
        let lifecycle = std::mem::replace(&mut self.lifecycle, Lifecycle::Idle);
        self.lifecycle = match lifecycle {
            Lifecycle::Mounted(mounted) => {
                mounted.handle.cancel();
                mounted.relay.close();
                mounted.pump.abort();
                tracing::debug!(saga = %self.saga.name(), "Saga reducer torn down");
                Lifecycle::TornDown(mounted.dispatch)
            }
            other => other,
        };
    }

    fn mount(&self, options: OptionBundle<R::Action>) -> Mounted<R::Action> {
        let relay = ActionRelay::new();
        let (queue, mut pending) = mpsc::unbounded_channel();
        let dispatch = Dispatch::wire(self.cell.clone(), queue, relay.clone());
        let io = SagaIo {
            relay: relay.clone(),
            get_state: self.cell.accessor(),
            dispatch: dispatch.clone(),
        };
        let on_dispatched = options
            .saga_monitor
            .as_ref()
            .and_then(|monitor| monitor.action_dispatched.clone());

        tracing::debug!(saga = %self.saga.name(), "Mounting saga reducer");
        // Started before the pump so the saga's first segment subscribes
        // before any queued action is delivered.
        let handle = self.runner.start(options, io, self.saga.clone());

        let pump_relay = relay.clone();
        let pump = tokio::spawn(async move {
            while let Some(action) = pending.recv().await {
                if pump_relay.is_closed() {
                    break;
                }
                if let Some(hook) = &on_dispatched {
                    hook(&action);
                }
                pump_relay.put(action);
            }
        });

        Mounted {
            relay,
            dispatch,
            handle,
            pump,
        }
    }
}

impl<R: Reducer> Drop for SagaReducer<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}
