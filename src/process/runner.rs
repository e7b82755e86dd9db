//! Default process runner backed by the ambient tokio runtime.

use super::context::SagaContext;
use super::{ProcessHandle, ProcessRunner, Saga, SagaIo};
use crate::config::{RunnerSettings, UnhandledErrorPolicy};
use crate::options::OptionBundle;
use crate::store::Action;

/// Spawns each saga task with `tokio::spawn`.
///
/// Must be used from within a tokio runtime. A current-thread runtime
/// gives the cooperative, single-threaded ordering the relay relies on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner {
    unhandled_errors: UnhandledErrorPolicy,
}

impl TokioRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &RunnerSettings) -> Self {
        Self {
            unhandled_errors: settings.unhandled_errors,
        }
    }

    /// What happens to a failure when no error handler is configured.
    pub fn unhandled_errors(&self) -> UnhandledErrorPolicy {
        self.unhandled_errors
    }

    /// Start a saga and keep the concrete [`Task`](super::Task) handle.
    pub fn spawn<A, S>(&self, options: OptionBundle<A>, io: SagaIo<A, S>, saga: Saga<A, S>) -> super::Task
    where
        A: Action,
        S: Clone + Send + Sync + 'static,
    {
        SagaContext::start_root(options, io, saga, self.unhandled_errors)
    }
}

impl<A, S> ProcessRunner<A, S> for TokioRunner
where
    A: Action,
    S: Clone + Send + Sync + 'static,
{
    fn start(&self, options: OptionBundle<A>, io: SagaIo<A, S>, saga: Saga<A, S>) -> Box<dyn ProcessHandle> {
        Box::new(self.spawn(options, io, saga))
    }
}
