//! Effect API available to saga bodies.
//!
//! Every effect gets an id, fires `effect_triggered`, and then exactly
//! one of `effect_resolved` / `effect_rejected`. Once the task's token is
//! cancelled no hook fires and no effect runs.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::cancel::CancelToken;
use super::effect::{intercept_all, Effect, EffectId, EffectKind, Interception, Pattern, Resolution};
use super::task::{Task, TaskState};
use super::{BoxFuture, Saga, SagaIo, SagaResult};
use crate::config::UnhandledErrorPolicy;
use crate::error::SagaError;
use crate::options::{
    ContextMap, EffectCancelled, EffectRejected, EffectResolved, EffectTriggered, ErrorHandler,
    InterceptorChain, OptionBundle, RootSagaStarted, SagaMonitor,
};
use crate::relay::Subscription;
use crate::store::Action;

const ROOT_EFFECT_ID: EffectId = 1;

/// State shared by every task of one process tree.
struct Tree<A> {
    saga: String,
    next_effect_id: AtomicU64,
    root: CancelToken,
    failed: AtomicBool,
    on_error: Option<ErrorHandler>,
    monitor: SagaMonitor<A>,
    interceptors: InterceptorChain<A>,
    policy: UnhandledErrorPolicy,
}

impl<A> Tree<A> {
    fn next_id(&self) -> EffectId {
        self.next_effect_id.fetch_add(1, Ordering::SeqCst)
    }

    fn cancelled(&self, effect_id: EffectId) {
        tracing::debug!(saga = %self.saga, effect_id, "Saga task cancelled");
        if let Some(hook) = &self.monitor.effect_cancelled {
            hook(&EffectCancelled { effect_id });
        }
    }

    /// Report a failure of any task in the tree. The first failure cancels
    /// the tree and is delivered once; later ones are dropped.
    fn fail(&self, error: SagaError) {
        if self.root.is_cancelled() {
            tracing::trace!(saga = %self.saga, %error, "Failure after cancellation ignored");
            return;
        }
        if self.failed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(hook) = &self.monitor.effect_rejected {
            hook(&EffectRejected {
                effect_id: ROOT_EFFECT_ID,
                error: error.to_string(),
            });
        }
        self.root.cancel();

        match (&self.on_error, self.policy) {
            (Some(handler), _) => handler(&error),
            (None, UnhandledErrorPolicy::Log) => {
                tracing::error!(saga = %self.saga, %error, "Unhandled saga failure");
            }
            (None, UnhandledErrorPolicy::Escalate) => {
                panic!("unhandled failure in saga '{}': {}", self.saga, error);
            }
        }
    }
}

/// Handle a saga body uses to perform effects.
pub struct SagaContext<A, S> {
    io: SagaIo<A, S>,
    tree: Arc<Tree<A>>,
    token: CancelToken,
    context: Arc<RwLock<ContextMap>>,
    /// Forks attached to this task; it settles only after they finish.
    forks: Arc<Mutex<Vec<Arc<TaskState>>>>,
    effect_id: EffectId,
}

impl<A, S> Clone for SagaContext<A, S> {
    fn clone(&self) -> Self {
        Self {
            io: self.io.clone(),
            tree: Arc::clone(&self.tree),
            token: self.token.clone(),
            context: Arc::clone(&self.context),
            forks: Arc::clone(&self.forks),
            effect_id: self.effect_id,
        }
    }
}

impl<A, S> SagaContext<A, S>
where
    A: Action,
    S: Clone + Send + Sync + 'static,
{
    /// Start `saga` as the root of a new process tree.
    pub(crate) fn start_root(
        options: OptionBundle<A>,
        io: SagaIo<A, S>,
        saga: Saga<A, S>,
        policy: UnhandledErrorPolicy,
    ) -> Task {
        let OptionBundle {
            on_error,
            saga_monitor,
            context,
            effect_interceptors,
        } = options;

        let tree = Arc::new(Tree {
            saga: saga.name().to_string(),
            next_effect_id: AtomicU64::new(ROOT_EFFECT_ID + 1),
            root: CancelToken::new(),
            failed: AtomicBool::new(false),
            on_error,
            monitor: saga_monitor.unwrap_or_default(),
            interceptors: effect_interceptors.unwrap_or_default(),
            policy,
        });
        let ctx = SagaContext {
            io,
            token: tree.root.clone(),
            tree,
            context: Arc::new(RwLock::new(context.unwrap_or_default())),
            forks: Arc::default(),
            effect_id: ROOT_EFFECT_ID,
        };

        tracing::debug!(saga = %ctx.tree.saga, "Starting root saga");
        if let Some(hook) = &ctx.tree.monitor.root_saga_started {
            hook(&RootSagaStarted {
                effect_id: ROOT_EFFECT_ID,
                saga: ctx.tree.saga.clone(),
            });
        }

        let future = saga.run(ctx.clone());
        ctx.spawn(future)
    }

    /// Effect id of the task this context belongs to.
    pub fn effect_id(&self) -> EffectId {
        self.effect_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this task (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Run an arbitrary effect through the interceptor chain.
    pub async fn run(&self, effect: Effect<A>) -> Result<Resolution<A>, SagaError> {
        self.ensure_live()?;
        let effect_id = self.trigger(effect.kind(), effect.describe());
        let result = match intercept_all(&self.tree.interceptors, effect) {
            Interception::Resolve(resolution) => Ok(resolution),
            Interception::Forward(effect) => self.execute(effect).await,
        };
        self.settle(effect_id, &result);
        result
    }

    /// Wait for the next relayed action matching `pattern`.
    pub async fn take(&self, pattern: impl Into<Pattern<A>>) -> Result<A, SagaError> {
        match self.run(Effect::Take(pattern.into())).await? {
            Resolution::Action(action) => Ok(action),
            _ => Err(SagaError::UnexpectedResolution {
                effect: "take",
                expected: "action",
            }),
        }
    }

    /// Dispatch through the owner's dispatch path: reducer first, relay later.
    pub async fn put(&self, action: A) -> SagaResult {
        self.run(Effect::Put(action)).await.map(|_| ())
    }

    pub async fn delay(&self, duration: Duration) -> SagaResult {
        self.run(Effect::Delay(duration)).await.map(|_| ())
    }

    /// Read the latest committed state. Never suspends.
    pub fn select(&self) -> Result<S, SagaError> {
        self.select_with(S::clone)
    }

    /// Read a projection of the latest committed state.
    ///
    /// The read happens only if the interceptor chain forwards the select.
    pub fn select_with<T>(&self, selector: impl FnOnce(&S) -> T) -> Result<T, SagaError> {
        self.ensure_live()?;
        let effect = Effect::Select;
        let effect_id = self.trigger(effect.kind(), effect.describe());
        let result = match intercept_all(&self.tree.interceptors, effect) {
            Interception::Forward(Effect::Select) => Ok(selector(&self.io.get_state.get())),
            _ => Err(SagaError::UnexpectedResolution {
                effect: "select",
                expected: "state",
            }),
        };
        self.settle(effect_id, &result);
        result
    }

    /// Value stored under `key`, `None` if the key is absent. A key
    /// present with a JSON `null` yields `Some(Value::Null)`.
    pub async fn get_context(&self, key: &str) -> Result<Option<Value>, SagaError> {
        match self.run(Effect::GetContext(key.to_string())).await? {
            Resolution::Entry(entry) => Ok(entry),
            Resolution::Value(value) => Ok(Some(value)),
            _ => Err(SagaError::UnexpectedResolution {
                effect: "getContext",
                expected: "value",
            }),
        }
    }

    /// Merge entries into this task's context. Forks started afterwards
    /// inherit them; the parent does not see a fork's changes.
    pub async fn set_context(&self, entries: ContextMap) -> SagaResult {
        self.run(Effect::SetContext(entries)).await.map(|_| ())
    }

    /// Start `saga` as a child task sharing this task's cancellation.
    pub fn fork(&self, saga: Saga<A, S>) -> Result<Task, SagaError> {
        let name = saga.name().to_string();
        self.fork_with(name, move |child| saga.run(child))
    }

    /// Fork `handler` for every relayed action matching `pattern`.
    ///
    /// The subscription is registered before this returns, so actions
    /// dispatched right after are not missed.
    pub fn take_every<P, F, Fut>(&self, pattern: P, handler: F) -> Result<Task, SagaError>
    where
        P: Into<Pattern<A>>,
        F: Fn(SagaContext<A, S>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SagaResult> + Send + 'static,
    {
        self.ensure_live()?;
        let pattern = pattern.into();
        let subscription = self.io.relay.subscribe();
        let name = format!("takeEvery({:?})", pattern);
        self.fork_with(name, move |watcher| -> BoxFuture<SagaResult> {
            Box::pin(Self::watch_every(watcher, subscription, pattern, handler))
        })
    }

    async fn watch_every<F, Fut>(
        watcher: SagaContext<A, S>,
        mut subscription: Subscription<A>,
        pattern: Pattern<A>,
        handler: F,
    ) -> SagaResult
    where
        F: Fn(SagaContext<A, S>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SagaResult> + Send + 'static,
    {
        loop {
            let action = match watcher.until_cancelled(subscription.next()).await? {
                Some(action) => action,
                None => return Ok(()),
            };
            if !pattern.matches(&action) {
                continue;
            }
            let name = format!("worker:{}", action.action_type());
            watcher.fork_with(name, |worker| -> BoxFuture<SagaResult> {
                Box::pin(handler(worker, action))
            })?;
        }
    }

    fn fork_with<M>(&self, name: String, make: M) -> Result<Task, SagaError>
    where
        M: FnOnce(SagaContext<A, S>) -> BoxFuture<SagaResult>,
    {
        self.ensure_live()?;
        let effect = Effect::Fork(name);
        let effect_id = self.trigger(effect.kind(), effect.describe());
        let result = match intercept_all(&self.tree.interceptors, effect) {
            Interception::Forward(Effect::Fork(_)) => {
                let child = SagaContext {
                    io: self.io.clone(),
                    tree: Arc::clone(&self.tree),
                    token: self.token.child(),
                    context: Arc::new(RwLock::new(self.context.read().clone())),
                    forks: Arc::default(),
                    effect_id,
                };
                let task = child.spawn(make(child.clone()));
                let mut forks = self.forks.lock();
                forks.retain(|state| state.is_running());
                forks.push(task.state());
                Ok(task)
            }
            Interception::Resolve(_) => {
                tracing::debug!(effect_id, "Fork resolved by interceptor; not started");
                let state = Arc::new(TaskState::new());
                state.finish();
                Ok(self.handle(effect_id, self.token.child(), state))
            }
            Interception::Forward(_) => Err(SagaError::UnexpectedResolution {
                effect: "fork",
                expected: "fork",
            }),
        };
        self.settle(effect_id, &result);
        result
    }

    async fn execute(&self, effect: Effect<A>) -> Result<Resolution<A>, SagaError> {
        match effect {
            Effect::Take(pattern) => {
                let mut subscription = self.io.relay.subscribe();
                loop {
                    match self.until_cancelled(subscription.next()).await? {
                        Some(action) if pattern.matches(&action) => {
                            return Ok(Resolution::Action(action));
                        }
                        Some(_) => continue,
                        None => return Err(SagaError::RelayClosed),
                    }
                }
            }
            Effect::Put(action) => {
                self.ensure_live()?;
                self.io.dispatch.dispatch(action)?;
                Ok(Resolution::Done)
            }
            Effect::Delay(duration) => {
                self.until_cancelled(tokio::time::sleep(duration)).await?;
                Ok(Resolution::Done)
            }
            Effect::GetContext(key) => Ok(Resolution::Entry(self.context.read().get(&key).cloned())),
            Effect::SetContext(entries) => {
                self.context.write().extend(entries);
                Ok(Resolution::Done)
            }
            Effect::Select | Effect::Fork(_) => Err(SagaError::UnexpectedResolution {
                effect: "run",
                expected: "a runnable effect",
            }),
            Effect::Custom(custom) => {
                tracing::debug!(
                    effect_type = %custom.effect_type,
                    "Custom effect not handled by any interceptor; suspended until cancelled"
                );
                self.token.cancelled().await;
                Err(SagaError::Cancelled)
            }
        }
    }

    fn spawn(&self, future: BoxFuture<SagaResult>) -> Task {
        let state = Arc::new(TaskState::new());
        let ctx = self.clone();
        let task_state = Arc::clone(&state);
        tokio::spawn(async move {
            // Marks the task finished even if an escalated failure panics.
            let _finished = scopeguard::guard(task_state, |state| state.finish());
            let outcome = match ctx.until_cancelled(future).await.and_then(|result| result) {
                Ok(()) => ctx.until_cancelled(ctx.join_forks()).await,
                failed => failed,
            };
            ctx.complete(outcome);
        });

        self.handle(self.effect_id, self.token.clone(), state)
    }

    fn handle(&self, effect_id: EffectId, token: CancelToken, state: Arc<TaskState>) -> Task {
        let tree = Arc::clone(&self.tree);
        Task::new(
            effect_id,
            token,
            state,
            Arc::new(move |effect_id| tree.cancelled(effect_id)),
        )
    }

    async fn join_forks(&self) {
        loop {
            let pending: Vec<Arc<TaskState>> = self
                .forks
                .lock()
                .iter()
                .filter(|state| state.is_running())
                .cloned()
                .collect();
            if pending.is_empty() {
                return;
            }
            for state in pending {
                state.wait().await;
            }
        }
    }

    fn complete(&self, outcome: SagaResult) {
        match outcome {
            Ok(()) => {
                if self.effect_id == ROOT_EFFECT_ID && !self.token.is_cancelled() {
                    tracing::debug!(saga = %self.tree.saga, "Root saga completed");
                    self.resolved(ROOT_EFFECT_ID);
                }
            }
            Err(SagaError::Cancelled) => {
                tracing::trace!(effect_id = self.effect_id, "Saga task stopped by cancellation");
            }
            Err(error) => self.tree.fail(error),
        }
    }

    async fn until_cancelled<T>(&self, future: impl Future<Output = T>) -> Result<T, SagaError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SagaError::Cancelled),
            value = future => Ok(value),
        }
    }

    fn ensure_live(&self) -> SagaResult {
        if self.token.is_cancelled() {
            return Err(SagaError::Cancelled);
        }
        Ok(())
    }

    fn trigger(&self, kind: EffectKind, description: String) -> EffectId {
        let effect_id = self.tree.next_id();
        if self.token.is_cancelled() {
            return effect_id;
        }
        tracing::trace!(effect_id, ?kind, %description, "Effect triggered");
        if let Some(hook) = &self.tree.monitor.effect_triggered {
            hook(&EffectTriggered {
                effect_id,
                parent_effect_id: self.effect_id,
                kind,
                description,
            });
        }
        effect_id
    }

    fn resolved(&self, effect_id: EffectId) {
        if self.token.is_cancelled() {
            return;
        }
        if let Some(hook) = &self.tree.monitor.effect_resolved {
            hook(&EffectResolved { effect_id });
        }
    }

    fn settle<T>(&self, effect_id: EffectId, result: &Result<T, SagaError>) {
        match result {
            Ok(_) => self.resolved(effect_id),
            Err(SagaError::Cancelled) => {}
            Err(error) => {
                if self.token.is_cancelled() {
                    return;
                }
                if let Some(hook) = &self.tree.monitor.effect_rejected {
                    hook(&EffectRejected {
                        effect_id,
                        error: error.to_string(),
                    });
                }
            }
        }
    }
}
