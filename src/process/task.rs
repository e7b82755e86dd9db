//! Handle to one spawned process (root or fork).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use super::cancel::CancelToken;
use super::effect::EffectId;
use super::ProcessHandle;

pub(crate) struct TaskState {
    running: AtomicBool,
    finished: Notify,
}

impl TaskState {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            finished: Notify::new(),
        }
    }

    pub(crate) fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.finished.notify_waiters();
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait(&self) {
        let notified = self.finished.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if !self.is_running() {
            return;
        }
        notified.await;
    }
}

type CancelHook = dyn Fn(EffectId) + Send + Sync;

/// A running saga task. Cancelling it cancels its forks too.
pub struct Task {
    effect_id: EffectId,
    token: CancelToken,
    state: Arc<TaskState>,
    on_cancel: Arc<CancelHook>,
}

impl Task {
    pub(crate) fn new(
        effect_id: EffectId,
        token: CancelToken,
        state: Arc<TaskState>,
        on_cancel: Arc<CancelHook>,
    ) -> Self {
        Self {
            effect_id,
            token,
            state,
            on_cancel,
        }
    }

    /// Effect id under which this task was started.
    pub fn effect_id(&self) -> EffectId {
        self.effect_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the task body and its attached forks have returned,
    /// or the task was cancelled.
    pub async fn finished(&self) {
        self.state.wait().await
    }

    pub(crate) fn state(&self) -> Arc<TaskState> {
        Arc::clone(&self.state)
    }
}

impl ProcessHandle for Task {
    fn cancel(&self) {
        if self.token.cancel() {
            (self.on_cancel)(self.effect_id);
        }
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }
}
