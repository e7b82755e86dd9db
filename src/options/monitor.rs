//! Monitor hooks fired over a process tree's lifetime.

use std::sync::Arc;

use crate::error::SagaError;
use crate::process::{EffectId, EffectKind};

/// Observer callback. Hooks are composed, never replaced, when two
/// bundles are merged.
pub type Hook<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct RootSagaStarted {
    pub effect_id: EffectId,
    pub saga: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectTriggered {
    pub effect_id: EffectId,
    pub parent_effect_id: EffectId,
    pub kind: EffectKind,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectResolved {
    pub effect_id: EffectId,
}

#[derive(Debug)]
pub struct EffectRejected {
    pub effect_id: EffectId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectCancelled {
    pub effect_id: EffectId,
}

/// Named observability callbacks, all optional.
pub struct SagaMonitor<A> {
    pub root_saga_started: Option<Hook<RootSagaStarted>>,
    pub effect_triggered: Option<Hook<EffectTriggered>>,
    pub effect_resolved: Option<Hook<EffectResolved>>,
    pub effect_rejected: Option<Hook<EffectRejected>>,
    pub effect_cancelled: Option<Hook<EffectCancelled>>,
    pub action_dispatched: Option<Hook<A>>,
}

impl<A> Clone for SagaMonitor<A> {
    fn clone(&self) -> Self {
        Self {
            root_saga_started: self.root_saga_started.clone(),
            effect_triggered: self.effect_triggered.clone(),
            effect_resolved: self.effect_resolved.clone(),
            effect_rejected: self.effect_rejected.clone(),
            effect_cancelled: self.effect_cancelled.clone(),
            action_dispatched: self.action_dispatched.clone(),
        }
    }
}

impl<A> Default for SagaMonitor<A> {
    fn default() -> Self {
        Self {
            root_saga_started: None,
            effect_triggered: None,
            effect_resolved: None,
            effect_rejected: None,
            effect_cancelled: None,
            action_dispatched: None,
        }
    }
}

impl<A> SagaMonitor<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_root_saga_started(mut self, f: impl Fn(&RootSagaStarted) + Send + Sync + 'static) -> Self {
        self.root_saga_started = Some(Arc::new(f));
        self
    }

    pub fn on_effect_triggered(mut self, f: impl Fn(&EffectTriggered) + Send + Sync + 'static) -> Self {
        self.effect_triggered = Some(Arc::new(f));
        self
    }

    pub fn on_effect_resolved(mut self, f: impl Fn(&EffectResolved) + Send + Sync + 'static) -> Self {
        self.effect_resolved = Some(Arc::new(f));
        self
    }

    pub fn on_effect_rejected(mut self, f: impl Fn(&EffectRejected) + Send + Sync + 'static) -> Self {
        self.effect_rejected = Some(Arc::new(f));
        self
    }

    pub fn on_effect_cancelled(mut self, f: impl Fn(&EffectCancelled) + Send + Sync + 'static) -> Self {
        self.effect_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_action_dispatched(mut self, f: impl Fn(&A) + Send + Sync + 'static) -> Self {
        self.action_dispatched = Some(Arc::new(f));
        self
    }

    /// True when no hook is set.
    pub fn is_empty(&self) -> bool {
        self.root_saga_started.is_none()
            && self.effect_triggered.is_none()
            && self.effect_resolved.is_none()
            && self.effect_rejected.is_none()
            && self.effect_cancelled.is_none()
            && self.action_dispatched.is_none()
    }
}

/// Error handler invoked once per failed process tree.
pub type ErrorHandler = Hook<SagaError>;
