//! Saga run options and how two sources of them combine.
//!
//! An [`OptionBundle`] can come from the enclosing [`Scope`](crate::scope::Scope)
//! and from the call site. [`merge`] combines them with per-field rules:
//!
//! | Field | Rule |
//! |-------|------|
//! | `on_error` | ambient handler, then local handler |
//! | `saga_monitor` | per hook, ambient then local |
//! | `context` | union, local wins on key collision |
//! | `effect_interceptors` | ambient links first, then local |

mod merge;
mod monitor;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::SagaError;
use crate::process::EffectInterceptor;

pub use merge::{merge, merge_context, merge_interceptors, merge_monitors, merge_void_hooks};
pub use monitor::{
    EffectCancelled, EffectRejected, EffectResolved, EffectTriggered, ErrorHandler, Hook,
    RootSagaStarted, SagaMonitor,
};

/// Key/value context readable by sagas via `get_context`.
pub type ContextMap = HashMap<String, Value>;

/// Ordered interceptor chain.
pub type InterceptorChain<A> = Vec<Arc<dyn EffectInterceptor<A>>>;

/// Options forwarded to the process runner. Every field is optional;
/// an absent field and a present-but-empty one are treated alike.
pub struct OptionBundle<A> {
    pub on_error: Option<ErrorHandler>,
    pub saga_monitor: Option<SagaMonitor<A>>,
    pub context: Option<ContextMap>,
    pub effect_interceptors: Option<InterceptorChain<A>>,
}

impl<A> Clone for OptionBundle<A> {
    fn clone(&self) -> Self {
        Self {
            on_error: self.on_error.clone(),
            saga_monitor: self.saga_monitor.clone(),
            context: self.context.clone(),
            effect_interceptors: self.effect_interceptors.clone(),
        }
    }
}

impl<A> Default for OptionBundle<A> {
    fn default() -> Self {
        Self {
            on_error: None,
            saga_monitor: None,
            context: None,
            effect_interceptors: None,
        }
    }
}

impl<A> OptionBundle<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_error(mut self, f: impl Fn(&SagaError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn monitor(mut self, monitor: SagaMonitor<A>) -> Self {
        self.saga_monitor = Some(monitor);
        self
    }

    pub fn context_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Append a link to the end of the interceptor chain.
    pub fn interceptor(mut self, interceptor: impl EffectInterceptor<A> + 'static) -> Self {
        self.effect_interceptors
            .get_or_insert_with(Vec::new)
            .push(Arc::new(interceptor));
        self
    }

    /// True when no field carries anything.
    pub fn is_empty(&self) -> bool {
        self.on_error.is_none()
            && self.saga_monitor.as_ref().map_or(true, SagaMonitor::is_empty)
            && self.context.as_ref().map_or(true, HashMap::is_empty)
            && self.effect_interceptors.as_ref().map_or(true, Vec::is_empty)
    }

    /// Context entries, empty if unset.
    pub fn context_or_empty(&self) -> ContextMap {
        self.context.clone().unwrap_or_default()
    }

    /// Interceptor chain, empty if unset.
    pub fn interceptors_or_empty(&self) -> InterceptorChain<A> {
        self.effect_interceptors.clone().unwrap_or_default()
    }
}
