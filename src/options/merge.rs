//! Per-field merge rules for [`OptionBundle`].
//!
//! All functions are pure and total: any combination of absent fields is
//! accepted, and two absent inputs always produce an absent output.

use std::sync::Arc;

use super::monitor::{Hook, SagaMonitor};
use super::{ContextMap, InterceptorChain, OptionBundle};

/// Combine two optional callbacks.
///
/// Both present: a new callback that runs `ambient` then `local` with the
/// same argument. One present: that callback, unchanged.
pub fn merge_void_hooks<T: ?Sized + 'static>(
    ambient: Option<&Hook<T>>,
    local: Option<&Hook<T>>,
) -> Option<Hook<T>> {
    match (ambient, local) {
        (None, None) => None,
        (Some(ambient), None) => Some(Arc::clone(ambient)),
        (None, Some(local)) => Some(Arc::clone(local)),
        (Some(ambient), Some(local)) => {
            let ambient = Arc::clone(ambient);
            let local = Arc::clone(local);
            Some(Arc::new(move |arg: &T| {
                ambient(arg);
                local(arg);
            }))
        }
    }
}

/// Merge two monitors hook by hook. A hook absent from both stays absent.
pub fn merge_monitors<A: 'static>(
    ambient: Option<&SagaMonitor<A>>,
    local: Option<&SagaMonitor<A>>,
) -> Option<SagaMonitor<A>> {
    match (ambient, local) {
        (None, None) => None,
        (Some(ambient), None) => Some(ambient.clone()),
        (None, Some(local)) => Some(local.clone()),
        (Some(ambient), Some(local)) => Some(SagaMonitor {
            root_saga_started: merge_void_hooks(
                ambient.root_saga_started.as_ref(),
                local.root_saga_started.as_ref(),
            ),
            effect_triggered: merge_void_hooks(
                ambient.effect_triggered.as_ref(),
                local.effect_triggered.as_ref(),
            ),
            effect_resolved: merge_void_hooks(
                ambient.effect_resolved.as_ref(),
                local.effect_resolved.as_ref(),
            ),
            effect_rejected: merge_void_hooks(
                ambient.effect_rejected.as_ref(),
                local.effect_rejected.as_ref(),
            ),
            effect_cancelled: merge_void_hooks(
                ambient.effect_cancelled.as_ref(),
                local.effect_cancelled.as_ref(),
            ),
            action_dispatched: merge_void_hooks(
                ambient.action_dispatched.as_ref(),
                local.action_dispatched.as_ref(),
            ),
        }),
    }
}

/// Shallow union; `local` entries override `ambient` ones.
pub fn merge_context(ambient: Option<&ContextMap>, local: Option<&ContextMap>) -> Option<ContextMap> {
    match (ambient, local) {
        (None, None) => None,
        (Some(ambient), None) => Some(ambient.clone()),
        (None, Some(local)) => Some(local.clone()),
        (Some(ambient), Some(local)) => {
            let mut merged = ambient.clone();
            merged.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(merged)
        }
    }
}

/// Concatenate chains, ambient links first.
pub fn merge_interceptors<A>(
    ambient: Option<&InterceptorChain<A>>,
    local: Option<&InterceptorChain<A>>,
) -> Option<InterceptorChain<A>> {
    match (ambient, local) {
        (None, None) => None,
        (Some(ambient), None) => Some(ambient.clone()),
        (None, Some(local)) => Some(local.clone()),
        (Some(ambient), Some(local)) => Some(ambient.iter().chain(local).cloned().collect()),
    }
}

/// Merge an ambient bundle with a call-local one.
pub fn merge<A: 'static>(ambient: &OptionBundle<A>, local: &OptionBundle<A>) -> OptionBundle<A> {
    OptionBundle {
        on_error: merge_void_hooks(ambient.on_error.as_ref(), local.on_error.as_ref()),
        saga_monitor: merge_monitors(ambient.saga_monitor.as_ref(), local.saga_monitor.as_ref()),
        context: merge_context(ambient.context.as_ref(), local.context.as_ref()),
        effect_interceptors: merge_interceptors(
            ambient.effect_interceptors.as_ref(),
            local.effect_interceptors.as_ref(),
        ),
    }
}
