//! Effect values and the interceptor chain.
//!
//! A saga describes each operation it wants performed as an [`Effect`].
//! Before the runner executes it, the effect passes through the
//! interceptor chain in order. Each link may forward the effect
//! (unchanged or transformed) or resolve it on the spot.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::options::ContextMap;
use crate::store::Action;

/// Identifier assigned to each triggered effect, unique per process tree.
pub type EffectId = u64;

/// Coarse classification of an effect, reported to monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Root,
    Take,
    Put,
    Select,
    Delay,
    Fork,
    GetContext,
    SetContext,
    Custom,
}

/// Matcher deciding which actions a take accepts.
pub enum Pattern<A> {
    /// Every action.
    Any,
    /// Actions whose `action_type` equals the string.
    Type(String),
    /// Actions whose `action_type` is one of the strings.
    OneOf(Vec<String>),
    Predicate(Arc<dyn Fn(&A) -> bool + Send + Sync>),
}

impl<A: Action> Pattern<A> {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        Pattern::Predicate(Arc::new(f))
    }

    pub fn matches(&self, action: &A) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Type(ty) => action.action_type() == ty,
            Pattern::OneOf(types) => types.iter().any(|ty| action.action_type() == ty),
            Pattern::Predicate(f) => f(action),
        }
    }
}

impl<A> Clone for Pattern<A> {
    fn clone(&self) -> Self {
        match self {
            Pattern::Any => Pattern::Any,
            Pattern::Type(ty) => Pattern::Type(ty.clone()),
            Pattern::OneOf(types) => Pattern::OneOf(types.clone()),
            Pattern::Predicate(f) => Pattern::Predicate(Arc::clone(f)),
        }
    }
}

impl<A> fmt::Debug for Pattern<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => write!(f, "*"),
            Pattern::Type(ty) => write!(f, "{}", ty),
            Pattern::OneOf(types) => write!(f, "[{}]", types.join(", ")),
            Pattern::Predicate(_) => write!(f, "<predicate>"),
        }
    }
}

impl<A> From<&str> for Pattern<A> {
    fn from(ty: &str) -> Self {
        Pattern::Type(ty.to_string())
    }
}

impl<A> From<String> for Pattern<A> {
    fn from(ty: String) -> Self {
        Pattern::Type(ty)
    }
}

impl<A> From<Vec<&str>> for Pattern<A> {
    fn from(types: Vec<&str>) -> Self {
        Pattern::OneOf(types.into_iter().map(str::to_string).collect())
    }
}

/// Non-standard effect, handled only by interceptors.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEffect {
    pub effect_type: String,
    pub payload: Value,
}

/// An operation requested by a saga.
///
/// `Select` and `Fork` stand in for effects whose payload (a selector, a
/// saga body) is not a value. Interceptors see them like any other
/// effect; resolving a fork skips starting it, resolving a select fails
/// the read with [`SagaError::UnexpectedResolution`](crate::SagaError).
#[derive(Debug, Clone)]
pub enum Effect<A> {
    /// Wait for the next relayed action matching the pattern.
    Take(Pattern<A>),
    /// Dispatch an action through the owner's dispatch path.
    Put(A),
    /// Read the latest committed state.
    Select,
    /// Start a child task with the given name.
    Fork(String),
    /// Pause for a duration.
    Delay(Duration),
    /// Read a key from the process context.
    GetContext(String),
    /// Merge entries into the process context.
    SetContext(ContextMap),
    Custom(CustomEffect),
}

impl<A: Action> Effect<A> {
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Take(_) => EffectKind::Take,
            Effect::Put(_) => EffectKind::Put,
            Effect::Select => EffectKind::Select,
            Effect::Fork(_) => EffectKind::Fork,
            Effect::Delay(_) => EffectKind::Delay,
            Effect::GetContext(_) => EffectKind::GetContext,
            Effect::SetContext(_) => EffectKind::SetContext,
            Effect::Custom(_) => EffectKind::Custom,
        }
    }

    /// Short human-readable description for monitors and logs.
    pub fn describe(&self) -> String {
        match self {
            Effect::Take(pattern) => format!("take({:?})", pattern),
            Effect::Put(action) => format!("put({})", action.action_type()),
            Effect::Select => "select".to_string(),
            Effect::Fork(name) => format!("fork({})", name),
            Effect::Delay(duration) => format!("delay({}ms)", duration.as_millis()),
            Effect::GetContext(key) => format!("getContext({})", key),
            Effect::SetContext(map) => {
                let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
                keys.sort_unstable();
                format!("setContext({})", keys.join(", "))
            }
            Effect::Custom(custom) => format!("custom({})", custom.effect_type),
        }
    }

    /// The type tag if this is a custom effect with that tag.
    pub fn as_custom(&self, effect_type: &str) -> Option<&CustomEffect> {
        match self {
            Effect::Custom(custom) if custom.effect_type == effect_type => Some(custom),
            _ => None,
        }
    }
}

/// Build a custom effect tagged `effect_type`.
///
/// Without an interceptor that handles it, running a custom effect never
/// resolves; the saga stays suspended until cancelled.
pub fn make_custom_effect<A>(effect_type: impl Into<String>, payload: Value) -> Effect<A> {
    Effect::Custom(CustomEffect {
        effect_type: effect_type.into(),
        payload,
    })
}

/// Value an effect resolved with.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<A> {
    /// Completed without a value (put, delay, setContext).
    Done,
    /// An action (take).
    Action(A),
    /// A context lookup; `None` when the key is absent.
    Entry(Option<Value>),
    /// A JSON value chosen by an interceptor.
    Value(Value),
}

/// Outcome of one interceptor link.
pub enum Interception<A> {
    /// Pass the (possibly transformed) effect to the next link.
    Forward(Effect<A>),
    /// Stop the chain and resolve the effect with this value.
    Resolve(Resolution<A>),
}

/// One link of the effect interceptor chain.
pub trait EffectInterceptor<A>: Send + Sync {
    fn intercept(&self, effect: Effect<A>) -> Interception<A>;
}

impl<A, F> EffectInterceptor<A> for F
where
    F: Fn(Effect<A>) -> Interception<A> + Send + Sync,
{
    fn intercept(&self, effect: Effect<A>) -> Interception<A> {
        self(effect)
    }
}

/// Run `effect` through `chain` in order.
pub fn intercept_all<A>(chain: &[Arc<dyn EffectInterceptor<A>>], effect: Effect<A>) -> Interception<A> {
    let mut current = effect;
    for link in chain {
        match link.intercept(current) {
            Interception::Forward(next) => current = next,
            resolved @ Interception::Resolve(_) => return resolved,
        }
    }
    Interception::Forward(current)
}
