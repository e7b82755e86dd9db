//! Shared test utilities: a JSON-payload action, reducers, and polling
//! helpers.

#![allow(dead_code, unused_imports)]

use parking_lot::Mutex;
use saga_reducer::store::{from_fn, Action, FnReducer, Reducer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct TestAction {
    pub kind: String,
    pub payload: Option<Value>,
}

impl TestAction {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            payload: None,
        }
    }

    pub fn with_payload(kind: &str, payload: Value) -> Self {
        Self {
            kind: kind.to_string(),
            payload: Some(payload),
        }
    }
}

impl Action for TestAction {
    fn action_type(&self) -> &str {
        &self.kind
    }
}

pub type PayloadReducer = FnReducer<fn(&Value, &TestAction) -> Value, Value, TestAction>;

/// `(state, action) => action.payload ?? state`
pub fn payload_reducer() -> PayloadReducer {
    fn reduce(state: &Value, action: &TestAction) -> Value {
        action.payload.clone().unwrap_or_else(|| state.clone())
    }
    from_fn(reduce as fn(&Value, &TestAction) -> Value)
}

#[derive(Debug, Error)]
#[error("action '{0}' refused")]
pub struct Refused(pub String);

/// Counts accepted actions; refuses any action of type "BAD".
pub struct CountingReducer;

impl Reducer for CountingReducer {
    type State = u32;
    type Action = TestAction;
    type Error = Refused;

    fn reduce(&self, state: &u32, action: &TestAction) -> Result<u32, Refused> {
        if action.kind == "BAD" {
            return Err(Refused(action.kind.clone()));
        }
        Ok(state + 1)
    }
}

/// Thread-safe call log.
#[derive(Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| e.as_str() == entry).count()
    }
}

/// Let spawned tasks and short timers run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Poll `condition` for up to one second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
