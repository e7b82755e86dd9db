//! Error types for dispatching actions and running sagas.

use thiserror::Error;

/// Errors surfaced synchronously by [`Dispatch`](crate::store::Dispatch).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The reducer refused the action. Nothing was committed or relayed.
    #[error("Reducer failed on action '{action_type}': {source}")]
    Reducer {
        action_type: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors that end a saga process.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The process tree was cancelled while this saga was running.
    #[error("Saga cancelled")]
    Cancelled,

    /// A `put` effect reached a reducer that rejected the action.
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// The action relay was closed while a taker was waiting.
    #[error("Action relay closed")]
    RelayClosed,

    /// An interceptor resolved an effect with a value of the wrong shape.
    #[error("Effect '{effect}' resolved with unexpected value (expected {expected})")]
    UnexpectedResolution {
        effect: &'static str,
        expected: &'static str,
    },

    /// Failure raised by saga code itself.
    #[error("Saga failed: {message}")]
    Failed { message: String },
}

impl SagaError {
    /// Shorthand for [`SagaError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        SagaError::Failed {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SagaError::Cancelled)
    }
}
