//! Reducer-owned state driven by a cancellable saga process.
//!
//! A [`SagaReducer`] gives one owner an isolated state container: a
//! reducer-driven [`StateCell`], an [`ActionRelay`] that broadcasts every
//! dispatched action to the saga, and a saga process started on first
//! activation and cancelled on teardown. Ambient options flow down an
//! explicit [`Scope`] and merge with call-local ones.

pub mod config;
pub mod error;
pub mod hook;
pub mod logging;
pub mod options;
pub mod process;
pub mod relay;
pub mod scope;
pub mod store;

pub use config::{ConfigError, Settings, UnhandledErrorPolicy};
pub use error::{DispatchError, SagaError};
pub use hook::{InitialState, SagaReducer};
pub use options::{merge, OptionBundle, SagaMonitor};
pub use process::{
    make_custom_effect, saga, Effect, Interception, Pattern, ProcessHandle, ProcessRunner,
    Resolution, Saga, SagaContext, SagaIo, SagaResult, TokioRunner,
};
pub use relay::ActionRelay;
pub use scope::Scope;
pub use store::{Action, Dispatch, Reducer, StateCell};
