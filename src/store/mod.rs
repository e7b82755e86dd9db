//! Reducer-driven state primitives.
//!
//! ```text
//! dispatch(action) ──→ Reducer ──→ StateCell ──→ get_state()
//!        │                                          ↑
//!        └──→ delivery queue ──→ ActionRelay ──→ saga
//! ```
//!
//! - **Action**: tagged value flowing into both the reducer and the relay
//! - **Reducer**: pure `(state, action) -> state` transition
//! - **StateCell**: the single owner of the current state
//! - **Dispatch**: stable handle that commits then enqueues for delivery

mod action;
mod cell;
mod dispatch;
mod reducer;

pub use action::Action;
pub use cell::{StateAccessor, StateCell};
pub use dispatch::Dispatch;
pub use reducer::{from_fn, FnReducer, Reducer};
