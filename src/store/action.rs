//! Base trait for actions.

/// An action flowing through dispatch, the reducer and the relay.
///
/// Actions are immutable once created. `action_type` is the discriminant
/// used by take patterns, e.g. `"FETCH_SUCCESS"`.
pub trait Action: Clone + std::fmt::Debug + Send + Sync + 'static {
    fn action_type(&self) -> &str;
}
