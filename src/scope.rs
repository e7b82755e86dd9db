//! Explicitly threaded ambient options.
//!
//! A [`Scope`] is passed down the owner tree. The nearest enclosing
//! `provide` wins; its bundle is used as-is, without inheriting fields
//! from outer scopes. Merge explicitly before providing if inheritance is
//! wanted.

use std::sync::Arc;

use crate::options::OptionBundle;

/// Tree-scoped carrier of an ambient [`OptionBundle`].
pub struct Scope<A> {
    bundle: Arc<OptionBundle<A>>,
    depth: usize,
}

impl<A> Clone for Scope<A> {
    fn clone(&self) -> Self {
        Self {
            bundle: Arc::clone(&self.bundle),
            depth: self.depth,
        }
    }
}

impl<A> Default for Scope<A> {
    fn default() -> Self {
        Self::root()
    }
}

impl<A> Scope<A> {
    /// Root scope; its bundle is empty.
    pub fn root() -> Self {
        Self {
            bundle: Arc::new(OptionBundle::default()),
            depth: 0,
        }
    }

    /// The bundle visible at this point of the tree.
    pub fn current(&self) -> &OptionBundle<A> {
        &self.bundle
    }

    /// Nesting level; the root is 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Create a nested scope exposing `bundle` to its subtree.
    pub fn provide(&self, bundle: OptionBundle<A>) -> Scope<A> {
        Scope {
            bundle: Arc::new(bundle),
            depth: self.depth + 1,
        }
    }

    /// Run `subtree` inside a nested scope exposing `bundle`.
    pub fn provide_with<T>(&self, bundle: OptionBundle<A>, subtree: impl FnOnce(&Scope<A>) -> T) -> T {
        let nested = self.provide(bundle);
        tracing::trace!(depth = nested.depth, "Entering saga option scope");
        subtree(&nested)
    }
}
