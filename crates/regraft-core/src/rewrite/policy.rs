//! The policy plug-in contract.
//!
//! A policy is a struct of hooks composed into the engine, not a
//! subclass of it. Every hook has a default, and the defaults compose
//! into the identity rewrite: recurse everywhere, pass every blob
//! through, combine children unchanged, key on `(entry, path)`. A policy
//! overrides exactly the hooks its transformation needs.
//!
//! # Purity requirement
//!
//! Hooks may read and write the object store but must stay deterministic
//! in `(node content, node path)`: the cache and the worker pool both
//! assume a hook called twice with equal inputs produces equal output.
//! A policy whose predicate ignores position should also relax
//! [`RewritePolicy::dependency_key`] to content-only keying — position
//! in the key costs cache hits that content-only policies do not need
//! to pay for.

use super::cache::{CacheKey, key_of};
use super::{Outcome, RewriteError};
use crate::object::{Entry, Node};
use crate::store::ObjectStore;

/// What to do with a tree node, decided before any recursion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeAction {
    /// Recurse into the children with the default machinery.
    Recurse,
    /// Keep the subtree exactly as-is without reading it.
    Keep,
    /// Replace the subtree with these entries and raise the ancestor
    /// signal. The children are never visited.
    Replace(Vec<Entry>),
}

/// The override points a transformation supplies.
pub trait RewritePolicy: Send + Sync {
    /// Cache-key material for a node. Two nodes with equal keys are
    /// guaranteed to produce identical rewrite output; the engine will
    /// not recompute the second.
    fn dependency_key(&self, node: &Node) -> CacheKey {
        key_of(&(node.entry(), node.path()))
    }

    /// Decide how to treat a tree node.
    ///
    /// # Errors
    ///
    /// A failed decision aborts the run; the engine never falls back to
    /// [`TreeAction::Recurse`] on error.
    fn transform_tree(&self, store: &dyn ObjectStore, node: &Node) -> Result<TreeAction, RewriteError> {
        let _ = (store, node);
        Ok(TreeAction::Recurse)
    }

    /// Rewrite a blob or link node. The default passes it through.
    ///
    /// # Errors
    ///
    /// A failed rewrite aborts the run.
    fn transform_blob(&self, store: &dyn ObjectStore, node: &Node) -> Result<Outcome, RewriteError> {
        let _ = store;
        Ok(Outcome::keep(node.entry().clone()))
    }

    /// Post-process a tree's rewritten child entries. `matched` reports
    /// whether a replacement happened at or below any child; the hook
    /// runs after all children and may inject or drop entries (the
    /// classic use: add a synthetic entry at the root, once, only if a
    /// match occurred below and no equivalent entry already exists).
    ///
    /// # Errors
    ///
    /// A failed combine aborts the run.
    fn combine_entries(
        &self,
        store: &dyn ObjectStore,
        node: &Node,
        entries: Vec<Entry>,
        matched: bool,
    ) -> Result<Vec<Entry>, RewriteError> {
        let _ = (store, node, matched);
        Ok(entries)
    }
}

/// The identity policy: every default hook, nothing overridden.
///
/// Rewriting any tree under `PassThrough` reproduces its original id
/// without a single store write.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl RewritePolicy for PassThrough {}
