//! Concurrent per-operation memoization for rewrite results.
//!
//! One logical cache per operation name, all backed by a single
//! concurrent map keyed by `(operation, key)`. Shared by every worker in
//! a run. Writes are first-wins: because the wrapped functions are pure,
//! two racing computations of one key produce equal values, so
//! insert-if-absent is the only synchronization required.

use std::hash::{DefaultHasher, Hash, Hasher};

use dashmap::DashMap;

use super::Outcome;

/// The 64-bit digest of a policy's dependency key.
///
/// Two nodes with equal digests are served the same rewrite result, so a
/// policy's [`dependency_key`](super::RewritePolicy::dependency_key) must
/// cover everything its output depends on — and nothing more, since every
/// extra bit of key material is a lost cache hit.
pub type CacheKey = u64;

/// Digest an arbitrary hashable value into a [`CacheKey`].
#[must_use]
pub fn key_of<T: Hash>(value: &T) -> CacheKey {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// The memoized operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Tree dispatch (recursion + combine + identity check).
    Tree,
    /// Blob/link dispatch.
    Blob,
}

impl Operation {
    /// Stable operation name, for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tree => "tree-rewrite",
            Self::Blob => "blob-rewrite",
        }
    }
}

/// The shared memo table.
#[derive(Debug, Default)]
pub struct RewriteCache {
    slots: DashMap<(Operation, CacheKey), Outcome>,
}

impl RewriteCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored result for `(operation, key)`, if any.
    #[must_use]
    pub fn lookup(&self, operation: Operation, key: CacheKey) -> Option<Outcome> {
        self.slots
            .get(&(operation, key))
            .map(|slot| slot.value().clone())
    }

    /// Store a result unless one is already present, and return whichever
    /// value the cache converged to. Under a race the first writer wins;
    /// all candidates for one key are content-equal by the purity
    /// invariant, so every caller observes the same result either way.
    #[must_use]
    pub fn publish(&self, operation: Operation, key: CacheKey, outcome: Outcome) -> Outcome {
        self.slots
            .entry((operation, key))
            .or_insert(outcome)
            .value()
            .clone()
    }

    /// Number of cached results across all operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
