//! Phase 2: sequential ancestry regeneration.
//!
//! Runs only after every root has a map record. Commit identity is
//! content-addressed over parent identities, so a commit can only be
//! re-emitted once its parents already were: the walk is parents-first
//! and single-threaded by necessity, not convenience.
//!
//! # Algorithm
//!
//! 1. Collect the ancestry by walking backward from the requested tips.
//! 2. Emit in iterative post-order (parents before children).
//! 3. For each commit: swap the tree for its map record, swap each
//!    parent for its already-emitted new id, keep parent order and all
//!    other metadata, write, remember the new id.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::error::ErrorCode;
use crate::object::ObjectId;
use crate::store::{CommitStore, StoreError};

/// Errors from the ancestry pass.
#[derive(Debug, thiserror::Error)]
pub enum CommitRewriteError {
    /// Reading or writing a commit failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A commit's root tree has no map record.
    #[error("commit {commit} references root {root}, which has no map record")]
    UnmappedRoot {
        /// The commit whose root is unmapped.
        commit: ObjectId,
        /// The unmapped root tree.
        root: ObjectId,
    },

    /// A commit's parent was never emitted — the ancestry walk and the
    /// emit order disagree, which means the input graph has a cycle.
    #[error("commit {commit} references parent {parent} outside the walked ancestry")]
    UnmappedParent {
        /// The commit whose parent is unmapped.
        commit: ObjectId,
        /// The parent that was never emitted.
        parent: ObjectId,
    },
}

impl CommitRewriteError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Store(err) => err.code(),
            Self::UnmappedRoot { .. } => ErrorCode::MissingRootMapping,
            Self::UnmappedParent { .. } => ErrorCode::MissingParentMapping,
        }
    }
}

/// The outcome of an ancestry pass.
#[derive(Debug, Clone)]
pub struct CommitRewriteReport {
    /// Old commit id → new commit id, for every walked commit.
    pub commits: HashMap<ObjectId, ObjectId>,
    /// The new id of each requested tip, in request order.
    pub tips: Vec<ObjectId>,
}

/// The sequential commit rewriter.
pub struct CommitRewriter<'a, S: CommitStore + ?Sized> {
    store: &'a S,
    roots: &'a HashMap<ObjectId, ObjectId>,
}

impl<'a, S: CommitStore + ?Sized> CommitRewriter<'a, S> {
    /// A rewriter resolving roots through `roots` (the loaded map).
    pub const fn new(store: &'a S, roots: &'a HashMap<ObjectId, ObjectId>) -> Self {
        Self { store, roots }
    }

    /// Re-emit the full ancestry of `tips`.
    ///
    /// # Errors
    ///
    /// Fatal on any store failure, on a commit whose root has no map
    /// record, and on a parent reference that escapes the walked
    /// ancestry (a cyclic or truncated input graph).
    pub fn rewrite(&self, tips: &[ObjectId]) -> Result<CommitRewriteReport, CommitRewriteError> {
        let order = self.ancestry_oldest_first(tips)?;
        info!(commits = order.len(), "rewriting commits");

        let mut commits: HashMap<ObjectId, ObjectId> = HashMap::with_capacity(order.len());
        for old_id in order {
            let commit = self.store.read_commit(&old_id)?;

            let new_tree = self
                .roots
                .get(&commit.tree)
                .ok_or_else(|| CommitRewriteError::UnmappedRoot {
                    commit: old_id.clone(),
                    root: commit.tree.clone(),
                })?
                .clone();

            let mut new_parents = Vec::with_capacity(commit.parents.len());
            for parent in &commit.parents {
                let mapped =
                    commits
                        .get(parent)
                        .ok_or_else(|| CommitRewriteError::UnmappedParent {
                            commit: old_id.clone(),
                            parent: parent.clone(),
                        })?;
                new_parents.push(mapped.clone());
            }

            let new_id = self.store.write_commit(&commit.regrafted(new_tree, new_parents))?;
            debug!(old = %old_id, new = %new_id, "commit rewritten");
            commits.insert(old_id, new_id);
        }

        let mut new_tips = Vec::with_capacity(tips.len());
        for tip in tips {
            let mapped = commits
                .get(tip)
                .ok_or_else(|| CommitRewriteError::UnmappedParent {
                    commit: tip.clone(),
                    parent: tip.clone(),
                })?;
            new_tips.push(mapped.clone());
        }

        Ok(CommitRewriteReport {
            commits,
            tips: new_tips,
        })
    }

    /// Every commit reachable from `tips`, parents before children.
    ///
    /// Iterative post-order DFS: an explicit stack keeps arbitrarily
    /// long histories off the call stack. Each node is pushed twice —
    /// once to expand its parents, once (`emit`) after they finished.
    fn ancestry_oldest_first(
        &self,
        tips: &[ObjectId],
    ) -> Result<Vec<ObjectId>, CommitRewriteError> {
        let mut order = Vec::new();
        let mut expanded = HashSet::new();
        let mut stack: Vec<(ObjectId, bool)> = tips
            .iter()
            .rev()
            .map(|tip| (tip.clone(), false))
            .collect();

        while let Some((id, emit)) = stack.pop() {
            if emit {
                // Pushed exactly once, under the expansion guard below.
                order.push(id);
                continue;
            }
            if !expanded.insert(id.clone()) {
                continue;
            }
            let commit = self.store.read_commit(&id)?;
            stack.push((id, true));
            for parent in commit.parents.iter().rev() {
                if !expanded.contains(parent) {
                    stack.push((parent.clone(), false));
                }
            }
        }

        Ok(order)
    }
}
