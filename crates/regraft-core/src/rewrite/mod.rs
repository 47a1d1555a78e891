//! The generic tree rewrite engine.
//!
//! A recursive, content-addressed, memoizing transformer over snapshot
//! trees. The engine owns the recursion, the memoization, and the
//! identity-preservation check; everything that decides *what changes*
//! lives behind the [`RewritePolicy`] hooks.
//!
//! # Soundness
//!
//! Rewriting is a pure function of `(content, path)` under a fixed
//! policy. That single invariant is what makes the shared cache and the
//! cross-root parallelism in [`crate::sched`] correct: duplicate
//! concurrent computation of one key is a wasted effort, never a wrong
//! answer.
//!
//! # Sub-modules
//!
//! - [`cache`]: the concurrent per-operation memo table.
//! - [`policy`]: the plug-in contract and its defaults.
//! - [`engine`]: the dispatcher itself.

pub mod cache;
pub mod engine;
pub mod policy;

pub use cache::{CacheKey, Operation, RewriteCache, key_of};
pub use engine::TreeRewriter;
pub use policy::{PassThrough, RewritePolicy, TreeAction};

use crate::error::ErrorCode;
use crate::object::Entry;
use crate::rootmap::MapError;
use crate::store::StoreError;

/// Errors surfaced while rewriting. Every one is fatal to the run; the
/// engine never substitutes default behavior for a failed hook.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// The object store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A policy hook failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Recording the root mapping failed.
    #[error(transparent)]
    Map(#[from] MapError),

    /// A root rewrite collapsed to something other than one tree entry.
    #[error("root rewrite produced {count} entries, expected exactly one")]
    NonScalarRoot {
        /// How many entries came back.
        count: usize,
    },
}

impl RewriteError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Store(err) => err.code(),
            Self::Policy(_) => ErrorCode::PolicyFailure,
            Self::Map(err) => err.code(),
            Self::NonScalarRoot { .. } => ErrorCode::InternalUnexpected,
        }
    }
}

/// A domain failure raised by a policy hook (e.g. a lookup table missing
/// an id the policy needs).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PolicyError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PolicyError {
    /// A policy failure with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// A policy failure wrapping an underlying cause.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// What one rewrite operation produced: the replacement entries for the
/// node, plus the ancestor signal.
///
/// `matched` is the explicit form of "something below here was
/// transformed": set when a policy replaces a node, OR-ed across
/// children on the way back up, and observed by
/// [`RewritePolicy::combine_entries`] at each ancestor. Threading it
/// through the return value keeps the data flow visible instead of
/// hiding it in a second keyed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Entries standing in for the node in its parent (usually one).
    pub entries: Vec<Entry>,
    /// Whether a policy replacement happened at or below this node.
    pub matched: bool,
}

impl Outcome {
    /// Entries plus an explicit signal.
    #[must_use]
    pub const fn new(entries: Vec<Entry>, matched: bool) -> Self {
        Self { entries, matched }
    }

    /// Pass a node through unchanged.
    #[must_use]
    pub fn keep(entry: Entry) -> Self {
        Self {
            entries: vec![entry],
            matched: false,
        }
    }

    /// Replace a node, raising the ancestor signal.
    #[must_use]
    pub const fn replace(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            matched: true,
        }
    }
}
