//! Object-store interface and its two bundled implementations.
//!
//! The rewrite engine is written against the four-operation
//! [`ObjectStore`] trait and never against a particular backing tool; any
//! content-addressed store that implements it is substitutable. The
//! second, narrower [`CommitStore`] trait covers the ancestry pass.
//!
//! # Implementations
//!
//! - [`memory::MemoryStore`] — BLAKE3-addressed in-process store; the
//!   reference semantics, used by tests and benches.
//! - [`git::GitStore`] — shells out to the `git` binary (`ls-tree`,
//!   `mktree`, `cat-file`, `hash-object`).
//!
//! # Contract
//!
//! Writes are idempotent: storing an identical content-set yields the
//! same id without error. Reads of unknown ids fail with
//! [`StoreError::Missing`] — the engine treats every store failure as
//! fatal to the run.

pub mod git;
pub mod memory;

use std::io;

use crate::commit::Commit;
use crate::error::ErrorCode;
use crate::object::{Entry, ObjectId};

/// Errors from object-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object does not exist in the store.
    #[error("object {id} not found in store")]
    Missing {
        /// The id that failed to resolve.
        id: ObjectId,
    },

    /// The object exists but is not of the kind the operation requires.
    #[error("object {id} is not a {expected}")]
    WrongKind {
        /// The id of the mismatched object.
        id: ObjectId,
        /// The kind the operation needed (`tree`, `blob`, `commit`).
        expected: &'static str,
    },

    /// A payload could not be decoded (tree listing line, commit object).
    #[error("malformed {what}: {detail}")]
    Malformed {
        /// What was being decoded.
        what: &'static str,
        /// Decoder-specific detail.
        detail: String,
    },

    /// An underlying I/O operation failed.
    #[error("store i/o failure during {action}")]
    Io {
        /// The operation that failed.
        action: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A store subprocess exited unsuccessfully.
    #[error("`git {args}` failed ({status}): {stderr}")]
    Subprocess {
        /// The subcommand and arguments, space-joined.
        args: String,
        /// Exit status description.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Missing { .. } => ErrorCode::ObjectMissing,
            Self::WrongKind { .. } | Self::Malformed { .. } => ErrorCode::MalformedObject,
            Self::Io { .. } | Self::Subprocess { .. } => ErrorCode::StoreIo,
        }
    }
}

/// The four-operation content-addressed store the engine runs against.
///
/// Implementations must be shareable across worker threads; all methods
/// take `&self`.
pub trait ObjectStore: Send + Sync {
    /// List a tree's entries in their declared order.
    ///
    /// # Errors
    ///
    /// [`StoreError::Missing`] if the id is unknown, [`StoreError::WrongKind`]
    /// if it names a non-tree.
    fn list_tree(&self, id: &ObjectId) -> Result<Vec<Entry>, StoreError>;

    /// Write a tree from entries and return its id.
    ///
    /// Idempotent: an identical content-set always yields the same id.
    ///
    /// # Errors
    ///
    /// Any I/O or encoding failure.
    fn write_tree(&self, entries: &[Entry]) -> Result<ObjectId, StoreError>;

    /// Read a blob's bytes.
    ///
    /// # Errors
    ///
    /// [`StoreError::Missing`] if the id is unknown, [`StoreError::WrongKind`]
    /// if it names a non-blob.
    fn read_blob(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError>;

    /// Write a blob and return its id. Idempotent like [`Self::write_tree`].
    ///
    /// # Errors
    ///
    /// Any I/O failure.
    fn write_blob(&self, bytes: &[u8]) -> Result<ObjectId, StoreError>;
}

/// Commit read/write surface for the sequential ancestry pass.
pub trait CommitStore: Send + Sync {
    /// Read and decode a commit object.
    ///
    /// # Errors
    ///
    /// [`StoreError::Missing`], [`StoreError::WrongKind`], or
    /// [`StoreError::Malformed`] if the payload does not decode.
    fn read_commit(&self, id: &ObjectId) -> Result<Commit, StoreError>;

    /// Encode and write a commit object, returning its id. Idempotent.
    ///
    /// # Errors
    ///
    /// Any I/O or encoding failure.
    fn write_commit(&self, commit: &Commit) -> Result<ObjectId, StoreError>;
}
