//! regraft-core: rewrite every historical snapshot of a repository
//! according to a pluggable policy, then regenerate the commit graph to
//! point at the rewritten snapshots — without ever checking a snapshot
//! out to a working directory.
//!
//! # Phases
//!
//! 1. **Tree rewrite** ([`sched::RootScheduler`]): a bounded worker pool
//!    runs the memoizing [`rewrite::TreeRewriter`] over the deduplicated
//!    set of root tree ids, persisting each old→new record into the
//!    durable [`rootmap::RootMap`] the moment it completes.
//! 2. **Commit rewrite** ([`commit::CommitRewriter`]): a strictly
//!    sequential pass re-emits the ancestry oldest-first, swapping every
//!    root and parent reference for its mapped counterpart.
//!
//! Everything runs against the four-operation [`store::ObjectStore`]
//! interface; the `git` binary ([`store::git::GitStore`]) and an
//! in-memory BLAKE3 store ([`store::memory::MemoryStore`]) are the two
//! bundled backends.
//!
//! # Conventions
//!
//! - **Errors**: per-module `thiserror` enums carrying a machine-readable
//!   [`error::ErrorCode`]; every failure is fatal to the run.
//! - **Logging**: `tracing` macros (`info!`, `debug!`, `trace!`).

pub mod commit;
pub mod error;
pub mod lock;
pub mod object;
pub mod policy;
pub mod rewrite;
pub mod rootmap;
pub mod sched;
pub mod store;

pub use commit::{Commit, CommitRewriter};
pub use error::ErrorCode;
pub use object::{Entry, Kind, Mode, Node, ObjectId, TreePath};
pub use rewrite::{PassThrough, RewritePolicy, TreeAction, TreeRewriter};
pub use rootmap::{ResumeMode, RootMap};
pub use sched::{RootScheduler, RunSummary, SchedulerConfig};
