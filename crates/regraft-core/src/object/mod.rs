//! Content-addressed object model shared by every phase of a rewrite.
//!
//! # Identity vs. position
//!
//! - **Identity** is the content hash: [`ObjectId`] names an immutable
//!   payload, and identical bytes always carry the same id.
//! - **Position** is where an object sits in one particular snapshot:
//!   [`TreePath`] is the name chain from the snapshot root down to a node.
//!
//! A [`Node`] couples the two. Two nodes may share an [`Entry`] (same
//! content at two historical points) while sitting at different paths;
//! policies decide how much of that distinction matters to them.
//!
//! # Sub-modules
//!
//! - [`id`]: [`ObjectId`] — hex content identifier.
//! - [`entry`]: [`Entry`], [`Mode`], [`Kind`] — one row of a tree listing.
//! - [`path`]: [`TreePath`], [`Node`] — positional metadata.

pub mod entry;
pub mod id;
pub mod path;

pub use entry::{Entry, Kind, Mode};
pub use id::{IdError, ObjectId};
pub use path::{Node, TreePath};
