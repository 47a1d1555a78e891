//! Commit objects: ancestry nodes referencing one root tree and zero or
//! more parent commits.
//!
//! The wire layout is the classic header block followed by a blank line
//! and the free-form message:
//!
//! ```text
//! tree <id>
//! parent <id>            (zero or more, order significant)
//! author <ident>
//! committer <ident>
//! <further headers, possibly with indented continuation lines>
//!
//! <message>
//! ```
//!
//! Only `tree` and `parent` are interpreted; every other header line is
//! preserved verbatim so a parse/serialize round trip is byte-identical.
//! Commit identity is content-addressed over these bytes, which is why
//! the ancestry pass must write parents before children.
//!
//! # Sub-modules
//!
//! - [`rewriter`]: the strictly sequential ancestry pass.

pub mod rewriter;

pub use rewriter::{CommitRewriteError, CommitRewriteReport, CommitRewriter};

use crate::object::{IdError, ObjectId};

/// Errors from decoding a raw commit payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitParseError {
    /// The payload is not valid UTF-8.
    #[error("commit payload is not valid UTF-8")]
    NotUtf8,

    /// The payload has no blank line separating headers from the message.
    #[error("commit payload has no header/message separator")]
    NoSeparator,

    /// The first header line is not `tree <id>`.
    #[error("commit payload does not start with a tree header")]
    MissingTree,

    /// A `tree` or `parent` header carried an unparseable id.
    #[error("bad id in {header} header")]
    BadId {
        /// The header the id appeared in.
        header: &'static str,
        /// Why the id failed to parse.
        #[source]
        source: IdError,
    },
}

/// A decoded commit: root tree, ordered parents, opaque metadata, message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// The root tree of this snapshot.
    pub tree: ObjectId,
    /// Parent commit ids in their declared order.
    pub parents: Vec<ObjectId>,
    /// Every header line after `tree`/`parent`, verbatim and in order
    /// (author, committer, encoding, signatures, continuations).
    pub meta: Vec<String>,
    /// The commit message, everything after the blank separator line.
    pub message: String,
}

impl Commit {
    /// Decode a raw commit payload (no `commit <size>\0` framing).
    ///
    /// # Errors
    ///
    /// Returns [`CommitParseError`] when the payload is not UTF-8, lacks
    /// the header/message separator, or carries a malformed `tree` or
    /// `parent` header.
    pub fn parse(payload: &[u8]) -> Result<Self, CommitParseError> {
        let text = std::str::from_utf8(payload).map_err(|_| CommitParseError::NotUtf8)?;
        let (header, message) = text
            .split_once("\n\n")
            .ok_or(CommitParseError::NoSeparator)?;

        let mut lines = header.lines();
        let tree_line = lines.next().ok_or(CommitParseError::MissingTree)?;
        let tree_hex = tree_line
            .strip_prefix("tree ")
            .ok_or(CommitParseError::MissingTree)?;
        let tree = ObjectId::from_hex(tree_hex).map_err(|source| CommitParseError::BadId {
            header: "tree",
            source,
        })?;

        let mut parents = Vec::new();
        let mut meta = Vec::new();
        for line in lines {
            // Parent headers stop at the first non-parent line; anything
            // after that is opaque metadata carried through unchanged.
            if meta.is_empty() {
                if let Some(hex) = line.strip_prefix("parent ") {
                    let id = ObjectId::from_hex(hex).map_err(|source| CommitParseError::BadId {
                        header: "parent",
                        source,
                    })?;
                    parents.push(id);
                    continue;
                }
            }
            meta.push(line.to_string());
        }

        Ok(Self {
            tree,
            parents,
            meta,
            message: message.to_string(),
        })
    }

    /// Encode back to the raw payload. Inverse of [`Self::parse`].
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str("tree ");
        out.push_str(self.tree.as_str());
        out.push('\n');
        for parent in &self.parents {
            out.push_str("parent ");
            out.push_str(parent.as_str());
            out.push('\n');
        }
        for line in &self.meta {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    /// A copy of this commit pointing at a different tree and parents,
    /// with all other metadata unchanged.
    #[must_use]
    pub fn regrafted(&self, tree: ObjectId, parents: Vec<ObjectId>) -> Self {
        Self {
            tree,
            parents,
            meta: self.meta.clone(),
            message: self.message.clone(),
        }
    }
}
