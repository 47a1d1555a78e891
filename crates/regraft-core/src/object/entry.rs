//! Tree entries: one named, content-addressed child reference.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::ObjectId;

/// Errors from parsing a [`Mode`] or [`Kind`] token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    /// The mode token was not a valid octal number.
    #[error("invalid octal mode token {token:?}")]
    BadMode {
        /// The rejected token.
        token: String,
    },

    /// The object-kind token was not one of the known kinds.
    #[error("unknown object kind token {token:?}")]
    BadKind {
        /// The rejected token.
        token: String,
    },
}

/// Octal file mode attached to a tree entry.
///
/// Stored as the raw mode bits so unusual-but-valid historical modes
/// survive a rewrite unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mode(u32);

impl Mode {
    /// Directory.
    pub const TREE: Self = Self(0o040_000);
    /// Regular file.
    pub const BLOB: Self = Self(0o100_644);
    /// Executable file.
    pub const BLOB_EXEC: Self = Self(0o100_755);
    /// Symbolic link.
    pub const SYMLINK: Self = Self(0o120_000);
    /// Pinned reference to an external commit (submodule).
    pub const LINK: Self = Self(0o160_000);

    /// Parse a mode from its octal token (e.g. `"100644"`, `"040000"`).
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::BadMode`] if the token is not octal.
    pub fn from_octal(token: &str) -> Result<Self, EntryError> {
        u32::from_str_radix(token, 8)
            .map(Self)
            .map_err(|_| EntryError::BadMode {
                token: token.to_string(),
            })
    }

    /// The raw mode bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Mode {
    /// Formats as the six-digit zero-padded octal token used on the wire.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.0)
    }
}

/// What an entry's id points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// A nested tree (directory).
    Tree,
    /// A byte payload (file content).
    Blob,
    /// A pinned external commit (submodule pointer). The target id is not
    /// resolvable through the object store that owns the entry.
    Link,
}

impl Kind {
    /// Parse the wire token (`tree` / `blob` / `commit`).
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::BadKind`] for any other token.
    pub fn from_token(token: &str) -> Result<Self, EntryError> {
        match token {
            "tree" => Ok(Self::Tree),
            "blob" => Ok(Self::Blob),
            "commit" => Ok(Self::Link),
            _ => Err(EntryError::BadKind {
                token: token.to_string(),
            }),
        }
    }

    /// The wire token for this kind.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Link => "commit",
        }
    }
}

/// One row of a tree listing: `(mode, kind, id, name)`.
///
/// Immutable, content-addressed reference to a child object. Equality is
/// full-tuple equality; position in the snapshot is carried separately by
/// [`super::Node`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// File mode bits.
    pub mode: Mode,
    /// What the id points at.
    pub kind: Kind,
    /// Content id of the child.
    pub id: ObjectId,
    /// Name of the child within its parent tree.
    pub name: String,
}

impl Entry {
    /// Build an entry.
    #[must_use]
    pub fn new(mode: Mode, kind: Kind, id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            mode,
            kind,
            id,
            name: name.into(),
        }
    }

    /// A nested-tree entry with the conventional directory mode.
    #[must_use]
    pub fn tree(id: ObjectId, name: impl Into<String>) -> Self {
        Self::new(Mode::TREE, Kind::Tree, id, name)
    }

    /// A regular-file entry.
    #[must_use]
    pub fn blob(id: ObjectId, name: impl Into<String>) -> Self {
        Self::new(Mode::BLOB, Kind::Blob, id, name)
    }

    /// A pinned external-commit entry (submodule pointer).
    #[must_use]
    pub fn link(target: ObjectId, name: impl Into<String>) -> Self {
        Self::new(Mode::LINK, Kind::Link, target, name)
    }
}
