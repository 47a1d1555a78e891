//! Positional metadata: where a node sits within one snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entry::{Entry, Kind, Mode};
use super::id::ObjectId;

/// The ordered name chain from a snapshot root down to a node.
///
/// Empty at the root. Paths compare and hash by their component names, so
/// a path can serve as (part of) a cache key for position-sensitive
/// policies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreePath(Vec<String>);

impl TreePath {
    /// The empty path (the snapshot root).
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from its components.
    #[must_use]
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// Parse a `/`-separated path string. An empty string is the root.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self(path.split('/').map(str::to_string).collect())
    }

    /// The path one level deeper, ending in `name`.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        let mut components = self.0.clone();
        components.push(name.to_string());
        Self(components)
    }

    /// Number of components (0 at the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the snapshot root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The path components.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Whether `prefix` is a leading subsequence of this path. Every path
    /// starts with the root path.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// An [`Entry`] plus its position: the unit the rewrite engine operates on.
///
/// Position is metadata, not identity — two nodes with equal entries but
/// different paths refer to identical content, and whether they rewrite
/// identically is up to the active policy's dependency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    entry: Entry,
    path: TreePath,
}

impl Node {
    /// Wrap a root tree id as the engine's entry point: a tree entry with
    /// an empty name at the empty path.
    #[must_use]
    pub fn root(id: ObjectId) -> Self {
        Self {
            entry: Entry::new(Mode::TREE, Kind::Tree, id, ""),
            path: TreePath::root(),
        }
    }

    /// A node at an explicit position. `path` must already end in the
    /// entry's name (or be the root path for the root node).
    #[must_use]
    pub const fn new(entry: Entry, path: TreePath) -> Self {
        Self { entry, path }
    }

    /// The node for a child entry of this tree, one level deeper.
    #[must_use]
    pub fn child(&self, entry: Entry) -> Self {
        let path = self.path.join(&entry.name);
        Self { entry, path }
    }

    /// The underlying entry.
    #[must_use]
    pub const fn entry(&self) -> &Entry {
        &self.entry
    }

    /// The node's position within its snapshot.
    #[must_use]
    pub const fn path(&self) -> &TreePath {
        &self.path
    }

    /// Content id shorthand.
    #[must_use]
    pub const fn id(&self) -> &ObjectId {
        &self.entry.id
    }

    /// Object kind shorthand.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.entry.kind
    }

    /// Entry name shorthand.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.entry.name
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, TreePath};
    use crate::object::{Entry, ObjectId};

    fn id(hex: &str) -> ObjectId {
        ObjectId::from_hex(hex).unwrap()
    }

    #[test]
    fn parse_and_display_round_trip() {
        let path = TreePath::parse("libs/foo/bar");
        assert_eq!(path.depth(), 3);
        assert_eq!(path.to_string(), "libs/foo/bar");
    }

    #[test]
    fn empty_string_is_root() {
        let path = TreePath::parse("");
        assert!(path.is_root());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn join_extends_by_one_component() {
        let path = TreePath::parse("libs").join("foo");
        assert_eq!(path, TreePath::parse("libs/foo"));
    }

    #[test]
    fn starts_with_prefix_semantics() {
        let deep = TreePath::parse("libs/foo/bar");
        assert!(deep.starts_with(&TreePath::root()));
        assert!(deep.starts_with(&TreePath::parse("libs")));
        assert!(deep.starts_with(&TreePath::parse("libs/foo")));
        assert!(deep.starts_with(&deep));
        assert!(!deep.starts_with(&TreePath::parse("libs/other")));
        assert!(!TreePath::parse("libs").starts_with(&deep));
    }

    #[test]
    fn root_node_has_empty_name_and_path() {
        let node = Node::root(id("aa11"));
        assert!(node.path().is_root());
        assert_eq!(node.name(), "");
        assert_eq!(node.id(), &id("aa11"));
    }

    #[test]
    fn child_extends_path_by_entry_name() {
        let root = Node::root(id("aa11"));
        let child = root.child(Entry::tree(id("bb22"), "libs"));
        assert_eq!(child.path(), &TreePath::parse("libs"));
        let grandchild = child.child(Entry::blob(id("cc33"), "README"));
        assert_eq!(grandchild.path(), &TreePath::parse("libs/README"));
    }
}
