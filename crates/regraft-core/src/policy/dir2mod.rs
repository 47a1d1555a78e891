//! Folder→submodule conversion.
//!
//! Replaces the subtree at one watched path with a link entry pinning an
//! externally-prepared commit, in every snapshot of history. The link
//! target comes from a *treemap*: a directory mapping each historical id
//! of the watched subtree to the commit id it became in the extracted
//! repository.
//!
//! `.gitmodules` maintenance rides along: a root-level `.gitmodules`
//! blob gets the submodule stanza appended to its existing content in
//! every snapshot that carries one, and a root without one gets a fresh
//! entry in the snapshots where the watched folder actually occurred.
//!
//! # Recursion shape
//!
//! The policy recurses *only along the watched path*. Every sibling
//! subtree is kept by id without listing it, which makes the per-root
//! cost proportional to the watched path's depth, not the tree size.

use std::fs;
use std::path::PathBuf;

use crate::object::{Entry, Node, ObjectId, TreePath};
use crate::rewrite::cache::{CacheKey, key_of};
use crate::rewrite::{Outcome, PolicyError, RewriteError, RewritePolicy, TreeAction};
use crate::store::ObjectStore;

/// The `.gitmodules` file name, only special at the root.
const GITMODULES: &str = ".gitmodules";

/// Folder→submodule conversion policy.
#[derive(Debug, Clone)]
pub struct Dir2Mod {
    treemap: PathBuf,
    folder: TreePath,
    url: String,
    name: String,
}

impl Dir2Mod {
    /// Convert `folder` (a `/`-separated path) into a submodule pointing
    /// at `url`. The submodule's name defaults to the folder path.
    #[must_use]
    pub fn new(
        treemap: impl Into<PathBuf>,
        folder: &str,
        url: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            treemap: treemap.into(),
            folder: TreePath::parse(folder),
            url: url.into(),
            name: name.unwrap_or_else(|| folder.to_string()),
        }
    }

    /// The watched path.
    #[must_use]
    pub const fn folder(&self) -> &TreePath {
        &self.folder
    }

    /// The submodule stanza this conversion appends to `.gitmodules`.
    #[must_use]
    pub fn stanza(&self) -> String {
        format!(
            "[submodule \"{}\"]\n    path = {}\n    url = {}\n",
            self.name, self.folder, self.url
        )
    }

    /// Resolve the watched subtree's historical id to its submodule
    /// commit via the treemap directory.
    fn submodule_target(&self, tree_id: &ObjectId) -> Result<ObjectId, RewriteError> {
        let path = self.treemap.join(tree_id.as_str());
        let content = fs::read_to_string(&path).map_err(|err| {
            PolicyError::with_source(
                format!("treemap has no commit for subtree {tree_id} ({})", path.display()),
                err,
            )
        })?;
        let target = ObjectId::from_hex(content.trim()).map_err(|err| {
            PolicyError::with_source(format!("treemap record {} is corrupt", path.display()), err)
        })?;
        Ok(target)
    }

    /// Build the `.gitmodules` entry: prior content (if any) with the
    /// stanza appended.
    fn gitmodules_entry(
        &self,
        store: &dyn ObjectStore,
        prior: Option<&ObjectId>,
    ) -> Result<Entry, RewriteError> {
        let mut content = match prior {
            Some(id) => store.read_blob(id)?,
            None => Vec::new(),
        };
        content.extend_from_slice(self.stanza().as_bytes());
        let id = store.write_blob(&content)?;
        Ok(Entry::blob(id, GITMODULES))
    }
}

impl RewritePolicy for Dir2Mod {
    /// Content-only keying: the predicate depends on id and position,
    /// never on entry name or mode.
    fn dependency_key(&self, node: &Node) -> CacheKey {
        key_of(&(node.id(), node.path()))
    }

    fn transform_tree(
        &self,
        _store: &dyn ObjectStore,
        node: &Node,
    ) -> Result<TreeAction, RewriteError> {
        if node.path() == &self.folder {
            let target = self.submodule_target(node.id())?;
            Ok(TreeAction::Replace(vec![Entry::link(target, node.name())]))
        } else if self.folder.starts_with(node.path()) {
            Ok(TreeAction::Recurse)
        } else {
            Ok(TreeAction::Keep)
        }
    }

    fn transform_blob(
        &self,
        store: &dyn ObjectStore,
        node: &Node,
    ) -> Result<Outcome, RewriteError> {
        if node.path().depth() == 1 && node.name() == GITMODULES {
            let entry = self.gitmodules_entry(store, Some(node.id()))?;
            return Ok(Outcome::new(vec![entry], false));
        }
        Ok(Outcome::keep(node.entry().clone()))
    }

    fn combine_entries(
        &self,
        store: &dyn ObjectStore,
        node: &Node,
        mut entries: Vec<Entry>,
        matched: bool,
    ) -> Result<Vec<Entry>, RewriteError> {
        let needs_fresh_gitmodules = node.path().is_root()
            && matched
            && !entries.iter().any(|entry| entry.name == GITMODULES);
        if needs_fresh_gitmodules {
            entries.push(self.gitmodules_entry(store, None)?);
        }
        Ok(entries)
    }
}
