//! The recursive dispatcher.
//!
//! # Identity preservation
//!
//! After recursion, a tree's original and rewritten entry lists are both
//! sorted by content id — not by name — and compared. Equal lists mean
//! the original id is reused and nothing is written: an untouched
//! subtree keeps its exact identity, and two trees that differ only in
//! declared entry order count as unchanged. This is what makes a no-op
//! policy produce a byte-identical history.

use std::sync::Arc;

use tracing::trace;

use super::cache::{Operation, RewriteCache};
use super::policy::{RewritePolicy, TreeAction};
use super::{Outcome, RewriteError};
use crate::object::{Entry, Kind, Node, ObjectId};
use crate::rootmap::RootMap;
use crate::store::ObjectStore;

/// The rewrite engine: store + policy + shared memo cache.
///
/// One engine is shared by every worker in a run; all methods take
/// `&self` and the cache converges regardless of completion order.
pub struct TreeRewriter<P> {
    store: Arc<dyn ObjectStore>,
    policy: P,
    cache: RewriteCache,
}

impl<P: RewritePolicy> TreeRewriter<P> {
    /// Build an engine over a store with the given policy.
    pub fn new(store: Arc<dyn ObjectStore>, policy: P) -> Self {
        Self {
            store,
            policy,
            cache: RewriteCache::new(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// The shared memo cache.
    #[must_use]
    pub const fn cache(&self) -> &RewriteCache {
        &self.cache
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &P {
        &self.policy
    }

    /// Rewrite one root snapshot and record `old → new` in `map`.
    ///
    /// Always recomputes, even when the map already holds this root
    /// (skipping mapped roots is the scheduler's resume concern); the
    /// recompute converges to an equal value, which the map accepts.
    ///
    /// # Errors
    ///
    /// Fatal on any store, policy, or map-record failure, and when the
    /// policy collapses the root itself into anything but one entry.
    pub fn rewrite_root(&self, root: &ObjectId, map: &RootMap) -> Result<ObjectId, RewriteError> {
        let node = Node::root(root.clone());
        let outcome = self.dispatch(&node)?;
        let new_id = match outcome.entries.as_slice() {
            [only] => only.id.clone(),
            entries => {
                return Err(RewriteError::NonScalarRoot {
                    count: entries.len(),
                });
            }
        };
        map.record(root, &new_id)?;
        trace!(old = %root, new = %new_id, "root rewritten");
        Ok(new_id)
    }

    /// Route a node to the tree or blob operation, memoized.
    ///
    /// # Errors
    ///
    /// Propagates the underlying operation's failure.
    pub fn dispatch(&self, node: &Node) -> Result<Outcome, RewriteError> {
        match node.kind() {
            Kind::Tree => self.cached(Operation::Tree, node, Self::rewrite_tree),
            Kind::Blob | Kind::Link => self.cached(Operation::Blob, node, Self::rewrite_blob),
        }
    }

    /// Memoize one operation: at most one logical execution per
    /// dependency key. Two workers racing on a fresh key may both
    /// execute — the wrapped operation is pure, so both produce the
    /// value the cache converges to.
    fn cached(
        &self,
        operation: Operation,
        node: &Node,
        run: fn(&Self, &Node) -> Result<Outcome, RewriteError>,
    ) -> Result<Outcome, RewriteError> {
        let key = self.policy.dependency_key(node);
        if let Some(hit) = self.cache.lookup(operation, key) {
            trace!(op = operation.name(), key, "cache hit");
            return Ok(hit);
        }
        let outcome = run(self, node)?;
        Ok(self.cache.publish(operation, key, outcome))
    }

    fn rewrite_tree(&self, node: &Node) -> Result<Outcome, RewriteError> {
        match self.policy.transform_tree(self.store.as_ref(), node)? {
            TreeAction::Keep => Ok(Outcome::keep(node.entry().clone())),
            TreeAction::Replace(entries) => Ok(Outcome::replace(entries)),
            TreeAction::Recurse => self.recurse_tree(node),
        }
    }

    fn recurse_tree(&self, node: &Node) -> Result<Outcome, RewriteError> {
        let old_entries = self.store.list_tree(node.id())?;

        let mut matched = false;
        let mut rewritten = Vec::with_capacity(old_entries.len());
        for child in &old_entries {
            let outcome = self.dispatch(&node.child(child.clone()))?;
            matched |= outcome.matched;
            rewritten.extend(outcome.entries);
        }

        let combined =
            self.policy
                .combine_entries(self.store.as_ref(), node, rewritten, matched)?;

        let id = if entries_unchanged(&old_entries, &combined) {
            node.id().clone()
        } else {
            self.store.write_tree(&combined)?
        };

        let mut entry = node.entry().clone();
        entry.id = id;
        Ok(Outcome::new(vec![entry], matched))
    }

    fn rewrite_blob(&self, node: &Node) -> Result<Outcome, RewriteError> {
        self.policy.transform_blob(self.store.as_ref(), node)
    }
}

/// Whether two entry lists are equal as sets, compared in content-id
/// order so declared entry order never forces a spurious write.
fn entries_unchanged(old: &[Entry], new: &[Entry]) -> bool {
    if old.len() != new.len() {
        return false;
    }
    let mut old_sorted: Vec<&Entry> = old.iter().collect();
    let mut new_sorted: Vec<&Entry> = new.iter().collect();
    for list in [&mut old_sorted, &mut new_sorted] {
        list.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.cmp(b)));
    }
    old_sorted == new_sorted
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{TreeRewriter, entries_unchanged};
    use crate::object::{Entry, Node, ObjectId, TreePath};
    use crate::rewrite::policy::{PassThrough, RewritePolicy, TreeAction};
    use crate::rewrite::RewriteError;
    use crate::rootmap::RootMap;
    use crate::store::memory::MemoryStore;
    use crate::store::ObjectStore;

    /// Replaces the subtree at `target` with a link entry and counts how
    /// often the decision hook actually runs.
    struct LinkAt {
        target: TreePath,
        link_to: ObjectId,
        decisions: AtomicUsize,
    }

    impl LinkAt {
        fn new(target: &str, link_to: ObjectId) -> Self {
            Self {
                target: TreePath::parse(target),
                link_to,
                decisions: AtomicUsize::new(0),
            }
        }
    }

    impl RewritePolicy for LinkAt {
        fn transform_tree(
            &self,
            _store: &dyn ObjectStore,
            node: &Node,
        ) -> Result<TreeAction, RewriteError> {
            self.decisions.fetch_add(1, Ordering::Relaxed);
            if node.path() == &self.target {
                Ok(TreeAction::Replace(vec![Entry::link(
                    self.link_to.clone(),
                    node.name(),
                )]))
            } else if self.target.starts_with(node.path()) {
                Ok(TreeAction::Recurse)
            } else {
                Ok(TreeAction::Keep)
            }
        }
    }

    /// Reverses the declared child order without changing content.
    struct Reverser;

    impl RewritePolicy for Reverser {
        fn combine_entries(
            &self,
            _store: &dyn ObjectStore,
            _node: &Node,
            mut entries: Vec<Entry>,
            _matched: bool,
        ) -> Result<Vec<Entry>, RewriteError> {
            entries.reverse();
            Ok(entries)
        }
    }

    fn fixture(store: &MemoryStore) -> ObjectId {
        // root
        // ├── README.md
        // ├── libs/
        // │   └── foo/
        // │       └── lib.rs
        // └── apps/
        //     └── main.rs
        let readme = store.write_blob(b"# project\n").unwrap();
        let lib_rs = store.write_blob(b"pub fn answer() -> u32 { 42 }\n").unwrap();
        let main_rs = store.write_blob(b"fn main() {}\n").unwrap();
        let foo = store.write_tree(&[Entry::blob(lib_rs, "lib.rs")]).unwrap();
        let libs = store.write_tree(&[Entry::tree(foo, "foo")]).unwrap();
        let apps = store.write_tree(&[Entry::blob(main_rs, "main.rs")]).unwrap();
        store
            .write_tree(&[
                Entry::blob(readme, "README.md"),
                Entry::tree(libs, "libs"),
                Entry::tree(apps, "apps"),
            ])
            .unwrap()
    }

    fn map_in(dir: &tempfile::TempDir) -> RootMap {
        RootMap::create(&dir.path().join("map")).unwrap()
    }

    #[test]
    fn pass_through_preserves_root_identity() {
        let store = Arc::new(MemoryStore::new());
        let root = fixture(&store);
        let writes_before = store.tree_writes();

        let dir = tempfile::tempdir().unwrap();
        let engine = TreeRewriter::new(store.clone(), PassThrough);
        let new_root = engine.rewrite_root(&root, &map_in(&dir)).unwrap();

        assert_eq!(new_root, root);
        assert_eq!(store.tree_writes(), writes_before, "no spurious writes");
    }

    #[test]
    fn rewrite_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let root = fixture(&store);
        let link_to = ObjectId::from_hex("fe12").unwrap();

        let dir_a = tempfile::tempdir().unwrap();
        let engine_a = TreeRewriter::new(store.clone(), LinkAt::new("libs/foo", link_to.clone()));
        let first = engine_a.rewrite_root(&root, &map_in(&dir_a)).unwrap();

        let dir_b = tempfile::tempdir().unwrap();
        let engine_b = TreeRewriter::new(store.clone(), LinkAt::new("libs/foo", link_to));
        let second = engine_b.rewrite_root(&root, &map_in(&dir_b)).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, root);
    }

    #[test]
    fn replacement_rewrites_spine_and_keeps_siblings() {
        let store = Arc::new(MemoryStore::new());
        let root = fixture(&store);
        let link_to = ObjectId::from_hex("fe12").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let engine = TreeRewriter::new(store.clone(), LinkAt::new("libs/foo", link_to.clone()));
        let new_root = engine.rewrite_root(&root, &map_in(&dir)).unwrap();

        let new_entries = store.list_tree(&new_root).unwrap();
        let old_entries = store.list_tree(&root).unwrap();

        // Siblings keep their exact ids.
        let by_name = |entries: &[Entry], name: &str| {
            entries.iter().find(|e| e.name == name).cloned().unwrap()
        };
        assert_eq!(
            by_name(&new_entries, "README.md"),
            by_name(&old_entries, "README.md")
        );
        assert_eq!(by_name(&new_entries, "apps"), by_name(&old_entries, "apps"));

        // The watched subtree became a link inside a rewritten libs/.
        let libs = by_name(&new_entries, "libs");
        assert_ne!(libs, by_name(&old_entries, "libs"));
        let foo = by_name(&store.list_tree(&libs.id).unwrap(), "foo");
        assert_eq!(foo, Entry::link(link_to, "foo"));
    }

    #[test]
    fn second_root_with_shared_subtree_hits_cache() {
        let store = Arc::new(MemoryStore::new());
        let root = fixture(&store);
        let link_to = ObjectId::from_hex("fe12").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let map = map_in(&dir);
        let engine = TreeRewriter::new(store, LinkAt::new("libs/foo", link_to));

        let first = engine.rewrite_root(&root, &map).unwrap();
        let decisions_after_first = engine.policy.decisions.load(Ordering::Relaxed);

        let second = engine.rewrite_root(&root, &map).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            engine.policy.decisions.load(Ordering::Relaxed),
            decisions_after_first,
            "fully cached rerun must not re-execute the decision hook"
        );
    }

    #[test]
    fn reordered_children_count_as_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let root = fixture(&store);
        let writes_before = store.tree_writes();

        let dir = tempfile::tempdir().unwrap();
        let engine = TreeRewriter::new(store.clone(), Reverser);
        let new_root = engine.rewrite_root(&root, &map_in(&dir)).unwrap();

        assert_eq!(new_root, root);
        assert_eq!(store.tree_writes(), writes_before);
    }

    #[test]
    fn root_collapse_to_multiple_entries_is_an_error() {
        struct Exploder;
        impl RewritePolicy for Exploder {
            fn transform_tree(
                &self,
                _store: &dyn ObjectStore,
                node: &Node,
            ) -> Result<TreeAction, RewriteError> {
                let id = node.id().clone();
                Ok(TreeAction::Replace(vec![
                    Entry::tree(id.clone(), "a"),
                    Entry::tree(id, "b"),
                ]))
            }
        }

        let store = Arc::new(MemoryStore::new());
        let root = fixture(&store);
        let dir = tempfile::tempdir().unwrap();
        let engine = TreeRewriter::new(store, Exploder);
        let err = engine.rewrite_root(&root, &map_in(&dir)).unwrap_err();
        assert!(matches!(err, RewriteError::NonScalarRoot { count: 2 }));
    }

    #[test]
    fn unchanged_comparison_ignores_order_but_not_content() {
        let id_a = ObjectId::from_hex("aa").unwrap();
        let id_b = ObjectId::from_hex("bb").unwrap();
        let one = vec![Entry::blob(id_a.clone(), "x"), Entry::blob(id_b.clone(), "y")];
        let two = vec![Entry::blob(id_b.clone(), "y"), Entry::blob(id_a, "x")];
        assert!(entries_unchanged(&one, &two));

        let three = vec![Entry::blob(id_b, "renamed")];
        assert!(!entries_unchanged(&one, &three));
    }
}
