//! End-to-end folder→submodule conversion over the in-memory store:
//! engine + policy together, then both phases chained.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use regraft_core::commit::{Commit, CommitRewriter};
use regraft_core::object::{Entry, Kind, Mode, ObjectId};
use regraft_core::policy::Dir2Mod;
use regraft_core::rewrite::TreeRewriter;
use regraft_core::rootmap::RootMap;
use regraft_core::sched::{RootScheduler, SchedulerConfig};
use regraft_core::store::memory::MemoryStore;
use regraft_core::store::{CommitStore, ObjectStore};

const SUBMODULE_COMMIT: &str = "fe12fe12fe12fe12fe12fe12fe12fe12fe12fe12";
const URL: &str = "https://example.com/foo.git";

struct Fixture {
    store: Arc<MemoryStore>,
    policy: Dir2Mod,
    _treemap: tempfile::TempDir,
    foo_tree: ObjectId,
}

impl Fixture {
    /// A store holding the watched subtree `libs/foo` and a treemap
    /// mapping that subtree to [`SUBMODULE_COMMIT`].
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let lib_rs = store.write_blob(b"pub fn foo() {}\n").unwrap();
        let foo_tree = store
            .write_tree(&[Entry::blob(lib_rs, "lib.rs")])
            .unwrap();

        let treemap = tempfile::tempdir().unwrap();
        fs::write(
            treemap.path().join(foo_tree.as_str()),
            format!("{SUBMODULE_COMMIT}\n"),
        )
        .unwrap();

        let policy = Dir2Mod::new(treemap.path(), "libs/foo", URL, None);
        Self {
            store,
            policy,
            _treemap: treemap,
            foo_tree,
        }
    }

    /// A root containing `libs/foo` plus a sibling, optionally with a
    /// pre-existing root-level `.gitmodules`.
    fn root_with_foo(&self, gitmodules: Option<&[u8]>) -> ObjectId {
        let readme = self.store.write_blob(b"# top\n").unwrap();
        let libs = self
            .store
            .write_tree(&[Entry::tree(self.foo_tree.clone(), "foo")])
            .unwrap();
        let mut entries = vec![
            Entry::blob(readme, "README.md"),
            Entry::tree(libs, "libs"),
        ];
        if let Some(content) = gitmodules {
            let blob = self.store.write_blob(content).unwrap();
            entries.push(Entry::blob(blob, ".gitmodules"));
        }
        self.store.write_tree(&entries).unwrap()
    }

    fn rewrite(&self, root: &ObjectId) -> ObjectId {
        let dir = tempfile::tempdir().unwrap();
        let map = RootMap::create(&dir.path().join("map")).unwrap();
        let engine = TreeRewriter::new(self.store.clone(), self.policy.clone());
        engine.rewrite_root(root, &map).unwrap()
    }

    fn entry<'a>(&self, entries: &'a [Entry], name: &str) -> Option<&'a Entry> {
        entries.iter().find(|e| e.name == name)
    }
}

#[test]
fn conversion_replaces_folder_and_creates_gitmodules() {
    let fx = Fixture::new();
    let root = fx.root_with_foo(None);
    let new_root = fx.rewrite(&root);
    assert_ne!(new_root, root);

    let entries = fx.store.list_tree(&new_root).unwrap();

    // The watched subtree became a link pinning the treemap commit.
    let libs = fx.entry(&entries, "libs").unwrap();
    let libs_entries = fx.store.list_tree(&libs.id).unwrap();
    let foo = fx.entry(&libs_entries, "foo").unwrap();
    assert_eq!(foo.kind, Kind::Link);
    assert_eq!(foo.mode, Mode::LINK);
    assert_eq!(foo.id, ObjectId::from_hex(SUBMODULE_COMMIT).unwrap());

    // Siblings kept their identity.
    let old_entries = fx.store.list_tree(&root).unwrap();
    assert_eq!(
        fx.entry(&entries, "README.md"),
        fx.entry(&old_entries, "README.md")
    );

    // A fresh `.gitmodules` appeared, naming the folder and its target.
    let gitmodules = fx.entry(&entries, ".gitmodules").unwrap();
    let content = fx.store.read_blob(&gitmodules.id).unwrap();
    let text = String::from_utf8(content).unwrap();
    assert!(text.contains("[submodule \"libs/foo\"]"));
    assert!(text.contains("path = libs/foo"));
    assert!(text.contains(&format!("url = {URL}")));
}

#[test]
fn existing_gitmodules_is_appended_not_replaced() {
    let fx = Fixture::new();
    let prior = b"[submodule \"existing\"]\n    path = existing\n    url = u\n";
    let root = fx.root_with_foo(Some(prior));
    let new_root = fx.rewrite(&root);

    let entries = fx.store.list_tree(&new_root).unwrap();
    let gitmodules = fx.entry(&entries, ".gitmodules").unwrap();
    let text = String::from_utf8(fx.store.read_blob(&gitmodules.id).unwrap()).unwrap();

    // Prior content survives in front of the appended record.
    assert!(text.starts_with("[submodule \"existing\"]"));
    assert!(text.contains("[submodule \"libs/foo\"]"));
    let existing_at = text.find("\"existing\"").unwrap();
    let appended_at = text.find("\"libs/foo\"").unwrap();
    assert!(existing_at < appended_at);

    // Exactly one `.gitmodules` entry.
    let count = entries.iter().filter(|e| e.name == ".gitmodules").count();
    assert_eq!(count, 1);
}

#[test]
fn snapshot_without_the_folder_is_untouched() {
    let fx = Fixture::new();
    let readme = fx.store.write_blob(b"# other\n").unwrap();
    let docs_blob = fx.store.write_blob(b"notes\n").unwrap();
    let docs = fx
        .store
        .write_tree(&[Entry::blob(docs_blob, "notes.md")])
        .unwrap();
    let root = fx
        .store
        .write_tree(&[Entry::blob(readme, "README.md"), Entry::tree(docs, "docs")])
        .unwrap();

    let new_root = fx.rewrite(&root);
    assert_eq!(new_root, root, "no match, no change");

    let entries = fx.store.list_tree(&new_root).unwrap();
    assert!(fx.entry(&entries, ".gitmodules").is_none());
}

#[test]
fn both_phases_produce_an_isomorphic_converted_history() {
    let fx = Fixture::new();

    // before: no folder yet    after: folder present
    let before = fx.root_with_foo(None);
    let readme = fx.store.write_blob(b"# pre-folder era\n").unwrap();
    let early = fx
        .store
        .write_tree(&[Entry::blob(readme, "README.md")])
        .unwrap();

    let meta = vec![
        "author A U Thor <author@example.com> 1700000000 +0000".to_string(),
        "committer C O Mitter <committer@example.com> 1700000000 +0000".to_string(),
    ];
    let c_early = fx
        .store
        .write_commit(&Commit {
            tree: early.clone(),
            parents: vec![],
            meta: meta.clone(),
            message: "start\n".to_string(),
        })
        .unwrap();
    let c_tip = fx
        .store
        .write_commit(&Commit {
            tree: before.clone(),
            parents: vec![c_early.clone()],
            meta,
            message: "vendor foo\n".to_string(),
        })
        .unwrap();

    // Phase 1 over the distinct roots.
    let dir = tempfile::tempdir().unwrap();
    let map_dir = dir.path().join("map");
    let engine = TreeRewriter::new(fx.store.clone(), fx.policy.clone());
    let scheduler = RootScheduler::new(
        engine,
        SchedulerConfig {
            workers: Some(2),
            ..SchedulerConfig::default()
        },
    );
    let roots = vec![early.clone(), before.clone()];
    let (map, summary) = scheduler.run(&roots, &map_dir).unwrap();
    assert_eq!(summary.completed, 2);

    // Phase 2 over the ancestry.
    let loaded: HashMap<ObjectId, ObjectId> = map.load().unwrap();
    let rewriter = CommitRewriter::new(fx.store.as_ref(), &loaded);
    let report = rewriter.rewrite(std::slice::from_ref(&c_tip)).unwrap();

    // The early snapshot had no folder: its tree (and therefore its
    // commit, metadata unchanged) is byte-identical.
    assert_eq!(loaded[&early], early);

    let new_tip = fx.store.read_commit(&report.tips[0]).unwrap();
    assert_ne!(report.tips[0], c_tip);
    assert_eq!(new_tip.tree, loaded[&before]);
    assert_eq!(new_tip.message, "vendor foo\n");
    assert_eq!(new_tip.parents, vec![report.commits[&c_early].clone()]);
}
