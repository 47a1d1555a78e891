//! Phase 1: parallel root rewriting.
//!
//! A fixed pool of workers pulls root ids off a shared feed, runs the
//! engine on each, and persists the old→new record the moment a root
//! completes. Completion order is irrelevant — results are keyed by root
//! id — so the pool consumes them unordered and progress reporting only
//! reflects completion order.
//!
//! # Failure policy
//!
//! The first failed root aborts the pool; there is no partial-result
//! continuation. Records persisted before the failure remain on disk
//! (each is independently durable), which is what makes an explicit
//! resume possible later.
//!
//! # Sub-modules
//!
//! - [`progress`]: trailing-window throughput and ETA accounting.

pub mod progress;

pub use progress::{DEFAULT_WINDOW, ProgressSnapshot, ProgressWindow, format_hms};

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ErrorCode;
use crate::lock::{LockError, MapLock};
use crate::object::ObjectId;
use crate::rewrite::{RewriteError, RewritePolicy, TreeRewriter};
use crate::rootmap::{MapError, ResumeMode, RootMap};

/// Errors from a scheduling run.
#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    /// The map-directory lock could not be acquired.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The durable map refused the run or a record.
    #[error(transparent)]
    Map(#[from] MapError),

    /// A root failed to rewrite, aborting the pool.
    #[error("rewrite of root {root} failed")]
    RootFailed {
        /// The root whose rewrite failed.
        root: ObjectId,
        /// The underlying failure.
        #[source]
        source: RewriteError,
    },
}

impl SchedError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Lock(err) => err.code(),
            Self::Map(err) => err.code(),
            Self::RootFailed { source, .. } => source.code(),
        }
    }
}

/// Pool sizing, resume behavior, and reporting cadence.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker count; `None` means twice the available parallelism.
    pub workers: Option<usize>,
    /// How to treat a pre-existing map location.
    pub resume: ResumeMode,
    /// Width of the trailing throughput window.
    pub window: Duration,
    /// Minimum gap between streamed progress reports.
    pub progress_interval: Duration,
    /// How long to wait for the map-directory lock.
    pub lock_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            resume: ResumeMode::Fresh,
            window: DEFAULT_WINDOW,
            progress_interval: Duration::from_secs(1),
            lock_timeout: Duration::from_millis(500),
        }
    }
}

impl SchedulerConfig {
    /// The effective worker count: configured, or twice the machine's
    /// available parallelism, never zero.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            2 * std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        })
        .max(1)
    }
}

/// Final accounting for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    /// Roots rewritten in this run.
    pub completed: u64,
    /// Roots skipped because the map already held them (resume only).
    pub skipped: u64,
    /// Wall-clock duration of the pool phase.
    pub elapsed_secs: f64,
    /// Whole-run average throughput, roots per second.
    pub per_second: f64,
}

/// The bounded worker pool driving [`TreeRewriter::rewrite_root`] over a
/// deduplicated set of root ids.
pub struct RootScheduler<P> {
    engine: TreeRewriter<P>,
    config: SchedulerConfig,
}

impl<P: RewritePolicy> RootScheduler<P> {
    /// Build a scheduler around an engine.
    pub const fn new(engine: TreeRewriter<P>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// The wrapped engine.
    #[must_use]
    pub const fn engine(&self) -> &TreeRewriter<P> {
        &self.engine
    }

    /// Rewrite every distinct root in `roots`, persisting records under
    /// `map_dir`. Returns the populated map and the run accounting.
    ///
    /// # Errors
    ///
    /// - [`SchedError::Map`] before any work when the map location
    ///   conflicts (fresh run over a populated directory).
    /// - [`SchedError::Lock`] when another run holds the location.
    /// - [`SchedError::RootFailed`] on the first failed root; the pool
    ///   is aborted and no further results are consumed.
    pub fn run(&self, roots: &[ObjectId], map_dir: &Path) -> Result<(RootMap, RunSummary), SchedError> {
        let _lock = MapLock::acquire(map_dir, self.config.lock_timeout)?;
        let map = RootMap::prepare(map_dir, self.config.resume)?;

        // Deduplicate; the input is an order-irrelevant set.
        let distinct: BTreeSet<&ObjectId> = roots.iter().collect();
        let mut pending: Vec<ObjectId> = Vec::with_capacity(distinct.len());
        let mut skipped: u64 = 0;
        for root in distinct {
            if self.config.resume == ResumeMode::Resume && map.contains(root) {
                skipped += 1;
            } else {
                pending.push(root.clone());
            }
        }

        let workers = self.config.effective_workers();
        let total = pending.len() as u64;
        info!(total, skipped, workers, "rewriting trees");

        let summary = self.run_pool(pending, &map)?;

        info!(
            completed = summary.completed,
            elapsed = %format_hms(Duration::from_secs_f64(summary.elapsed_secs)),
            per_second = format!("{:.1}", summary.per_second),
            "tree rewrite completed"
        );
        Ok((map, RunSummary { skipped, ..summary }))
    }

    fn run_pool(&self, pending: Vec<ObjectId>, map: &RootMap) -> Result<RunSummary, SchedError> {
        let total = pending.len() as u64;
        let workers = self.config.effective_workers();

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<ObjectId>();
        let (result_tx, result_rx) =
            crossbeam_channel::bounded::<(ObjectId, Result<ObjectId, RewriteError>)>(workers);
        for root in pending {
            job_tx.send(root).expect("job feed cannot disconnect here");
        }
        drop(job_tx);

        let abort = AtomicBool::new(false);
        let mut window = ProgressWindow::new(total, self.config.window);
        let mut first_failure: Option<SchedError> = None;

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let abort = &abort;
                let engine = &self.engine;
                scope.spawn(move || {
                    while let Ok(root) = job_rx.recv() {
                        if abort.load(Ordering::Relaxed) {
                            break;
                        }
                        let result = engine.rewrite_root(&root, map);
                        let failed = result.is_err();
                        if result_tx.send((root, result)).is_err() || failed {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            let mut last_report = Instant::now();
            for (root, result) in &result_rx {
                match result {
                    Ok(new_root) => {
                        let snapshot = window.record();
                        debug!(old = %root, new = %new_root, "root complete");
                        if last_report.elapsed() >= self.config.progress_interval
                            || snapshot.done == snapshot.total
                        {
                            info!(
                                done = snapshot.done,
                                total = snapshot.total,
                                per_second = format!("{:.1}", snapshot.per_second),
                                eta = %format_hms(snapshot.eta),
                                "trees rewritten"
                            );
                            last_report = Instant::now();
                        }
                    }
                    Err(source) => {
                        abort.store(true, Ordering::Relaxed);
                        if first_failure.is_none() {
                            first_failure = Some(SchedError::RootFailed { root, source });
                        }
                    }
                }
            }
        });

        if let Some(failure) = first_failure {
            return Err(failure);
        }

        let now = Instant::now();
        Ok(RunSummary {
            completed: window.done(),
            skipped: 0,
            elapsed_secs: window.elapsed_at(now).as_secs_f64(),
            per_second: window.average_at(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{RootScheduler, SchedError, SchedulerConfig};
    use crate::object::{Entry, Node, ObjectId, TreePath};
    use crate::rewrite::cache::{CacheKey, key_of};
    use crate::rewrite::{RewriteError, RewritePolicy, TreeAction, TreeRewriter};
    use crate::rootmap::{MapError, ResumeMode, RootMap};
    use crate::store::ObjectStore;
    use crate::store::memory::MemoryStore;

    /// Replaces the subtree at `shared` with a link and counts how often
    /// the replacement actually executes. Content-only keying, so every
    /// root holding the identical subtree shares one cache slot.
    struct CountingLink {
        target: TreePath,
        link_to: ObjectId,
        replacements: AtomicUsize,
    }

    impl CountingLink {
        fn new(target: &str, link_to: ObjectId) -> Self {
            Self {
                target: TreePath::parse(target),
                link_to,
                replacements: AtomicUsize::new(0),
            }
        }
    }

    impl RewritePolicy for CountingLink {
        fn dependency_key(&self, node: &Node) -> CacheKey {
            key_of(&(node.id(), node.path()))
        }

        fn transform_tree(
            &self,
            _store: &dyn ObjectStore,
            node: &Node,
        ) -> Result<TreeAction, RewriteError> {
            if node.path() == &self.target {
                self.replacements.fetch_add(1, Ordering::Relaxed);
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

    /// Fails every root whose tree contains a blob named `poison`.
    struct Poisoned;

    impl RewritePolicy for Poisoned {
        fn transform_blob(
            &self,
            _store: &dyn ObjectStore,
            node: &Node,
        ) -> Result<crate::rewrite::Outcome, RewriteError> {
            if node.name() == "poison" {
                return Err(crate::rewrite::PolicyError::new("poisoned blob").into());
            }
            Ok(crate::rewrite::Outcome::keep(node.entry().clone()))
        }
    }

    /// 100 distinct roots; the first 40 share one identical nested
    /// subtree at `vendored/`.
    fn build_fleet(store: &MemoryStore) -> (Vec<ObjectId>, ObjectId) {
        let dep = store.write_blob(b"shared dependency source\n").unwrap();
        let inner = store.write_tree(&[Entry::blob(dep, "dep.rs")]).unwrap();
        let shared = store
            .write_tree(&[Entry::tree(inner.clone(), "inner")])
            .unwrap();

        let mut roots = Vec::new();
        for index in 0..100u32 {
            let marker = store
                .write_blob(format!("snapshot {index}\n").as_bytes())
                .unwrap();
            let mut entries = vec![Entry::blob(marker, "VERSION")];
            if index < 40 {
                entries.push(Entry::tree(shared.clone(), "vendored"));
            }
            roots.push(store.write_tree(&entries).unwrap());
        }
        (roots, shared)
    }

    fn test_config(workers: usize) -> SchedulerConfig {
        SchedulerConfig {
            workers: Some(workers),
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn shared_subtree_is_transformed_effectively_once() {
        let store = Arc::new(MemoryStore::new());
        let (roots, _shared) = build_fleet(&store);
        let link_to = ObjectId::from_hex("abad1dea").unwrap();
        let workers = 4;

        let engine = TreeRewriter::new(
            store.clone(),
            CountingLink::new("vendored", link_to.clone()),
        );
        let scheduler = RootScheduler::new(engine, test_config(workers));

        let dir = tempfile::tempdir().unwrap();
        let (map, summary) = scheduler.run(&roots, &dir.path().join("map")).unwrap();

        assert_eq!(summary.completed, 100);
        assert_eq!(summary.skipped, 0);
        assert_eq!(map.len().unwrap(), 100);

        // Every output is individually correct, regardless of order.
        for (index, root) in roots.iter().enumerate() {
            let new_root = map.lookup(root).unwrap().expect("every root is mapped");
            let entries = store.list_tree(&new_root).unwrap();
            let vendored = entries.iter().find(|e| e.name == "vendored");
            if index < 40 {
                assert_eq!(
                    vendored.cloned(),
                    Some(Entry::link(link_to.clone(), "vendored"))
                );
            } else {
                assert_eq!(new_root, *root, "untouched roots keep their identity");
                assert!(vendored.is_none());
            }
        }

        // The replacement ran at most once per concurrently-racing
        // worker, never once per sharing root.
        let count = scheduler
            .engine()
            .policy()
            .replacements
            .load(Ordering::Relaxed);
        assert!(count >= 1, "the shared subtree must be transformed");
        assert!(
            count <= workers,
            "expected at most {workers} executions, observed {count}"
        );
    }

    #[test]
    fn failed_root_aborts_the_pool() {
        let store = Arc::new(MemoryStore::new());
        let healthy = store.write_blob(b"fine\n").unwrap();
        let poison = store.write_blob(b"bad\n").unwrap();
        let roots = vec![
            store.write_tree(&[Entry::blob(healthy, "ok.txt")]).unwrap(),
            store.write_tree(&[Entry::blob(poison, "poison")]).unwrap(),
        ];

        let engine = TreeRewriter::new(store, Poisoned);
        let scheduler = RootScheduler::new(engine, test_config(2));

        let dir = tempfile::tempdir().unwrap();
        let err = scheduler.run(&roots, &dir.path().join("map")).unwrap_err();
        assert!(matches!(err, SchedError::RootFailed { .. }));
    }

    #[test]
    fn populated_map_location_aborts_before_any_work() {
        let store = Arc::new(MemoryStore::new());
        let (roots, _) = build_fleet(&store);

        let dir = tempfile::tempdir().unwrap();
        let map_dir = dir.path().join("map");
        {
            let stale = RootMap::create(&map_dir).unwrap();
            stale
                .record(
                    &ObjectId::from_hex("aa11").unwrap(),
                    &ObjectId::from_hex("bb22").unwrap(),
                )
                .unwrap();
        }

        let writes_before = store.tree_writes();
        let engine = TreeRewriter::new(store.clone(), crate::rewrite::PassThrough);
        let scheduler = RootScheduler::new(engine, test_config(2));

        let err = scheduler.run(&roots, &map_dir).unwrap_err();
        assert!(matches!(err, SchedError::Map(MapError::Populated { .. })));
        assert_eq!(store.tree_writes(), writes_before, "no work happened");

        // The stale record is untouched.
        let stale = RootMap::prepare(&map_dir, ResumeMode::Resume).unwrap();
        assert_eq!(stale.len().unwrap(), 1);
    }

    #[test]
    fn resume_skips_already_mapped_roots() {
        let store = Arc::new(MemoryStore::new());
        let (roots, _) = build_fleet(&store);
        let dir = tempfile::tempdir().unwrap();
        let map_dir = dir.path().join("map");

        // First run maps everything.
        let engine = TreeRewriter::new(store.clone(), crate::rewrite::PassThrough);
        let scheduler = RootScheduler::new(engine, test_config(4));
        let (_, first) = scheduler.run(&roots, &map_dir).unwrap();
        assert_eq!(first.completed, 100);

        // Second run in resume mode has nothing left to do.
        let engine = TreeRewriter::new(store.clone(), crate::rewrite::PassThrough);
        let config = SchedulerConfig {
            resume: ResumeMode::Resume,
            ..test_config(4)
        };
        let scheduler = RootScheduler::new(engine, config);
        let (_, second) = scheduler.run(&roots, &map_dir).unwrap();
        assert_eq!(second.completed, 0);
        assert_eq!(second.skipped, 100);
    }

    #[test]
    fn duplicate_roots_are_deduplicated() {
        let store = Arc::new(MemoryStore::new());
        let blob = store.write_blob(b"once\n").unwrap();
        let root = store.write_tree(&[Entry::blob(blob, "f")]).unwrap();
        let roots = vec![root.clone(), root.clone(), root];

        let engine = TreeRewriter::new(store, crate::rewrite::PassThrough);
        let scheduler = RootScheduler::new(engine, test_config(2));

        let dir = tempfile::tempdir().unwrap();
        let (map, summary) = scheduler.run(&roots, &dir.path().join("map")).unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(map.len().unwrap(), 1);
    }
}
