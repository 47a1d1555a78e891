use std::io::{self, BufRead as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use regraft_core::commit::CommitRewriter;
use regraft_core::object::ObjectId;
use regraft_core::policy::Dir2Mod;
use regraft_core::rewrite::TreeRewriter;
use regraft_core::rootmap::ResumeMode;
use regraft_core::sched::{RootScheduler, SchedulerConfig};
use regraft_core::store::git::GitStore;

use crate::config::Settings;
use crate::output::{CommitsReport, OutputMode, RunReport, TipReport, fail};

#[derive(Args, Debug)]
pub struct Dir2ModArgs {
    /// Directory mapping each historical id of FOLDER's tree to the
    /// submodule commit id it becomes.
    #[arg(long, value_name = "DIR")]
    pub treemap: PathBuf,

    /// Subfolder to replace, `/`-separated.
    #[arg(long, value_name = "PATH")]
    pub folder: String,

    /// URL recorded for the submodule in `.gitmodules`.
    #[arg(long, value_name = "URL")]
    pub url: String,

    /// Submodule name (defaults to the folder path).
    #[arg(long)]
    pub name: Option<String>,

    /// Where to persist old→new root records
    /// (defaults to `<git-dir>/regraft-map`).
    #[arg(long, value_name = "DIR")]
    pub map_dir: Option<PathBuf>,

    /// Worker count (defaults to twice the available parallelism).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Reuse an existing map directory, skipping already-mapped roots.
    #[arg(long)]
    pub resume: bool,

    /// Revisions whose history to rewrite. With none, root tree ids are
    /// read from stdin (one per line) and no commits are rewritten.
    #[arg(value_name = "REV")]
    pub refs: Vec<String>,
}

/// Execute `regraft dir2mod`: the parallel tree phase, then — when refs
/// were given — the sequential commit phase.
pub fn run_dir2mod(
    args: &Dir2ModArgs,
    project_root: &Path,
    mode: OutputMode,
    quiet: bool,
) -> Result<()> {
    let settings = Settings::load(project_root)?;
    let started_at = chrono::Utc::now().to_rfc3339();

    let store = GitStore::discover(project_root).map_err(|err| fail(err.code(), &err))?;
    let map_dir = args
        .map_dir
        .clone()
        .or_else(|| settings.map_dir.clone())
        .unwrap_or_else(|| store.git_dir().join("regraft-map"));

    let resume = if args.resume || settings.resume.unwrap_or(false) {
        ResumeMode::Resume
    } else {
        ResumeMode::Fresh
    };
    let config = SchedulerConfig {
        workers: args.workers.or(settings.workers),
        resume,
        ..SchedulerConfig::default()
    };

    let roots = if args.refs.is_empty() {
        roots_from_stdin()?
    } else {
        store
            .root_ids(&args.refs)
            .map_err(|err| fail(err.code(), &err))?
    };
    info!(roots = roots.len(), map_dir = %map_dir.display(), "starting rewrite");

    let policy = Dir2Mod::new(&args.treemap, &args.folder, &args.url, args.name.clone());
    let engine = TreeRewriter::new(Arc::new(store.clone()), policy);
    let scheduler = RootScheduler::new(engine, config);
    let (map, trees) = scheduler
        .run(&roots, &map_dir)
        .map_err(|err| fail(err.code(), &err))?;

    let commits = if args.refs.is_empty() {
        None
    } else {
        let loaded = map.load().map_err(|err| fail(err.code(), &err))?;

        let mut tips = Vec::with_capacity(args.refs.len());
        for reference in &args.refs {
            let tip = store
                .resolve(reference)
                .map_err(|err| fail(err.code(), &err))?;
            tips.push(tip);
        }

        let rewriter = CommitRewriter::new(&store, &loaded);
        let report = rewriter
            .rewrite(&tips)
            .map_err(|err| fail(err.code(), &err))?;

        let tips = args
            .refs
            .iter()
            .zip(tips.iter().zip(report.tips.iter()))
            .map(|(reference, (old, new))| TipReport {
                reference: reference.clone(),
                old: old.to_string(),
                new: new.to_string(),
            })
            .collect();
        Some(CommitsReport {
            rewritten: report.commits.len(),
            tips,
        })
    };

    RunReport {
        started_at,
        map_dir: map_dir.display().to_string(),
        trees,
        commits,
    }
    .render(mode, quiet)
}

/// Root tree ids, one per line, from standard input.
fn roots_from_stdin() -> Result<Vec<ObjectId>> {
    let mut roots = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read root ids from stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let id = ObjectId::from_hex(trimmed)
            .with_context(|| format!("Invalid root id on stdin: {trimmed:?}"))?;
        roots.push(id);
    }
    Ok(roots)
}
