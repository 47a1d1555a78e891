//! Human/JSON output parity for the run report, and error rendering
//! with machine-readable codes.

use std::fmt::Write as _;

use regraft_core::error::ErrorCode;
use regraft_core::sched::{RunSummary, format_hms};
use serde::Serialize;
use std::time::Duration;

/// The two output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per run).
    Json,
}

/// One rewritten tip: the requested revision and its old/new commit ids.
#[derive(Debug, Serialize)]
pub struct TipReport {
    pub reference: String,
    pub old: String,
    pub new: String,
}

/// The commit-phase section of a run report.
#[derive(Debug, Serialize)]
pub struct CommitsReport {
    pub rewritten: usize,
    pub tips: Vec<TipReport>,
}

/// Everything a run produced, in one renderable value.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// RFC 3339 timestamp of when the run started.
    pub started_at: String,
    /// Where the old→new root records were persisted.
    pub map_dir: String,
    /// Tree-phase accounting.
    pub trees: RunSummary,
    /// Commit-phase accounting; absent when no refs were given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commits: Option<CommitsReport>,
}

impl RunReport {
    /// Render to stdout in the requested mode.
    ///
    /// # Errors
    ///
    /// JSON serialization failure only.
    pub fn render(&self, mode: OutputMode, quiet: bool) -> anyhow::Result<()> {
        match mode {
            OutputMode::Json => {
                println!("{}", serde_json::to_string_pretty(self)?);
            }
            OutputMode::Human => {
                if !quiet {
                    println!(
                        "{} trees rewritten in {} ({:.1} trees/sec), {} skipped",
                        self.trees.completed,
                        format_hms(Duration::from_secs_f64(self.trees.elapsed_secs)),
                        self.trees.per_second,
                        self.trees.skipped,
                    );
                    println!("root map: {}", self.map_dir);
                }
                if let Some(commits) = &self.commits {
                    if !quiet {
                        println!("{} commits rewritten", commits.rewritten);
                    }
                    for tip in &commits.tips {
                        println!("{} {} -> {}", tip.reference, tip.old, tip.new);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Wrap a fatal failure with its machine code and remediation hint.
pub fn fail(code: ErrorCode, err: impl std::fmt::Display) -> anyhow::Error {
    let mut message = format!("{} {}: {err}", code.code(), code.message());
    if let Some(hint) = code.hint() {
        let _ = write!(message, "\n  hint: {hint}");
    }
    anyhow::anyhow!(message)
}
