//! Object store backed by the `git` binary.
//!
//! Each operation shells out to plumbing commands (`ls-tree`, `mktree`,
//! `cat-file`, `hash-object`, `rev-parse`, `log`). No snapshot is ever
//! checked out; everything happens against the object database. The
//! wire formats are parsed here and nowhere else:
//!
//! ```text
//! ls-tree line:  <mode> SP <kind> SP <id> TAB <name>
//! mktree line:   <mode> SP <kind> SP <id> TAB <name>
//! ```

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{CommitStore, ObjectStore, StoreError};
use crate::commit::Commit;
use crate::object::{Entry, Kind, Mode, ObjectId};

/// Parse one `git ls-tree` output line.
///
/// # Errors
///
/// Returns [`StoreError::Malformed`] when the line does not follow the
/// `mode SP kind SP id TAB name` layout or a field fails to parse.
pub fn parse_ls_tree_line(line: &str) -> Result<Entry, StoreError> {
    let malformed = |detail: String| StoreError::Malformed {
        what: "tree entry",
        detail,
    };

    let (meta, name) = line
        .split_once('\t')
        .ok_or_else(|| malformed(format!("no tab separator in {line:?}")))?;
    let mut fields = meta.split(' ');
    let mode_token = fields
        .next()
        .ok_or_else(|| malformed("missing mode field".to_string()))?;
    let kind_token = fields
        .next()
        .ok_or_else(|| malformed("missing kind field".to_string()))?;
    let id_token = fields
        .next()
        .ok_or_else(|| malformed("missing id field".to_string()))?;
    if fields.next().is_some() {
        return Err(malformed(format!("trailing fields in {meta:?}")));
    }

    let mode = Mode::from_octal(mode_token).map_err(|err| malformed(err.to_string()))?;
    let kind = Kind::from_token(kind_token).map_err(|err| malformed(err.to_string()))?;
    let id = ObjectId::from_hex(id_token).map_err(|err| malformed(err.to_string()))?;
    Ok(Entry::new(mode, kind, id, name))
}

/// Format one entry as a `git mktree` input line (without the newline).
#[must_use]
pub fn format_mktree_line(entry: &Entry) -> String {
    format!(
        "{} {} {}\t{}",
        entry.mode,
        entry.kind.token(),
        entry.id,
        entry.name
    )
}

/// A repository's object database, accessed through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitStore {
    work_dir: PathBuf,
    git_dir: PathBuf,
}

impl GitStore {
    /// Locate the repository containing `work_dir`.
    ///
    /// # Errors
    ///
    /// Fails if `git rev-parse --absolute-git-dir` fails, i.e. `work_dir`
    /// is not inside a repository or `git` is not runnable.
    pub fn discover(work_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let work_dir = work_dir.into();
        let stdout = run_git(&work_dir, &["rev-parse", "--absolute-git-dir"], None)?;
        let git_dir = PathBuf::from(String::from_utf8_lossy(&stdout).trim());
        Ok(Self { work_dir, git_dir })
    }

    /// The repository's git directory (for placing run-scoped state).
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Resolve a revision to a commit id (`git rev-parse --verify`).
    ///
    /// # Errors
    ///
    /// Fails if the revision does not resolve.
    pub fn resolve(&self, revision: &str) -> Result<ObjectId, StoreError> {
        let rev = format!("{revision}^{{commit}}");
        let stdout = run_git(&self.work_dir, &["rev-parse", "--verify", &rev], None)?;
        parse_id_line(&stdout, "rev-parse output")
    }

    /// The distinct root tree ids of every commit reachable from `refs`,
    /// via `git log --format=%T`. Order follows the log; callers dedupe.
    ///
    /// # Errors
    ///
    /// Fails if the log command fails or an id does not parse.
    pub fn root_ids(&self, refs: &[String]) -> Result<Vec<ObjectId>, StoreError> {
        let mut args = vec!["log".to_string(), "--format=%T".to_string()];
        args.extend(refs.iter().cloned());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = run_git(&self.work_dir, &arg_refs, None)?;
        String::from_utf8_lossy(&stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                ObjectId::from_hex(line).map_err(|err| StoreError::Malformed {
                    what: "log output",
                    detail: err.to_string(),
                })
            })
            .collect()
    }
}

impl ObjectStore for GitStore {
    fn list_tree(&self, id: &ObjectId) -> Result<Vec<Entry>, StoreError> {
        let stdout = run_git(&self.work_dir, &["ls-tree", id.as_str()], None)?;
        String::from_utf8_lossy(&stdout)
            .lines()
            .map(parse_ls_tree_line)
            .collect()
    }

    fn write_tree(&self, entries: &[Entry]) -> Result<ObjectId, StoreError> {
        let mut input = String::new();
        for entry in entries {
            input.push_str(&format_mktree_line(entry));
            input.push('\n');
        }
        let stdout = run_git(
            &self.work_dir,
            &["mktree", "--missing"],
            Some(input.as_bytes()),
        )?;
        parse_id_line(&stdout, "mktree output")
    }

    fn read_blob(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError> {
        run_git(&self.work_dir, &["cat-file", "blob", id.as_str()], None)
    }

    fn write_blob(&self, bytes: &[u8]) -> Result<ObjectId, StoreError> {
        let stdout = run_git(
            &self.work_dir,
            &["hash-object", "-w", "-t", "blob", "--stdin"],
            Some(bytes),
        )?;
        parse_id_line(&stdout, "hash-object output")
    }
}

impl CommitStore for GitStore {
    fn read_commit(&self, id: &ObjectId) -> Result<Commit, StoreError> {
        let payload = run_git(&self.work_dir, &["cat-file", "commit", id.as_str()], None)?;
        Commit::parse(&payload).map_err(|err| StoreError::Malformed {
            what: "commit",
            detail: format!("{id}: {err}"),
        })
    }

    fn write_commit(&self, commit: &Commit) -> Result<ObjectId, StoreError> {
        let stdout = run_git(
            &self.work_dir,
            &["hash-object", "-w", "-t", "commit", "--stdin"],
            Some(&commit.to_bytes()),
        )?;
        parse_id_line(&stdout, "hash-object output")
    }
}

fn parse_id_line(stdout: &[u8], what: &'static str) -> Result<ObjectId, StoreError> {
    ObjectId::from_hex(String::from_utf8_lossy(stdout).trim()).map_err(|err| {
        StoreError::Malformed {
            what,
            detail: err.to_string(),
        }
    })
}

/// Run one git command, optionally feeding stdin, and return stdout.
///
/// Stdin is written from a scoped thread so a filled stdout pipe can
/// never deadlock against an unfinished write.
fn run_git(work_dir: &Path, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>, StoreError> {
    let io_err = |action: &'static str| {
        move |source: std::io::Error| StoreError::Io {
            action,
            source,
        }
    };

    let mut command = Command::new("git");
    command
        .args(args)
        .current_dir(work_dir)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(io_err("spawning git"))?;

    let output = std::thread::scope(|scope| {
        if let Some(input) = stdin {
            let mut pipe = child.stdin.take().expect("stdin was requested as piped");
            scope.spawn(move || {
                // A failed write surfaces as a non-zero git exit below.
                let _ = pipe.write_all(input);
            });
        }
        child.wait_with_output()
    })
    .map_err(io_err("waiting for git"))?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(StoreError::Subprocess {
            args: args.join(" "),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
