//! Read-only view over a version-controlled history, plus scoped
//! working-tree materialization.
//!
//! The production implementation shells out to the `git` binary. All
//! plumbing output is machine-oriented (NUL-delimited formats, porcelain
//! status); nothing here parses human-readable summaries.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::domain::error::{FaultlineError, Result};
use crate::domain::revision::{Revision, RevisionId, RevisionRange};

/// Field separator inside one revision record (`%x00`).
const FIELD_SEP: char = '\u{0}';

/// Record separator between revision records (`%x1e`).
const RECORD_SEP: char = '\u{1e}';

/// Metadata format shared by `resolve` and `ancestors_between`:
/// hash, parents, author, commit epoch, full message.
const METADATA_FORMAT: &str = "%H%x00%P%x00%an%x00%ct%x00%B%x1e";

/// Scoped handle to a materialized working tree.
///
/// The restore action runs exactly once when the handle is dropped: on
/// success, on error, on panic, and when an in-flight search future is
/// cancelled.
pub struct WorkingTree {
    root: PathBuf,
    restore: Option<Box<dyn FnOnce() + Send>>,
}

impl WorkingTree {
    /// Handle with no restore action (used by in-memory fakes).
    pub fn detached(root: PathBuf) -> Self {
        WorkingTree {
            root,
            restore: None,
        }
    }

    /// Handle that runs `restore` on drop.
    pub fn with_restore(root: PathBuf, restore: impl FnOnce() + Send + 'static) -> Self {
        WorkingTree {
            root,
            restore: Some(Box::new(restore)),
        }
    }

    /// Root directory of the checked-out tree.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for WorkingTree {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore();
        }
    }
}

impl std::fmt::Debug for WorkingTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingTree")
            .field("root", &self.root)
            .field("restores", &self.restore.is_some())
            .finish()
    }
}

/// Read-only view over the revision history of one repository.
pub trait RevisionGraph: Send + Sync {
    /// Resolve an identifier (hash, symbolic name, any supported reference)
    /// to a revision. Fails with `UnknownRevision` if it names nothing.
    fn resolve(&self, identifier: &str) -> Result<Revision>;

    /// Every revision reachable from `range.bad` that has `range.good` as
    /// an ancestor, inclusive of both endpoints, topologically ordered old
    /// to new.
    ///
    /// Fails with `InvalidRange` if `good == bad` or `good` is not an
    /// ancestor of `bad`.
    fn ancestors_between(&self, range: &RevisionRange) -> Result<Vec<Revision>>;

    /// Check out a working tree reflecting `revision`'s content.
    ///
    /// The prior checkout state is restored when the returned handle is
    /// dropped. At most one materialized tree is active per search.
    fn materialize(&self, revision: &RevisionId) -> Result<WorkingTree>;
}

/// Git-backed revision graph.
///
/// Never mutates the revision store; the only write it performs against the
/// repository is the scoped checkout done by [`materialize`](RevisionGraph::materialize).
pub struct GitGraph {
    root: PathBuf,
}

impl GitGraph {
    /// Open the repository containing `root`.
    ///
    /// Returns an error if the directory is not inside a git work tree or
    /// if git is not available.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let inside = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(&root)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        if !inside {
            return Err(FaultlineError::Git(format!(
                "{} is not inside a git work tree",
                root.display()
            )));
        }

        Ok(GitGraph { root })
    }

    /// Repository root this graph was opened at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run git and return the raw output without checking the exit status.
    pub(crate) fn git_output(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| FaultlineError::Git(format!("failed to run git: {e}")))
    }

    /// Run git, fail on non-zero exit, return stdout.
    pub(crate) fn git(&self, args: &[&str]) -> Result<String> {
        let output = self.git_output(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FaultlineError::Git(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn load(&self, sha: &str) -> Result<Revision> {
        let format = format!("--format={METADATA_FORMAT}");
        let out = self.git(&["show", "--no-patch", &format, sha])?;
        let record = out
            .split(RECORD_SEP)
            .next()
            .ok_or_else(|| FaultlineError::Git(format!("empty metadata for {sha}")))?;
        parse_revision(record)
    }
}

impl RevisionGraph for GitGraph {
    fn resolve(&self, identifier: &str) -> Result<Revision> {
        let spec = format!("{identifier}^{{commit}}");
        let output = self.git_output(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !output.status.success() {
            return Err(FaultlineError::UnknownRevision(identifier.to_string()));
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        self.load(&sha)
    }

    fn ancestors_between(&self, range: &RevisionRange) -> Result<Vec<Revision>> {
        let (good, bad) = (&range.good, &range.bad);
        if good == bad {
            return Err(FaultlineError::InvalidRange {
                good: good.to_string(),
                bad: bad.to_string(),
                reason: "good and bad name the same revision".to_string(),
            });
        }

        let check = self.git_output(&["merge-base", "--is-ancestor", good.as_str(), bad.as_str()])?;
        if !check.status.success() {
            // exit 1 means "not an ancestor"; anything else is a substrate failure
            if check.status.code() == Some(1) {
                return Err(FaultlineError::InvalidRange {
                    good: good.to_string(),
                    bad: bad.to_string(),
                    reason: "good is not an ancestor of bad".to_string(),
                });
            }
            return Err(FaultlineError::Git(format!(
                "git merge-base failed: {}",
                String::from_utf8_lossy(&check.stderr).trim()
            )));
        }

        let format = format!("--format={METADATA_FORMAT}");
        let revspec = format!("{good}..{bad}");
        let out = self.git(&[
            "log",
            "--topo-order",
            "--reverse",
            "--ancestry-path",
            &format,
            &revspec,
        ])?;

        let mut revisions = vec![self.load(good.as_str())?];
        for record in out.split(RECORD_SEP) {
            let record = record.trim_start_matches('\n');
            if record.is_empty() {
                continue;
            }
            revisions.push(parse_revision(record)?);
        }
        Ok(revisions)
    }

    fn materialize(&self, revision: &RevisionId) -> Result<WorkingTree> {
        let status = self.git(&["status", "--porcelain"])?;
        if !status.trim().is_empty() {
            return Err(FaultlineError::Git(
                "working tree has uncommitted changes; commit or stash before bisecting"
                    .to_string(),
            ));
        }

        // Record the prior checkout state: branch name if on a branch,
        // otherwise the detached head sha.
        let symbolic = self.git_output(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        let prior = if symbolic.status.success() {
            String::from_utf8_lossy(&symbolic.stdout).trim().to_string()
        } else {
            self.git(&["rev-parse", "HEAD"])?.trim().to_string()
        };

        self.git(&["checkout", "--quiet", "--detach", revision.as_str()])?;
        debug!(revision = %revision.short(), "materialized working tree");

        let root = self.root.clone();
        let target = revision.clone();
        Ok(WorkingTree::with_restore(self.root.clone(), move || {
            let result = Command::new("git")
                .args(["checkout", "--quiet", &prior])
                .current_dir(&root)
                .output();
            match result {
                Ok(o) if o.status.success() => {
                    debug!(revision = %target.short(), restored = %prior, "released working tree");
                }
                Ok(o) => warn!(
                    restored = %prior,
                    stderr = %String::from_utf8_lossy(&o.stderr).trim(),
                    "failed to restore working tree"
                ),
                Err(e) => warn!(restored = %prior, error = %e, "failed to restore working tree"),
            }
        }))
    }
}

fn parse_revision(record: &str) -> Result<Revision> {
    let mut fields = record.splitn(5, FIELD_SEP);
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| FaultlineError::Git(format!("revision record missing {name} field")))
    };

    let id = RevisionId::new(next("hash")?.trim());
    let parents = next("parents")?
        .split_whitespace()
        .map(RevisionId::new)
        .collect();
    let author = next("author")?.to_string();
    let committed_at = parse_epoch(next("timestamp")?)?;
    let message = next("message")?.trim_end_matches('\n').to_string();

    Ok(Revision {
        id,
        parents,
        author,
        committed_at,
        message,
    })
}

fn parse_epoch(raw: &str) -> Result<DateTime<Utc>> {
    let secs: i64 = raw
        .trim()
        .parse()
        .map_err(|_| FaultlineError::Git(format!("invalid commit timestamp: {raw:?}")))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| FaultlineError::Git(format!("commit timestamp out of range: {secs}")))
}
