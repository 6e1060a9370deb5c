//! Per-revision change statistics and diff extraction.
//!
//! Counts and diff text come from the version-control substrate verbatim;
//! this module never invents or rewrites them.

use std::path::PathBuf;

use crate::domain::error::Result;
use crate::domain::revision::{ChangeSummary, FileChange, RevisionId};
use crate::graph::{GitGraph, RevisionGraph};

impl GitGraph {
    /// Per-file change counts and raw diff for `revision`.
    ///
    /// A merge revision is summarized against its FIRST parent only; a root
    /// revision is summarized against the empty tree. Pure read of the
    /// revision store, idempotent; fails with `UnknownRevision` if the id
    /// names nothing.
    pub fn summarize(&self, revision: &RevisionId) -> Result<ChangeSummary> {
        let rev = self.resolve(revision.as_str())?;

        let (numstat, diff_text) = if rev.parents.is_empty() {
            let id = rev.id.as_str();
            (
                self.git(&[
                    "diff-tree",
                    "--root",
                    "--no-commit-id",
                    "--numstat",
                    "-r",
                    id,
                ])?,
                self.git(&["diff-tree", "--root", "--no-commit-id", "-p", "-r", id])?,
            )
        } else {
            let parent = rev.parents[0].as_str();
            (
                self.git(&["diff", "--numstat", parent, rev.id.as_str()])?,
                self.git(&["diff", parent, rev.id.as_str()])?,
            )
        };

        Ok(ChangeSummary {
            revision: rev.id,
            files: parse_numstat(&numstat),
            diff_text,
        })
    }
}

/// Parse `git diff --numstat` output: one `insertions TAB deletions TAB path`
/// line per file. Binary entries report `-` for both counts and parse to
/// zero. Rename notation in the path column is preserved as reported.
fn parse_numstat(raw: &str) -> Vec<FileChange> {
    raw.lines()
        .filter_map(|line| {
            let mut columns = line.splitn(3, '\t');
            let insertions = columns.next()?.trim();
            let deletions = columns.next()?.trim();
            let path = columns.next()?.trim();
            if path.is_empty() {
                return None;
            }
            let insertions: u64 = insertions.parse().unwrap_or(0);
            let deletions: u64 = deletions.parse().unwrap_or(0);
            Some(FileChange {
                path: PathBuf::from(path),
                insertions,
                deletions,
                lines: insertions + deletions,
            })
        })
        .collect()
}
