//! Revision graph data model.
//!
//! Revisions pre-exist in the version-control substrate and are read-only
//! from faultline's perspective; this module only models them.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque revision identifier (content-addressed hash once resolved).
///
/// The inner field is private so an id can only be produced by a
/// [`RevisionGraph`](crate::graph::RevisionGraph) resolving a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionId(String);

impl RevisionId {
    /// Wrap a resolved identifier.
    pub fn new(id: impl Into<String>) -> Self {
        RevisionId(id.into())
    }

    /// Return the full identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 7 chars, matching git's default abbreviation).
    pub fn short(&self) -> &str {
        &self.0[..7.min(self.0.len())]
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable snapshot node in the revision history DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Resolved identifier.
    pub id: RevisionId,

    /// Parent identifiers, first parent first. Empty for a root revision.
    pub parents: Vec<RevisionId>,

    /// Author name.
    pub author: String,

    /// Commit timestamp.
    pub committed_at: DateTime<Utc>,

    /// Full commit message.
    pub message: String,
}

impl Revision {
    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// The (good, bad) endpoints of one bisection search.
///
/// Valid iff `good != bad` and `good` is an ancestor of `bad`; validation
/// happens in the graph adapter, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRange {
    pub good: RevisionId,
    pub bad: RevisionId,
}

/// Three-valued outcome of one probe. Produced once per probed revision,
/// never retracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Predicate passed at this revision.
    Good,
    /// Predicate failed at this revision.
    Bad,
    /// Revision is untestable (build failure unrelated to the regression,
    /// predicate timeout).
    Skip,
}

impl Verdict {
    /// Map a predicate exit code to a verdict.
    ///
    /// The convention is inherited wholesale from the classic bisect-run
    /// contract so existing predicate scripts keep working: `0` is good,
    /// `125` is skip, everything else (including the negative placeholder
    /// for signal-terminated processes) is bad.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => Verdict::Good,
            125 => Verdict::Skip,
            _ => Verdict::Bad,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Good => "good",
            Verdict::Bad => "bad",
            Verdict::Skip => "skip",
        };
        write!(f, "{s}")
    }
}

/// Per-file change counts for one revision, relative to its first parent.
///
/// Counts come from the version-control substrate verbatim; binary files
/// report zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub insertions: u64,
    pub deletions: u64,
    /// Total changed lines (insertions + deletions).
    pub lines: u64,
}

/// Change statistics and raw diff text for one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// The summarized revision.
    pub revision: RevisionId,

    /// Per-file counts in the order the substrate reports them.
    pub files: Vec<FileChange>,

    /// Raw diff against the first parent, exposed verbatim for
    /// presentation layers.
    pub diff_text: String,
}

impl ChangeSummary {
    /// Sum of insertions across all files.
    pub fn total_insertions(&self) -> u64 {
        self.files.iter().map(|f| f.insertions).sum()
    }

    /// Sum of deletions across all files.
    pub fn total_deletions(&self) -> u64 {
        self.files.iter().map(|f| f.deletions).sum()
    }
}

/// Terminal output of a successful bisection search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BisectionResult {
    /// The earliest bad revision whose in-range parents are all good.
    pub first_bad: Revision,

    /// Predicate executions performed.
    pub probes: u64,

    /// Distinct revisions ever included in a candidate set. May exceed
    /// `probes` because ancestors/descendants resolve in bulk.
    pub revisions_scanned: u64,
}
