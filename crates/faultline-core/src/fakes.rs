//! In-memory fakes for the revision graph and predicate (testing only)
//!
//! Provides `MemoryGraph` and `ScriptedPredicate` that satisfy the trait
//! contracts without touching git, the filesystem, or any external process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::domain::error::{FaultlineError, Result};
use crate::domain::revision::{Revision, RevisionId, RevisionRange, Verdict};
use crate::graph::{RevisionGraph, WorkingTree};
use crate::runner::Predicate;

// ---------------------------------------------------------------------------
// MemoryGraph
// ---------------------------------------------------------------------------

/// In-memory linear revision history.
///
/// Identifiers double as resolvable references, so `resolve("r3")` works the
/// way a symbolic name would against a real repository.
pub struct MemoryGraph {
    revisions: Vec<Revision>,
    index: HashMap<String, usize>,
}

impl MemoryGraph {
    /// Build a linear chain `r0 -> r1 -> ... -> r{n-1}`, oldest first.
    pub fn linear(n: usize) -> Self {
        let revisions = (0..n)
            .map(|i| {
                let parents = if i == 0 {
                    vec![]
                } else {
                    vec![RevisionId::new(format!("r{}", i - 1))]
                };
                Revision {
                    id: RevisionId::new(format!("r{i}")),
                    parents,
                    author: "fake".to_string(),
                    committed_at: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
                    message: format!("change {i}"),
                }
            })
            .collect();
        Self::new(revisions)
    }

    /// Build from an explicit chain, oldest first.
    pub fn new(revisions: Vec<Revision>) -> Self {
        let index = revisions
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.as_str().to_string(), i))
            .collect();
        MemoryGraph { revisions, index }
    }

    fn position(&self, id: &RevisionId) -> Result<usize> {
        self.index
            .get(id.as_str())
            .copied()
            .ok_or_else(|| FaultlineError::UnknownRevision(id.to_string()))
    }
}

impl RevisionGraph for MemoryGraph {
    fn resolve(&self, identifier: &str) -> Result<Revision> {
        let position = self
            .index
            .get(identifier)
            .copied()
            .ok_or_else(|| FaultlineError::UnknownRevision(identifier.to_string()))?;
        Ok(self.revisions[position].clone())
    }

    fn ancestors_between(&self, range: &RevisionRange) -> Result<Vec<Revision>> {
        let g = self.position(&range.good)?;
        let b = self.position(&range.bad)?;
        if g >= b {
            let reason = if g == b {
                "good and bad name the same revision"
            } else {
                "good is not an ancestor of bad"
            };
            return Err(FaultlineError::InvalidRange {
                good: range.good.to_string(),
                bad: range.bad.to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(self.revisions[g..=b].to_vec())
    }

    fn materialize(&self, revision: &RevisionId) -> Result<WorkingTree> {
        self.position(revision)?;
        // Virtual tree: the final path component carries the revision id so
        // a scripted predicate can tell probes apart. Nothing is checked
        // out, so there is nothing to restore.
        Ok(WorkingTree::detached(
            PathBuf::from("/memory").join(revision.as_str()),
        ))
    }
}

// ---------------------------------------------------------------------------
// ScriptedPredicate
// ---------------------------------------------------------------------------

/// Predicate that replays pre-assigned verdicts keyed by revision id and
/// records the probe order.
pub struct ScriptedPredicate {
    verdicts: HashMap<String, Verdict>,
    probed: Mutex<Vec<String>>,
    fail_launch: bool,
}

impl ScriptedPredicate {
    /// Verdict per revision id; probing an unscripted revision panics, which
    /// keeps test scripts honest.
    pub fn new(verdicts: Vec<(String, Verdict)>) -> Self {
        ScriptedPredicate {
            verdicts: verdicts.into_iter().collect(),
            probed: Mutex::new(Vec::new()),
            fail_launch: false,
        }
    }

    /// Predicate whose launch always fails.
    pub fn failing_launch() -> Self {
        ScriptedPredicate {
            verdicts: HashMap::new(),
            probed: Mutex::new(Vec::new()),
            fail_launch: true,
        }
    }

    /// Revision ids in the order they were probed.
    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Predicate for ScriptedPredicate {
    async fn check(&self, working_tree: &Path) -> Result<Verdict> {
        if self.fail_launch {
            return Err(FaultlineError::PredicateLaunch {
                command: "<scripted>".to_string(),
                reason: "scripted launch failure".to_string(),
            });
        }
        let id = working_tree
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.probed.lock().unwrap().push(id.clone());
        let verdict = *self
            .verdicts
            .get(&id)
            .unwrap_or_else(|| panic!("no scripted verdict for revision {id}"));
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_graph_resolves_and_orders() {
        let graph = MemoryGraph::linear(3);
        let r0 = graph.resolve("r0").unwrap();
        let r2 = graph.resolve("r2").unwrap();
        assert_eq!(r2.parents, vec![RevisionId::new("r1")]);

        let revs = graph
            .ancestors_between(&RevisionRange {
                good: r0.id.clone(),
                bad: r2.id.clone(),
            })
            .unwrap();
        assert_eq!(revs.len(), 3);
        assert_eq!(revs[0].id, r0.id);
        assert_eq!(revs[2].id, r2.id);
    }

    #[test]
    fn test_unknown_identifier() {
        let graph = MemoryGraph::linear(2);
        assert!(matches!(
            graph.resolve("missing"),
            Err(FaultlineError::UnknownRevision(_))
        ));
    }

    #[tokio::test]
    async fn test_scripted_predicate_replays_and_logs() {
        let predicate = ScriptedPredicate::new(vec![("r1".to_string(), Verdict::Skip)]);
        let graph = MemoryGraph::linear(3);
        let tree = graph.materialize(&RevisionId::new("r1")).unwrap();

        let verdict = predicate.check(tree.root()).await.unwrap();
        assert_eq!(verdict, Verdict::Skip);
        assert_eq!(predicate.probed(), vec!["r1".to_string()]);
    }
}
