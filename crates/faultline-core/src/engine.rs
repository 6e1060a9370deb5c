//! Bisection search over a (good, bad) revision range.
//!
//! The engine is an explicit state machine: it asks the graph for the
//! ordered candidate range, probes midpoints through the predicate, narrows
//! the range by topological bulk resolution, and returns the boundary
//! revision together with first-class counters. It never renders output and
//! never parses human-oriented text.

use std::collections::BTreeSet;

use tracing::info;

use crate::domain::error::{FaultlineError, Result};
use crate::domain::revision::{BisectionResult, Revision, RevisionRange, Verdict};
use crate::graph::RevisionGraph;
use crate::runner::Predicate;

/// Mutable working set of one search invocation.
///
/// Created when a search starts, discarded once it produces a result or
/// error; never persisted or shared across invocations.
struct SearchState {
    /// Inclusive candidate list, topologically ordered old to new.
    revisions: Vec<Revision>,

    /// Classification slot per candidate. Seeded at both endpoints:
    /// index 0 is the known-good revision, the last index the known-bad
    /// one; neither is ever probed.
    verdicts: Vec<Option<Verdict>>,

    /// Index of the tightest known-good revision.
    lo: usize,

    /// Index of the tightest known-bad revision (the current suspect).
    hi: usize,

    /// Indices excluded as untestable.
    skipped: BTreeSet<usize>,

    /// Predicate executions performed.
    probes: u64,

    /// Distinct revisions ever included in a candidate set. Fixed at init:
    /// the candidate set only ever shrinks.
    scanned: u64,
}

impl SearchState {
    fn new(revisions: Vec<Revision>) -> Self {
        debug_assert!(revisions.len() >= 2, "range endpoints are always present");
        let last = revisions.len() - 1;
        let mut verdicts = vec![None; revisions.len()];
        verdicts[0] = Some(Verdict::Good);
        verdicts[last] = Some(Verdict::Bad);
        let scanned = revisions.len() as u64;
        SearchState {
            revisions,
            verdicts,
            lo: 0,
            hi: last,
            skipped: BTreeSet::new(),
            probes: 0,
            scanned,
        }
    }

    /// Unknown candidates: strictly between the cursors, unclassified and
    /// not skipped.
    fn unknown(&self) -> Vec<usize> {
        (self.lo + 1..self.hi)
            .filter(|i| self.verdicts[*i].is_none() && !self.skipped.contains(i))
            .collect()
    }

    /// Midpoint by count of unknown candidates, never by hash order or
    /// wall-clock.
    fn next_probe(&self) -> Option<usize> {
        let unknown = self.unknown();
        if unknown.is_empty() {
            None
        } else {
            Some(unknown[unknown.len() / 2])
        }
    }

    /// Classify one candidate. Verdicts are never retracted; a conflicting
    /// reclassification means the predicate is not monotonic over the range.
    fn classify(&mut self, index: usize, verdict: Verdict) -> Result<()> {
        match self.verdicts[index] {
            None => {
                self.verdicts[index] = Some(verdict);
                Ok(())
            }
            Some(existing) if existing == verdict => Ok(()),
            Some(existing) => Err(FaultlineError::NonMonotonic {
                revision: self.revisions[index].id.to_string(),
                existing,
                conflicting: verdict,
                probes: self.probes,
            }),
        }
    }

    /// Apply one probe verdict with topological bulk resolution.
    fn record(&mut self, index: usize, verdict: Verdict) -> Result<()> {
        debug_assert!(index > self.lo && index < self.hi);
        match verdict {
            Verdict::Good => {
                // Everything at or below the probe resolves good; skipped
                // candidates keep their verdict but fall out of the open
                // interval as ancestors of the new known-good boundary.
                for i in self.lo + 1..=index {
                    if self.skipped.contains(&i) {
                        continue;
                    }
                    self.classify(i, Verdict::Good)?;
                }
                self.lo = index;
            }
            Verdict::Bad => {
                // Everything at or above the probe resolves bad; the probe
                // becomes the new suspect.
                for i in index..=self.hi {
                    if self.skipped.contains(&i) {
                        continue;
                    }
                    self.classify(i, Verdict::Bad)?;
                }
                self.hi = index;
            }
            Verdict::Skip => {
                self.skipped.insert(index);
            }
        }
        Ok(())
    }

    /// Skipped candidates still inside the open (good, bad) interval,
    /// exactly the ones that obscure the boundary.
    fn skipped_in_interval(&self) -> usize {
        self.skipped.range(self.lo + 1..self.hi).count()
    }

    /// Terminal transition: called once no unknown candidate remains.
    fn finish(self) -> Result<BisectionResult> {
        let blocked = self.skipped_in_interval();
        if blocked > 0 {
            // The boundary cannot be isolated between the cursors without a
            // determinate verdict on the skipped candidates.
            return Err(FaultlineError::AmbiguousBoundary {
                good: self.revisions[self.lo].id.to_string(),
                suspect: self.revisions[self.hi].id.to_string(),
                skipped: blocked,
                probes: self.probes,
                scanned: self.scanned,
            });
        }

        // With no skip and no unknown inside the interval, the suspect's
        // in-range predecessor is the known-good cursor: the suspect is the
        // boundary revision.
        debug_assert_eq!(self.lo + 1, self.hi);
        debug_assert!(matches!(self.verdicts[self.hi], Some(Verdict::Bad)));
        Ok(BisectionResult {
            first_bad: self.revisions[self.hi].clone(),
            probes: self.probes,
            revisions_scanned: self.scanned,
        })
    }
}

/// Bisection search driver.
pub struct Bisector;

impl Bisector {
    /// Find the earliest revision in `(good, bad]` where `predicate` starts
    /// failing.
    ///
    /// The endpoints are trusted without probing: `good` passes, `bad`
    /// fails. The search is sequential (each verdict determines the next
    /// probe) and holds at most one materialized working tree at a time.
    /// Cancelling the returned future drops the active tree handle, which
    /// restores the repository's prior checkout state.
    pub async fn run(
        graph: &dyn RevisionGraph,
        predicate: &dyn Predicate,
        good: &str,
        bad: &str,
    ) -> Result<BisectionResult> {
        let good_rev = graph.resolve(good)?;
        let bad_rev = graph.resolve(bad)?;
        if good_rev.id == bad_rev.id {
            return Err(FaultlineError::InvalidRange {
                good: good_rev.id.to_string(),
                bad: bad_rev.id.to_string(),
                reason: "good and bad name the same revision".to_string(),
            });
        }

        let range = RevisionRange {
            good: good_rev.id,
            bad: bad_rev.id,
        };
        let revisions = graph.ancestors_between(&range)?;
        info!(
            event = "search.started",
            good = %range.good.short(),
            bad = %range.bad.short(),
            candidates = revisions.len(),
        );
        let mut state = SearchState::new(revisions);

        while let Some(index) = state.next_probe() {
            let revision = state.revisions[index].clone();
            let tree = graph.materialize(&revision.id)?;
            let outcome = predicate.check(tree.root()).await;
            // Release the tree before the next materialization; this also
            // runs on the error path below.
            drop(tree);
            let verdict = outcome?;
            state.probes += 1;
            state.record(index, verdict)?;
            info!(
                event = "probe.verdict",
                revision = %revision.id.short(),
                verdict = %verdict,
                probes = state.probes,
                remaining = state.unknown().len(),
            );
        }

        let result = state.finish()?;
        info!(
            event = "search.finished",
            first_bad = %result.first_bad.id.short(),
            probes = result.probes,
            revisions_scanned = result.revisions_scanned,
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryGraph, ScriptedPredicate};

    /// Scripted linear history of `n` revisions where the regression lands
    /// at index `boundary` (every revision at or past it fails).
    fn scripted(n: usize, boundary: usize) -> (MemoryGraph, ScriptedPredicate) {
        let graph = MemoryGraph::linear(n);
        let pairs: Vec<(String, Verdict)> = (0..n)
            .map(|i| {
                let verdict = if i >= boundary {
                    Verdict::Bad
                } else {
                    Verdict::Good
                };
                (format!("r{i}"), verdict)
            })
            .collect();
        (graph, ScriptedPredicate::new(pairs))
    }

    /// Probes needed in the worst case for `u` unknown candidates.
    fn probe_bound(u: usize) -> u64 {
        (usize::BITS - u.leading_zeros()) as u64
    }

    #[tokio::test]
    async fn test_four_revision_chain_boundary_and_counters() {
        // r0 good, r1 good, r2 first bad, r3 bad.
        let (graph, predicate) = scripted(4, 2);
        let result = Bisector::run(&graph, &predicate, "r0", "r3").await.unwrap();

        assert_eq!(result.first_bad.id.as_str(), "r2");
        assert_eq!(result.probes, 2);
        assert_eq!(result.revisions_scanned, 4);
        // Endpoints are pre-seeded, never probed.
        assert!(!predicate.probed().contains(&"r0".to_string()));
        assert!(!predicate.probed().contains(&"r3".to_string()));
    }

    #[tokio::test]
    async fn test_skip_at_boundary_is_ambiguous() {
        let graph = MemoryGraph::linear(4);
        let predicate = ScriptedPredicate::new(vec![
            ("r1".to_string(), Verdict::Good),
            ("r2".to_string(), Verdict::Skip),
        ]);
        let err = Bisector::run(&graph, &predicate, "r0", "r3")
            .await
            .unwrap_err();

        match err {
            FaultlineError::AmbiguousBoundary {
                skipped, probes, ..
            } => {
                assert_eq!(skipped, 1);
                assert_eq!(probes, 2);
            }
            other => panic!("expected AmbiguousBoundary, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_every_candidate_skipped_is_ambiguous() {
        let graph = MemoryGraph::linear(6);
        let predicate = ScriptedPredicate::new(
            (1..5).map(|i| (format!("r{i}"), Verdict::Skip)).collect(),
        );
        let err = Bisector::run(&graph, &predicate, "r0", "r5")
            .await
            .unwrap_err();

        match err {
            FaultlineError::AmbiguousBoundary {
                skipped, scanned, ..
            } => {
                assert_eq!(skipped, 4);
                assert_eq!(scanned, 6);
            }
            other => panic!("expected AmbiguousBoundary, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_skip_below_resolved_boundary_is_harmless() {
        // r1 untestable, but the boundary isolates at r3 anyway: once r2
        // probes good, r1 is excluded as an ancestor of a good revision.
        let graph = MemoryGraph::linear(5);
        let predicate = ScriptedPredicate::new(vec![
            ("r1".to_string(), Verdict::Skip),
            ("r2".to_string(), Verdict::Good),
            ("r3".to_string(), Verdict::Bad),
        ]);
        let result = Bisector::run(&graph, &predicate, "r0", "r4").await.unwrap();
        assert_eq!(result.first_bad.id.as_str(), "r3");
    }

    #[tokio::test]
    async fn test_good_equals_bad_is_invalid_range() {
        let (graph, predicate) = scripted(4, 2);
        let err = Bisector::run(&graph, &predicate, "r1", "r1")
            .await
            .unwrap_err();
        assert!(matches!(err, FaultlineError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn test_reversed_range_is_invalid() {
        let (graph, predicate) = scripted(4, 2);
        let err = Bisector::run(&graph, &predicate, "r3", "r0")
            .await
            .unwrap_err();
        assert!(matches!(err, FaultlineError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn test_unknown_endpoint_fails() {
        let (graph, predicate) = scripted(4, 2);
        let err = Bisector::run(&graph, &predicate, "r0", "zzz")
            .await
            .unwrap_err();
        assert!(matches!(err, FaultlineError::UnknownRevision(_)));
    }

    #[tokio::test]
    async fn test_direct_child_terminates_with_zero_probes() {
        let (graph, predicate) = scripted(2, 1);
        let result = Bisector::run(&graph, &predicate, "r0", "r1").await.unwrap();

        assert_eq!(result.first_bad.id.as_str(), "r1");
        assert_eq!(result.probes, 0);
        assert_eq!(result.revisions_scanned, 2);
        assert!(predicate.probed().is_empty());
    }

    #[tokio::test]
    async fn test_launch_failure_aborts_search() {
        let graph = MemoryGraph::linear(4);
        let predicate = ScriptedPredicate::failing_launch();
        let err = Bisector::run(&graph, &predicate, "r0", "r3")
            .await
            .unwrap_err();
        assert!(matches!(err, FaultlineError::PredicateLaunch { .. }));
    }

    #[tokio::test]
    async fn test_deterministic_predicate_is_idempotent() {
        let (graph, predicate) = scripted(16, 11);
        let first = Bisector::run(&graph, &predicate, "r0", "r15").await.unwrap();
        let second = Bisector::run(&graph, &predicate, "r0", "r15").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_every_boundary_position_converges_within_bound() {
        for n in 2..=33 {
            for boundary in 1..n {
                let (graph, predicate) = scripted(n, boundary);
                let good = "r0".to_string();
                let bad = format!("r{}", n - 1);
                let result = Bisector::run(&graph, &predicate, &good, &bad)
                    .await
                    .unwrap_or_else(|e| panic!("n={n} boundary={boundary}: {e}"));

                assert_eq!(
                    result.first_bad.id.as_str(),
                    format!("r{boundary}"),
                    "n={n} boundary={boundary}"
                );
                let unknowns = n - 2;
                assert!(
                    result.probes <= probe_bound(unknowns),
                    "n={n} boundary={boundary}: {} probes > bound {}",
                    result.probes,
                    probe_bound(unknowns)
                );
                assert_eq!(result.revisions_scanned, n as u64);
            }
        }
    }

    fn candidate_range(graph: &MemoryGraph, good: &str, bad: &str) -> Vec<Revision> {
        graph
            .ancestors_between(&RevisionRange {
                good: graph.resolve(good).unwrap().id,
                bad: graph.resolve(bad).unwrap().id,
            })
            .unwrap()
    }

    #[test]
    fn test_conflicting_classification_is_non_monotonic() {
        let graph = MemoryGraph::linear(5);
        let mut state = SearchState::new(candidate_range(&graph, "r0", "r4"));

        state.record(3, Verdict::Bad).unwrap();
        // A later good verdict above the known-bad cursor contradicts it.
        let err = state.classify(3, Verdict::Good).unwrap_err();
        assert!(matches!(err, FaultlineError::NonMonotonic { .. }));
    }

    #[test]
    fn test_midpoint_selection_by_unknown_count() {
        let graph = MemoryGraph::linear(8);
        let mut state = SearchState::new(candidate_range(&graph, "r0", "r7"));

        // Six unknowns (1..=6): midpoint is the fourth.
        assert_eq!(state.next_probe(), Some(4));
        state.record(4, Verdict::Skip).unwrap();
        // Five unknowns (1,2,3,5,6): midpoint skips the excluded index.
        assert_eq!(state.next_probe(), Some(3));
    }
}
