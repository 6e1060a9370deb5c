//! Domain-level error taxonomy for faultline.

use crate::domain::revision::Verdict;

/// Faultline domain errors.
///
/// Every variant is terminal for the current search invocation; nothing is
/// retried internally. Variants carry enough context (revision identifiers,
/// counters so far) for an operator to resume manually.
#[derive(Debug, thiserror::Error)]
pub enum FaultlineError {
    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("invalid range {good}..{bad}: {reason}")]
    InvalidRange {
        good: String,
        bad: String,
        reason: String,
    },

    #[error("predicate could not be launched: `{command}`: {reason}")]
    PredicateLaunch { command: String, reason: String },

    #[error(
        "ambiguous boundary: {skipped} untestable revision(s) remain between \
         good {good} and bad {suspect} after {probes} probe(s) over {scanned} revision(s)"
    )]
    AmbiguousBoundary {
        good: String,
        suspect: String,
        skipped: usize,
        probes: u64,
        scanned: u64,
    },

    #[error(
        "non-monotonic verdicts: revision {revision} classified {existing} \
         cannot be reclassified {conflicting} after {probes} probe(s)"
    )]
    NonMonotonic {
        revision: String,
        existing: Verdict,
        conflicting: Verdict,
        probes: u64,
    },

    #[error("git error: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for faultline domain operations.
pub type Result<T> = std::result::Result<T, FaultlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_revision_display() {
        let err = FaultlineError::UnknownRevision("deadbeef".to_string());
        assert!(err.to_string().contains("unknown revision"));
        assert!(err.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_invalid_range_display() {
        let err = FaultlineError::InvalidRange {
            good: "aaa111".to_string(),
            bad: "bbb222".to_string(),
            reason: "good is not an ancestor of bad".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("aaa111..bbb222"));
        assert!(msg.contains("not an ancestor"));
    }

    #[test]
    fn test_ambiguous_boundary_carries_counters() {
        let err = FaultlineError::AmbiguousBoundary {
            good: "aaa111".to_string(),
            suspect: "bbb222".to_string(),
            skipped: 3,
            probes: 5,
            scanned: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 untestable"));
        assert!(msg.contains("5 probe(s)"));
        assert!(msg.contains("12 revision(s)"));
    }

    #[test]
    fn test_non_monotonic_display() {
        let err = FaultlineError::NonMonotonic {
            revision: "ccc333".to_string(),
            existing: Verdict::Bad,
            conflicting: Verdict::Good,
            probes: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("ccc333"));
        assert!(msg.contains("bad"));
        assert!(msg.contains("good"));
    }
}
