//! Domain models for faultline.
//!
//! Canonical definitions for the core entities:
//! - `Revision`: Immutable node in the version-controlled history
//! - `Verdict`: Three-valued outcome of one probe
//! - `BisectionResult`: Terminal output of a search
//! - `ChangeSummary`: Per-file statistics and diff for one revision

pub mod error;
pub mod revision;

// Re-export main types and errors
pub use error::{FaultlineError, Result};
pub use revision::{
    BisectionResult, ChangeSummary, FileChange, Revision, RevisionId, RevisionRange, Verdict,
};
