//! Predicate execution against a materialized working tree.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::error::{FaultlineError, Result};
use crate::domain::revision::Verdict;

/// Test oracle for one materialized revision.
#[async_trait]
pub trait Predicate: Send + Sync {
    /// Run the predicate with the working tree root as its working
    /// directory and classify the outcome.
    ///
    /// A failure to launch is fatal and surfaces as `PredicateLaunch`;
    /// everything the predicate itself reports becomes a [`Verdict`].
    async fn check(&self, working_tree: &Path) -> Result<Verdict>;
}

/// External command predicate following the bisect exit-code convention:
/// `0` good, `125` skip, anything else bad.
///
/// The command may mutate the working tree; it must not touch the revision
/// store. No retries are performed: one execution, one verdict.
#[derive(Debug)]
pub struct CommandPredicate {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandPredicate {
    /// Build a predicate from an argv vector (first element is the
    /// executable). Rejects an empty vector.
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() || command[0].is_empty() {
            return Err(FaultlineError::PredicateLaunch {
                command: String::new(),
                reason: "empty predicate command".to_string(),
            });
        }
        Ok(CommandPredicate {
            command,
            timeout: None,
        })
    }

    /// Treat executions longer than `limit` as untestable (`Skip`) instead
    /// of stalling the search.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// The argv vector, joined for display.
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }
}

#[async_trait]
impl Predicate for CommandPredicate {
    async fn check(&self, working_tree: &Path) -> Result<Verdict> {
        let child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .current_dir(working_tree)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FaultlineError::PredicateLaunch {
                command: self.display_command(),
                reason: e.to_string(),
            })?;

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    // The child is reaped by kill_on_drop; a hung predicate
                    // must not stall the whole search.
                    warn!(
                        command = %self.display_command(),
                        timeout_secs = limit.as_secs(),
                        "predicate timed out, treating revision as untestable"
                    );
                    return Ok(Verdict::Skip);
                }
            },
            None => child.wait_with_output().await?,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let verdict = Verdict::from_exit_code(exit_code);
        debug!(
            command = %self.display_command(),
            exit_code,
            verdict = %verdict,
            "predicate finished"
        );
        Ok(verdict)
    }
}
