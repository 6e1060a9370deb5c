//! faultline: find the first bad commit in a revision range.
//!
//! Bisects a (good, bad) range with an external predicate command, prints
//! the boundary commit with its change summary, and optionally asks the
//! configured suggestion service for a remediation hint.
//!
//! The predicate follows the classic bisect-run convention: exit 0 means
//! the revision is good, 125 means untestable, anything else means bad.

mod render;
mod suggest;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{warn, Level};

use faultline_core::{
    init_tracing, Bisector, ChangeSummary, CommandPredicate, GitGraph, Revision,
};
use suggest::SuggestClient;

#[derive(Parser)]
#[command(name = "faultline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find the first bad commit in a revision range", long_about = None)]
struct Cli {
    /// Known-good revision (any resolvable reference)
    #[arg(short, long)]
    good: String,

    /// Known-bad revision (any resolvable reference)
    #[arg(short, long)]
    bad: String,

    /// Git repository root
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Treat predicate runs longer than this as untestable
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Only show the change summary and diff, skip the suggestion
    #[arg(short, long)]
    diff_only: bool,

    /// Emit a JSON report (and JSON log lines) instead of human output
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Predicate command, given after `--`, run inside each checked-out tree
    #[arg(last = true, required = true, value_name = "PREDICATE")]
    predicate: Vec<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    first_bad: &'a Revision,
    probes: u64,
    revisions_scanned: u64,
    summary: &'a ChangeSummary,
    suggestion: Option<&'a str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let graph = GitGraph::open(&cli.root).context("failed to open repository")?;
    let mut predicate = CommandPredicate::new(cli.predicate)?;
    if let Some(secs) = cli.timeout {
        predicate = predicate.with_timeout(Duration::from_secs(secs));
    }

    let result = tokio::select! {
        outcome = Bisector::run(&graph, &predicate, &cli.good, &cli.bad) => {
            outcome.context("bisection failed")?
        }
        _ = tokio::signal::ctrl_c() => {
            // Cancelling the search future drops the active working-tree
            // guard, which restores the prior checkout before we exit.
            anyhow::bail!("interrupted; working tree restored");
        }
    };

    let summary = graph
        .summarize(&result.first_bad.id)
        .context("failed to summarize the boundary revision")?;

    let suggestion = if cli.diff_only {
        None
    } else {
        match SuggestClient::from_env() {
            Some(client) => client
                .suggest(&result.first_bad.message, &summary.diff_text)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "suggestion service unavailable");
                    None
                }),
            None => None,
        }
    };

    if cli.json {
        let report = JsonReport {
            first_bad: &result.first_bad,
            probes: result.probes,
            revisions_scanned: result.revisions_scanned,
            summary: &summary,
            suggestion: suggestion.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Scanned {} revisions in {} probes.",
        result.revisions_scanned, result.probes
    );
    println!();
    println!("First bad commit: {}", result.first_bad.id);
    println!("Author: {}", result.first_bad.author);
    println!(
        "Date:   {}",
        result.first_bad.committed_at.format("%Y-%m-%d %H:%M:%S %Z")
    );
    println!();
    println!("    {}", result.first_bad.subject());
    println!();
    print!("{}", render::stat_table(&summary));
    println!();
    print!("{}", render::file_tree(&summary));
    if !summary.diff_text.is_empty() {
        println!();
        println!("{}", summary.diff_text.trim_end());
    }

    if cli.diff_only {
        return Ok(());
    }

    println!();
    match suggestion {
        Some(text) => {
            println!("Suggestion for commit {}:", result.first_bad.id.short());
            println!();
            println!("{text}");
        }
        None => println!("No suggestions found."),
    }

    Ok(())
}
