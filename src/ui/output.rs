//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Command results go to stdout and respect the quiet flag. Errors go to
//! stderr and are always shown. Diagnostics are not printed here; they are
//! `tracing` events (see [`crate::logging`]).

use std::fmt::Display;

use crate::engine::{PipelineOutcome, PipelineReport};
use crate::store::PublishResult;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-paragraph summary of a successful run.
pub fn format_report(report: &PipelineReport) -> String {
    let retries = match report.attempts {
        1 => String::new(),
        n => format!(" after {n} attempts"),
    };
    match &report.outcome {
        PipelineOutcome::Published(PublishResult::Created) => {
            format!("Published {} ({}){retries}", report.version, report.tag)
        }
        PipelineOutcome::Published(PublishResult::AlreadyUpToDate) => {
            format!("{} ({}) is already published", report.version, report.tag)
        }
        PipelineOutcome::Planned {
            files,
            already_published,
        } => {
            let status = if *already_published {
                "already in the index"
            } else {
                "not yet in the index"
            };
            format!(
                "Would publish {} ({}), {status}:\n{}",
                report.version,
                report.tag,
                format_list(files, "  ")
            )
        }
    }
}
