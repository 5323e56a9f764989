//! cli
//!
//! Command-line interface layer for simplepub.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and wire the collaborators together
//! - Delegate to command handlers and map results to exit codes
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and hands the work
//! to [`crate::engine`]. All index changes flow through the pipeline.
//!
//! # Exit codes
//!
//! - `0`: the run finished (published, already published, or planned)
//! - `1`: the pipeline failed
//! - `2`: usage or configuration error

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;

use crate::core::config::{Config, ConfigError};
use crate::engine::PipelineError;
use crate::git::Git;
use crate::logging;
use crate::ui::output::{self, Verbosity};

/// Settings shared by all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Working directory override
    pub cwd: Option<PathBuf>,
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    pub verbosity: Verbosity,
}

impl Context {
    /// Directory the command runs in.
    pub fn cwd(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Open the repository containing the working directory.
    pub fn open_repo(&self) -> Result<Git> {
        Ok(Git::open(&self.cwd()?)?)
    }

    /// Load configuration for the repository at `repo_dir`, logging any
    /// warnings.
    pub fn load_config(&self, repo_dir: &Path) -> Result<Config, ConfigError> {
        let result = Config::load(repo_dir, self.config.as_deref())?;
        for warning in &result.warnings {
            tracing::warn!(path = %warning.path.display(), "{}", warning.message);
        }
        if let Some(path) = result.config.path() {
            tracing::debug!(path = %path.display(), "loaded configuration");
        }
        Ok(result.config)
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> ExitCode {
    let cli = Cli::parse_args();
    let ctx = Context {
        cwd: cli.cwd.clone(),
        config: cli.config.clone(),
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
    };
    logging::init(ctx.verbosity);

    match commands::dispatch(cli.command, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(format!("{err:#}"));
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Exit status for a failed command.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let is_config = err.chain().any(|cause| {
        cause.is::<ConfigError>()
            || matches!(cause.downcast_ref::<PipelineError>(), Some(PipelineError::Config(_)))
    });
    if is_config {
        2
    } else {
        1
    }
}
