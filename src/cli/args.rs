//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--config <path>`: Use this configuration file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// simplepub - publish tagged releases to a static simple index
#[derive(Parser, Debug)]
#[command(name = "simplepub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if simplepub was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Configuration file (default: simplepub.toml in the repository)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; only warnings and errors are logged
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload the artifacts for a tag and add them to the index
    #[command(
        long_about = "Upload the artifacts for a tag and add them to the index.\n\n\
            The tag is taken from --tag, or from the CI environment \
            (GITHUB_REF=refs/tags/<tag>, or GITHUB_REF_TYPE=tag with GITHUB_REF_NAME). \
            Running without a tag fails.\n\n\
            Re-running for a tag that is already published is a no-op; publishing \
            different artifacts under an existing version fails.",
        after_help = "\
EXAMPLES:
    # In a tag-triggered CI job
    simplepub publish

    # Explicit tag, checking what would happen first
    simplepub publish --tag v0.24.0 --dry-run"
    )]
    Publish {
        /// Release tag, e.g. v0.24.0
        #[arg(long)]
        tag: Option<String>,

        /// Resolve and collect only; do not upload or write the index
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the distribution version a tag resolves to
    Resolve {
        /// Release tag, e.g. v0.24.0
        tag: String,
    },

    /// Print the index documents derived from the committed index
    Render {
        /// Print only the package document
        #[arg(long, conflicts_with = "root")]
        package: bool,

        /// Print only the root document
        #[arg(long)]
        root: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["simplepub", "publish", "--tag", "v1.0.0", "--debug", "--config", "x.toml"])
            .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        match cli.command {
            Command::Publish { tag, dry_run } => {
                assert_eq!(tag.as_deref(), Some("v1.0.0"));
                assert!(!dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn render_selectors_conflict() {
        assert!(Cli::try_parse_from(["simplepub", "render", "--package", "--root"]).is_err());
    }
}
