//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads configuration for the repository
//! 2. Builds the collaborators it needs from that configuration
//! 3. Runs the work and prints the result
//!
//! `publish` is async underneath because the release host is reached over
//! HTTP; the handler drives it on a Tokio runtime.

mod publish;
mod render;
mod resolve;

pub use publish::publish;
pub use render::render;
pub use resolve::resolve;

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::config::{Config, ConfigError};
use crate::core::types::PackageName;
use crate::engine::PipelineError;
use crate::git::{Git, GitError};
use crate::host::GitHubReleaseHost;
use crate::index::IndexDocumentBuilder;
use crate::store::{GitBackend, IndexStore};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Publish { tag, dry_run } => publish(ctx, tag, dry_run),
        Command::Resolve { tag } => resolve(ctx, &tag),
        Command::Render { package, root } => render(ctx, package, root),
    }
}

/// Index store on the configured branch of the repository at `repo_dir`.
pub(crate) fn index_store(repo_dir: &Path, config: &Config, package: PackageName) -> IndexStore {
    let mut backend = GitBackend::new(repo_dir, config.index_branch())
        .with_timeout(config.network_timeout());
    if let Some(remote) = config.index_remote() {
        backend = backend.with_remote(remote);
    }
    if let Some((name, email)) = config.committer() {
        backend = backend.with_committer(name, email);
    }

    IndexStore::new(
        Box::new(backend),
        IndexDocumentBuilder::new(config.index_root_dir()),
        package,
        config.resolver(),
        config.platforms(),
    )
}

/// GitHub host for the configured repository, or the one `origin` points at.
pub(crate) fn github_host(git: &Git, config: &Config) -> Result<GitHubReleaseHost> {
    let (owner, repo) = release_repository(config, || git.remote_url("origin"))?;

    let token_env = config.token_env();
    Ok(GitHubReleaseHost::new(owner, repo)
        .with_token(std::env::var(token_env).ok())
        .with_token_env(token_env)
        .with_api_base(config.api_base())
        .with_timeout(config.network_timeout()))
}

/// `(owner, repo)` from `release.repository`, else from the origin URL.
///
/// Configuration problems are wrapped in [`PipelineError::Config`]; a failure
/// to read the remote is reported as itself.
fn release_repository(
    config: &Config,
    origin: impl FnOnce() -> Result<Option<String>, GitError>,
) -> Result<(String, String)> {
    if let Some(repository) = config.release_repository() {
        return repository
            .split_once('/')
            .map(|(owner, repo)| (owner.to_string(), repo.to_string()))
            .ok_or_else(|| {
                PipelineError::Config(ConfigError::InvalidValue(format!(
                    "release.repository '{repository}'"
                )))
                .into()
            });
    }

    let url = origin().context("cannot read remote 'origin'")?;
    url.as_deref()
        .and_then(Git::parse_github_remote)
        .ok_or_else(|| PipelineError::Config(config.missing_value("release.repository")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::exit_code;

    fn config(toml: &str) -> Config {
        Config::from_toml(toml).unwrap()
    }

    #[test]
    fn configured_repository_wins() {
        let config = config("[release]\nrepository = \"o/deptry\"\n");
        let found = release_repository(&config, || panic!("origin must not be read")).unwrap();
        assert_eq!(found, ("o".to_string(), "deptry".to_string()));
    }

    #[test]
    fn falls_back_to_github_origin() {
        let found = release_repository(&config(""), || {
            Ok(Some("git@github.com:o/deptry.git".into()))
        })
        .unwrap();
        assert_eq!(found, ("o".to_string(), "deptry".to_string()));
    }

    #[test]
    fn missing_origin_is_config_error() {
        let err = release_repository(&config(""), || Ok(None)).unwrap_err();
        assert_eq!(exit_code(&err), 2);
        assert!(err.to_string().contains("release.repository"));
    }

    #[test]
    fn unreadable_origin_is_reported() {
        let err = release_repository(&config(""), || {
            Err(GitError::Internal {
                message: "corrupt remote config".into(),
            })
        })
        .unwrap_err();
        assert_eq!(exit_code(&err), 1);
        assert!(format!("{err:#}").contains("corrupt remote config"), "{err:#}");
        assert!(!err.to_string().contains("release.repository"));
    }
}
