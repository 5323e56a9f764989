//! core::config::schema
//!
//! Configuration schema types.
//!
//! All keys are optional at the parsing level; defaults are applied by the
//! accessor methods on [`super::Config`]. Unknown keys are rejected so typos
//! fail loudly instead of silently falling back to a default.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the index branch must be a valid branch name and
//! the local suffix a valid PEP 440 local label).

use std::collections::BTreeSet;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::platform::PlatformSpec;
use crate::core::types::{BranchName, PackageName};
use crate::core::version::LocalSuffix;

/// Upper bound for `retry.max_attempts`.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Publisher configuration (`simplepub.toml`).
///
/// # Example
///
/// ```toml
/// package = "deptry"
/// local_suffix = "doppel"
/// network_timeout_secs = 60
///
/// [index]
/// branch = "gh-pages"
/// root_dir = "simple"
/// remote = "origin"
///
/// [release]
/// repository = "octo/deptry"
///
/// [build]
/// dist_dir = "dist"
///
/// [retry]
/// max_attempts = 4
///
/// [[platforms]]
/// name = "linux-x86_64"
/// os_prefixes = ["manylinux", "musllinux", "linux"]
/// arch = "x86_64"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherConfig {
    /// Distribution name of the package being published
    pub package: Option<String>,

    /// Local version label appended as `+<suffix>`
    pub local_suffix: Option<String>,

    /// Bound for every network call, in seconds
    pub network_timeout_secs: Option<u64>,

    /// Where the index documents live
    pub index: Option<IndexConfig>,

    /// Release host settings
    pub release: Option<ReleaseConfig>,

    /// Build output discovery
    pub build: Option<BuildConfig>,

    /// Retry policy for concurrent index updates
    pub retry: Option<RetryConfig>,

    /// Required platforms (replaces the default set)
    pub platforms: Option<Vec<PlatformSpec>>,
}

impl PublisherConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(package) = &self.package {
            PackageName::new(package.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("package: {e}")))?;
        }

        if let Some(suffix) = &self.local_suffix {
            LocalSuffix::new(suffix.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("local_suffix: {e}")))?;
        }

        if self.network_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "network_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(index) = &self.index {
            index.validate()?;
        }
        if let Some(release) = &self.release {
            release.validate()?;
        }
        if let Some(build) = &self.build {
            build.validate()?;
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        if let Some(platforms) = &self.platforms {
            validate_platforms(platforms)?;
        }

        Ok(())
    }
}

/// Index location settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Branch holding the documents (default: "gh-pages")
    pub branch: Option<String>,

    /// Directory of the index inside the branch (default: "simple")
    pub root_dir: Option<String>,

    /// Remote to fetch from and push to; local-only when unset
    pub remote: Option<String>,

    /// Committer identity for index commits
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
}

impl IndexConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.branch {
            BranchName::new(branch.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid index branch name: {e}"))
            })?;
        }

        if let Some(root_dir) = &self.root_dir {
            let path = Path::new(root_dir);
            let is_plain = path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
            if !is_plain || root_dir.contains('\\') {
                return Err(ConfigError::InvalidValue(format!(
                    "index.root_dir '{root_dir}' must be a relative path without '..'"
                )));
            }
        }

        if let Some(remote) = &self.remote {
            if remote.is_empty() || remote.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid index remote '{remote}'"
                )));
            }
        }

        if self.committer_name.is_some() != self.committer_email.is_some() {
            return Err(ConfigError::InvalidValue(
                "index.committer_name and index.committer_email must be set together"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Release host settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// `owner/repo`; parsed from the `origin` remote when unset
    pub repository: Option<String>,

    /// API base URL (default: "https://api.github.com")
    pub api_base: Option<String>,

    /// Environment variable holding the API token (default: "GITHUB_TOKEN")
    pub token_env: Option<String>,
}

impl ReleaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(repository) = &self.repository {
            let valid = repository
                .split_once('/')
                .is_some_and(|(owner, repo)| {
                    !owner.is_empty() && !repo.is_empty() && !repo.contains('/')
                });
            if !valid {
                return Err(ConfigError::InvalidValue(format!(
                    "release.repository '{repository}' must have the form 'owner/repo'"
                )));
            }
        }

        if let Some(api_base) = &self.api_base {
            if !api_base.starts_with("https://") && !api_base.starts_with("http://") {
                return Err(ConfigError::InvalidValue(format!(
                    "release.api_base '{api_base}' must be an http(s) URL"
                )));
            }
        }

        if let Some(token_env) = &self.token_env {
            if token_env.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "release.token_env cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Build output discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory scanned for artifacts (default: "dist")
    pub dist_dir: Option<String>,

    /// File extensions considered artifacts (default: [".whl"])
    pub extensions: Option<Vec<String>>,
}

impl BuildConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(extensions) = &self.extensions {
            if extensions.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "build.extensions cannot be empty".to_string(),
                ));
            }
            if let Some(bad) = extensions.iter().find(|e| !e.starts_with('.') || e.len() < 2) {
                return Err(ConfigError::InvalidValue(format!(
                    "build extension '{bad}' must start with '.'"
                )));
            }
        }
        Ok(())
    }
}

/// Retry policy for `ConcurrentModification`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first (default: 4)
    pub max_attempts: Option<u32>,

    /// First backoff delay (default: 500)
    pub base_delay_ms: Option<u64>,

    /// Backoff ceiling (default: 8000)
    pub max_delay_ms: Option<u64>,
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(attempts) = self.max_attempts {
            if !(1..=MAX_RETRY_ATTEMPTS).contains(&attempts) {
                return Err(ConfigError::InvalidValue(format!(
                    "retry.max_attempts must be between 1 and {MAX_RETRY_ATTEMPTS}, got {attempts}"
                )));
            }
        }
        if let (Some(base), Some(max)) = (self.base_delay_ms, self.max_delay_ms) {
            if base > max {
                return Err(ConfigError::InvalidValue(format!(
                    "retry.base_delay_ms ({base}) exceeds retry.max_delay_ms ({max})"
                )));
            }
        }
        Ok(())
    }
}

fn validate_platforms(platforms: &[PlatformSpec]) -> Result<(), ConfigError> {
    if platforms.is_empty() {
        return Err(ConfigError::InvalidValue(
            "at least one platform is required".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for spec in platforms {
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "platform '{}' is listed twice",
                spec.name
            )));
        }
        if spec.os_prefixes.is_empty() || spec.os_prefixes.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidValue(format!(
                "platform '{}' needs non-empty os_prefixes",
                spec.name
            )));
        }
        if spec.arch.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "platform '{}' needs an arch",
                spec.name
            )));
        }
    }
    Ok(())
}
