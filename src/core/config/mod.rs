//! core::config
//!
//! Configuration schema and loading.
//!
//! # Config Locations
//!
//! Searched in order, first hit wins:
//! 1. Explicit path (`--config`)
//! 2. `$SIMPLEPUB_CONFIG` if set
//! 3. `<repo>/simplepub.toml`
//! 4. `<repo>/.github/simplepub.toml`
//!
//! An explicit path that does not exist is an error. When nothing is found
//! the defaults apply, and [`Config::package`] reports the missing package
//! name to commands that need it.
//!
//! # Example
//!
//! ```no_run
//! use simplepub::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Path::new("/path/to/repo"), None).unwrap();
//! let config = result.config;
//!
//! println!("Index branch: {}", config.index_branch());
//! println!("Max attempts: {}", config.retry_max_attempts());
//! ```

pub mod schema;

pub use schema::PublisherConfig;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::platform::PlatformSet;
use crate::core::types::{BranchName, PackageName};
use crate::core::version::{LocalSuffix, VersionResolver};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "SIMPLEPUB_CONFIG";

/// Config file name searched in the repository.
pub const CONFIG_FILE: &str = "simplepub.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("config file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("missing required config value '{key}' (searched: {searched})")]
    MissingValue { key: String, searched: String },
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded configuration with defaults applied by accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: PublisherConfig,
    /// Path the configuration was read from (if any)
    path: Option<PathBuf>,
    /// Locations considered, for error messages
    searched: Vec<PathBuf>,
}

impl Config {
    /// Load configuration for the repository at `repo_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed or
    /// validated, or if `explicit` names a missing file.
    pub fn load(repo_path: &Path, explicit: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_path(path, vec![path.to_path_buf()], warnings);
        }

        let mut searched = Vec::new();
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(env_path);
            if path.exists() {
                searched.push(path.clone());
                return Self::from_path(&path, searched, warnings);
            }
            warnings.push(ConfigWarning {
                message: format!("${CONFIG_ENV} points to a missing file, ignoring"),
                path: path.clone(),
            });
            searched.push(path);
        }

        let root = repo_path.join(CONFIG_FILE);
        let github = repo_path.join(".github").join(CONFIG_FILE);
        searched.push(root.clone());
        searched.push(github.clone());

        if root.exists() {
            if github.exists() {
                warnings.push(ConfigWarning {
                    message: format!("ignored in favor of '{}'", root.display()),
                    path: github,
                });
            }
            return Self::from_path(&root, searched, warnings);
        }
        if github.exists() {
            return Self::from_path(&github, searched, warnings);
        }

        Ok(ConfigLoadResult {
            config: Config {
                file: PublisherConfig::default(),
                path: None,
                searched,
            },
            warnings,
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` or `ConfigError::InvalidValue`.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let file = Self::parse(contents, Path::new("<inline>"))?;
        Ok(Config {
            file,
            path: None,
            searched: Vec::new(),
        })
    }

    fn from_path(
        path: &Path,
        searched: Vec<PathBuf>,
        warnings: Vec<ConfigWarning>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file = Self::parse(&contents, path)?;
        Ok(ConfigLoadResult {
            config: Config {
                file,
                path: Some(path.to_path_buf()),
                searched,
            },
            warnings,
        })
    }

    fn parse(contents: &str, path: &Path) -> Result<PublisherConfig, ConfigError> {
        let file: PublisherConfig = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Path of the loaded file, if one was found.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Get the package name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingValue` if no package is configured.
    pub fn package(&self) -> Result<PackageName, ConfigError> {
        let raw = self
            .file
            .package
            .as_deref()
            .ok_or_else(|| self.missing_value("package"))?;
        PackageName::new(raw).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Get the local version suffix.
    ///
    /// Defaults to "doppel" if not configured.
    pub fn local_suffix(&self) -> LocalSuffix {
        self.file
            .local_suffix
            .as_deref()
            .and_then(|s| LocalSuffix::new(s).ok())
            .unwrap_or_default()
    }

    /// Resolver using the configured suffix.
    pub fn resolver(&self) -> VersionResolver {
        VersionResolver::new(self.local_suffix())
    }

    /// Get the bound for network calls.
    ///
    /// Defaults to 60 seconds if not configured.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.file.network_timeout_secs.unwrap_or(60))
    }

    /// Get the index branch.
    ///
    /// Defaults to "gh-pages" if not configured.
    pub fn index_branch(&self) -> BranchName {
        self.file
            .index
            .as_ref()
            .and_then(|i| i.branch.as_deref())
            .and_then(|b| BranchName::new(b).ok())
            .unwrap_or_default()
    }

    /// Get the index directory inside the branch.
    ///
    /// Defaults to "simple" if not configured.
    pub fn index_root_dir(&self) -> &str {
        self.file
            .index
            .as_ref()
            .and_then(|i| i.root_dir.as_deref())
            .unwrap_or("simple")
            .trim_matches('/')
    }

    /// Get the remote the index branch is synchronized with.
    ///
    /// `None` means the index lives only in the local repository.
    pub fn index_remote(&self) -> Option<&str> {
        self.file.index.as_ref().and_then(|i| i.remote.as_deref())
    }

    /// Get the committer identity for index commits, if configured.
    pub fn committer(&self) -> Option<(&str, &str)> {
        let index = self.file.index.as_ref()?;
        Some((index.committer_name.as_deref()?, index.committer_email.as_deref()?))
    }

    /// Get the `owner/repo` of the release host, if configured.
    pub fn release_repository(&self) -> Option<&str> {
        self.file
            .release
            .as_ref()
            .and_then(|r| r.repository.as_deref())
    }

    /// Get the release API base URL.
    ///
    /// Defaults to "https://api.github.com" if not configured.
    pub fn api_base(&self) -> &str {
        self.file
            .release
            .as_ref()
            .and_then(|r| r.api_base.as_deref())
            .unwrap_or("https://api.github.com")
            .trim_end_matches('/')
    }

    /// Get the environment variable holding the API token.
    ///
    /// Defaults to "GITHUB_TOKEN" if not configured.
    pub fn token_env(&self) -> &str {
        self.file
            .release
            .as_ref()
            .and_then(|r| r.token_env.as_deref())
            .unwrap_or("GITHUB_TOKEN")
    }

    /// Get the build output directory, relative to the repository.
    ///
    /// Defaults to "dist" if not configured.
    pub fn dist_dir(&self) -> &str {
        self.file
            .build
            .as_ref()
            .and_then(|b| b.dist_dir.as_deref())
            .unwrap_or("dist")
    }

    /// Get the artifact file extensions.
    ///
    /// Defaults to `[".whl"]` if not configured.
    pub fn extensions(&self) -> Vec<String> {
        self.file
            .build
            .as_ref()
            .and_then(|b| b.extensions.clone())
            .unwrap_or_else(|| vec![".whl".to_string()])
    }

    /// Get the total number of publish attempts.
    ///
    /// Defaults to 4 if not configured.
    pub fn retry_max_attempts(&self) -> u32 {
        self.file
            .retry
            .as_ref()
            .and_then(|r| r.max_attempts)
            .unwrap_or(4)
    }

    /// Get the first retry delay.
    ///
    /// Defaults to 500ms if not configured.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(
            self.file
                .retry
                .as_ref()
                .and_then(|r| r.base_delay_ms)
                .unwrap_or(500),
        )
    }

    /// Get the retry delay ceiling.
    ///
    /// Defaults to 8s if not configured, and never less than the base delay.
    pub fn retry_max_delay(&self) -> Duration {
        let max = Duration::from_millis(
            self.file
                .retry
                .as_ref()
                .and_then(|r| r.max_delay_ms)
                .unwrap_or(8000),
        );
        max.max(self.retry_base_delay())
    }

    /// Get the required platform set.
    ///
    /// Defaults to linux-x86_64, macos-x86_64 and macos-arm64.
    pub fn platforms(&self) -> PlatformSet {
        match &self.file.platforms {
            Some(specs) => PlatformSet::new(specs.clone()),
            None => PlatformSet::default(),
        }
    }

    /// Error for a required key that no configuration provides.
    pub fn missing_value(&self, key: &str) -> ConfigError {
        ConfigError::MissingValue {
            key: key.to_string(),
            searched: self.searched_display(),
        }
    }

    fn searched_display(&self) -> String {
        if self.searched.is_empty() {
            return "inline config".to_string();
        }
        self.searched
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_apply_without_file() {
        let config = Config::default();
        assert_eq!(config.index_branch().as_str(), "gh-pages");
        assert_eq!(config.index_root_dir(), "simple");
        assert_eq!(config.index_remote(), None);
        assert_eq!(config.local_suffix().as_str(), "doppel");
        assert_eq!(config.network_timeout(), Duration::from_secs(60));
        assert_eq!(config.api_base(), "https://api.github.com");
        assert_eq!(config.token_env(), "GITHUB_TOKEN");
        assert_eq!(config.dist_dir(), "dist");
        assert_eq!(config.extensions(), vec![".whl".to_string()]);
        assert_eq!(config.retry_max_attempts(), 4);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(500));
        assert_eq!(config.retry_max_delay(), Duration::from_millis(8000));
        assert_eq!(config.platforms(), PlatformSet::default());
    }

    #[test]
    fn missing_package_is_reported() {
        let err = Config::default().package().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { ref key, .. } if key == "package"));
    }

    #[test]
    fn loads_repo_root_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), CONFIG_FILE, "package = \"deptry\"\n");
        let result = Config::load(dir.path(), None).unwrap();
        assert_eq!(result.config.package().unwrap().as_str(), "deptry");
        assert_eq!(result.config.path(), Some(dir.path().join(CONFIG_FILE).as_path()));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn root_file_shadows_github_dir_with_warning() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), CONFIG_FILE, "package = \"first\"\n");
        write(dir.path(), ".github/simplepub.toml", "package = \"second\"\n");
        let result = Config::load(dir.path(), None).unwrap();
        assert_eq!(result.config.package().unwrap().as_str(), "first");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn falls_back_to_github_dir() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".github/simplepub.toml", "package = \"second\"\n");
        let result = Config::load(dir.path(), None).unwrap();
        assert_eq!(result.config.package().unwrap().as_str(), "second");
    }

    #[test]
    fn explicit_path_wins_and_must_exist() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), CONFIG_FILE, "package = \"root\"\n");
        let explicit = write(dir.path(), "custom.toml", "package = \"custom\"\n");
        let result = Config::load(dir.path(), Some(&explicit)).unwrap();
        assert_eq!(result.config.package().unwrap().as_str(), "custom");

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load(dir.path(), Some(&missing)),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn parse_errors_carry_path() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), CONFIG_FILE, "package = [");
        let err = Config::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref path, .. } if path.ends_with(CONFIG_FILE)));
    }

    #[test]
    fn validation_runs_on_load() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), CONFIG_FILE, "[retry]\nmax_attempts = 99\n");
        assert!(matches!(
            Config::load(dir.path(), None),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn accessors_read_configured_values() {
        let config = Config::from_toml(
            r#"
package = "Deptry"
local_suffix = "fork"

[index]
branch = "index"
root_dir = "pypi/"
remote = "upstream"
committer_name = "Bot"
committer_email = "bot@example.com"

[retry]
max_attempts = 2
base_delay_ms = 10
max_delay_ms = 20
"#,
        )
        .unwrap();
        assert_eq!(config.package().unwrap().normalized(), "deptry");
        assert_eq!(config.resolver().resolve("v1.0.0").unwrap().to_string(), "1.0.0+fork");
        assert_eq!(config.index_branch().as_str(), "index");
        assert_eq!(config.index_root_dir(), "pypi");
        assert_eq!(config.index_remote(), Some("upstream"));
        assert_eq!(config.committer(), Some(("Bot", "bot@example.com")));
        assert_eq!(config.retry_max_attempts(), 2);
        assert_eq!(config.retry_max_delay(), Duration::from_millis(20));
    }
}
