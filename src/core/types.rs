//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`PackageName`] - Validated distribution name with PEP 503 normalization
//! - [`Platform`] - Build target identifier (e.g. `linux-x86_64`)
//! - [`BranchName`] - Validated Git branch name holding the index
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so every layer above can pass them around
//! without re-checking.
//!
//! # Examples
//!
//! ```
//! use simplepub::core::types::{BranchName, PackageName, Platform, RefName};
//!
//! let package = PackageName::new("Deptry_Fork").unwrap();
//! assert_eq!(package.normalized(), "deptry-fork");
//!
//! let platform = Platform::new("macos-arm64").unwrap();
//! assert_eq!(platform.as_str(), "macos-arm64");
//!
//! let branch = BranchName::new("gh-pages").unwrap();
//! assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/gh-pages");
//!
//! assert!(PackageName::new("-bad").is_err());
//! assert!(Platform::new("Linux x86").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid package name: {0}")]
    InvalidPackageName(String),

    #[error("invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// A validated Python distribution name.
///
/// Names follow the PEP 508 grammar: ASCII letters and digits, with `-`,
/// `_` and `.` allowed between them. The original spelling is kept for
/// display; [`PackageName::normalized`] gives the PEP 503 form used for
/// index paths and link comparison.
///
/// # Example
///
/// ```
/// use simplepub::core::types::PackageName;
///
/// let name = PackageName::new("Foo.Bar__baz").unwrap();
/// assert_eq!(name.as_str(), "Foo.Bar__baz");
/// assert_eq!(name.normalized(), "foo-bar-baz");
/// assert_eq!(name.wheel_prefix(), "foo_bar_baz");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Create a new validated package name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPackageName` if the name is empty, starts or
    /// ends with punctuation, or contains characters outside `[A-Za-z0-9._-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidPackageName(
                "package name cannot be empty".into(),
            ));
        }

        let is_separator = |c: char| matches!(c, '-' | '_' | '.');
        if name.starts_with(is_separator) || name.ends_with(is_separator) {
            return Err(TypeError::InvalidPackageName(format!(
                "'{name}' must start and end with a letter or digit"
            )));
        }

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !is_separator(*c))
        {
            return Err(TypeError::InvalidPackageName(format!(
                "'{name}' contains invalid character '{c}'"
            )));
        }

        Ok(())
    }

    /// Get the name as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// PEP 503 normalized form: lowercase, runs of `-`, `_`, `.` become `-`.
    pub fn normalized(&self) -> String {
        Self::collapse(&self.0, '-')
    }

    /// Escaped form used as the first component of wheel filenames.
    pub fn wheel_prefix(&self) -> String {
        Self::collapse(&self.0, '_')
    }

    /// Normalize an arbitrary link text the same way as [`normalized`].
    ///
    /// Used when reading root documents that may have been written by other
    /// tools.
    ///
    /// [`normalized`]: PackageName::normalized
    pub fn normalize_str(name: &str) -> String {
        Self::collapse(name, '-')
    }

    fn collapse(name: &str, replacement: char) -> String {
        let mut out = String::with_capacity(name.len());
        let mut in_run = false;
        for c in name.chars() {
            if matches!(c, '-' | '_' | '.') {
                if !in_run {
                    out.push(replacement);
                }
                in_run = true;
            } else {
                out.push(c.to_ascii_lowercase());
                in_run = false;
            }
        }
        out
    }
}

impl TryFrom<String> for PackageName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A build target identifier such as `linux-x86_64` or `macos-arm64`.
///
/// Lowercase ASCII letters, digits, `_` and `-`; must start with a letter.
/// Ordering is lexicographic, which is the order artifacts appear in within
/// a release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform(String);

impl Platform {
    /// Create a new validated platform identifier.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPlatform` for empty or non-conforming names.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let starts_with_letter = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase());
        if !starts_with_letter {
            return Err(TypeError::InvalidPlatform(format!(
                "'{name}' must start with a lowercase letter"
            )));
        }
        if name.ends_with('-')
            || !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(TypeError::InvalidPlatform(format!(
                "'{name}' may only contain lowercase letters, digits, '_' and '-'"
            )));
        }
        Ok(Self(name))
    }

    /// Get the platform identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Platform {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.0
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() || name == "@" {
            return Err(TypeError::InvalidBranchName(format!(
                "'{name}' is not a usable branch name"
            )));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '.' or '-'".into(),
            ));
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '.lock' or '/'".into(),
            ));
        }
        for pattern in ["..", "@{", "//"] {
            if name.contains(pattern) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{pattern}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot contain control characters".into(),
            ));
        }
        if name
            .split('/')
            .any(|component| component.starts_with('.') || component.ends_with(".lock"))
        {
            return Err(TypeError::InvalidBranchName(
                "path component cannot start with '.' or end with '.lock'".into(),
            ));
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchName {
    /// `gh-pages`, the conventional branch for static sites.
    fn default() -> Self {
        Self("gh-pages".to_string())
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use simplepub::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex string.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git reference name.
///
/// # Example
///
/// ```
/// use simplepub::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("gh-pages").unwrap();
/// assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/gh-pages");
/// assert_eq!(
///     RefName::for_remote_tracking("origin", &branch).unwrap().as_str(),
///     "refs/simplepub/origin/gh-pages"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefName(String);

impl RefName {
    /// Namespace for refs that mirror the remote index branch.
    pub const TRACKING_PREFIX: &'static str = "refs/simplepub/";

    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name is not under `refs/`
    /// or violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if !name.starts_with("refs/") {
            return Err(TypeError::InvalidRefName(format!(
                "'{name}' must start with 'refs/'"
            )));
        }
        let rest = &name["refs/".len()..];
        BranchName::new(rest).map_err(|e| TypeError::InvalidRefName(e.to_string()))?;
        Ok(Self(name))
    }

    /// Ref for a local branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Ref holding the last fetched state of `<remote>/<branch>`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the remote name makes the ref invalid.
    pub fn for_remote_tracking(remote: &str, branch: &BranchName) -> Result<Self, TypeError> {
        Self::new(format!("{}{}/{}", Self::TRACKING_PREFIX, remote, branch))
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
