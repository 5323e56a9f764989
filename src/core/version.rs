//! core::version
//!
//! Tag-to-version resolution.
//!
//! A release is identified by a source-control tag such as `v0.24.0`. The
//! [`VersionResolver`] turns that tag into a [`DistributionVersion`]: the
//! canonical semantic version plus the fork's fixed local suffix
//! (`0.24.0+doppel`). Because the suffix is fixed per resolver, the mapping
//! between canonical and distribution versions is a bijection.
//!
//! Resolution is a pure function of the tag string.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(\d+\.\d+\.\d+(?:-[A-Za-z0-9.]+)?)$").expect("valid tag regex")
});

/// Suffix used when none is configured.
pub const DEFAULT_LOCAL_SUFFIX: &str = "doppel";

/// Errors from version resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The tag does not have the form `v<major>.<minor>.<patch>[-<pre>]`.
    #[error("invalid tag format '{tag}': {reason}")]
    InvalidTagFormat { tag: String, reason: String },

    /// The configured local suffix is not a valid local version label.
    #[error("invalid local suffix '{suffix}': {reason}")]
    InvalidLocalSuffix { suffix: String, reason: String },

    /// A version string does not carry this resolver's suffix.
    #[error("'{version}' is not a distribution version with suffix '+{suffix}'")]
    ForeignVersion { version: String, suffix: String },
}

/// A raw release tag that matched the tag pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseTag(String);

impl ReleaseTag {
    /// Validate a raw tag string.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidTagFormat` if the tag does not match
    /// the pattern or the version part is not valid semver.
    pub fn parse(raw: &str) -> Result<(Self, CanonicalVersion), VersionError> {
        let captures = TAG_PATTERN
            .captures(raw)
            .ok_or_else(|| VersionError::InvalidTagFormat {
                tag: raw.to_string(),
                reason: "expected 'v' followed by MAJOR.MINOR.PATCH[-PRERELEASE]".into(),
            })?;
        let version = CanonicalVersion::parse(&captures[1]).map_err(|reason| {
            VersionError::InvalidTagFormat {
                tag: raw.to_string(),
                reason,
            }
        })?;
        Ok((Self(raw.to_string()), version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The semantic version exactly as the upstream project would spell it.
///
/// Ordering follows semver precedence, which is what the monotonicity check
/// uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalVersion(semver::Version);

impl CanonicalVersion {
    fn parse(s: &str) -> Result<Self, String> {
        let version = semver::Version::parse(s).map_err(|e| e.to_string())?;
        if !version.build.is_empty() {
            return Err("build metadata is not allowed".into());
        }
        Ok(Self(version))
    }

    pub fn semver(&self) -> &semver::Version {
        &self.0
    }
}

impl fmt::Display for CanonicalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated PEP 440 local version label (the part after `+`).
///
/// Lowercase alphanumeric segments separated by `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalSuffix(String);

impl LocalSuffix {
    /// # Errors
    ///
    /// Returns `VersionError::InvalidLocalSuffix` for empty labels, empty
    /// segments or characters outside `[a-z0-9.]`.
    pub fn new(suffix: impl Into<String>) -> Result<Self, VersionError> {
        let suffix = suffix.into();
        let invalid = |reason: &str| VersionError::InvalidLocalSuffix {
            suffix: suffix.clone(),
            reason: reason.to_string(),
        };
        if suffix.is_empty() {
            return Err(invalid("suffix cannot be empty"));
        }
        if suffix.split('.').any(str::is_empty) {
            return Err(invalid("segments must be non-empty"));
        }
        if !suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.')
        {
            return Err(invalid("only lowercase letters, digits and '.' are allowed"));
        }
        Ok(Self(suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LocalSuffix {
    fn default() -> Self {
        Self(DEFAULT_LOCAL_SUFFIX.to_string())
    }
}

impl fmt::Display for LocalSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The installable version: canonical version plus local suffix.
///
/// Only constructed through [`VersionResolver`], so the suffix is always the
/// resolver's suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DistributionVersion {
    canonical: CanonicalVersion,
    suffix: LocalSuffix,
}

impl DistributionVersion {
    pub fn canonical(&self) -> &CanonicalVersion {
        &self.canonical
    }

    pub fn suffix(&self) -> &LocalSuffix {
        &self.suffix
    }

    /// The tag this version was resolved from.
    pub fn tag(&self) -> String {
        format!("v{}", self.canonical)
    }

    /// The version as it appears inside a wheel or sdist filename.
    ///
    /// Filename components are separated by `-`, so a prerelease separator
    /// is escaped to `_` (`1.0.0_rc.1+doppel`). Semver identifiers never
    /// contain `_`, which keeps the escape reversible.
    pub fn filename_component(&self) -> String {
        self.to_string().replace('-', "_")
    }
}

impl fmt::Display for DistributionVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.canonical, self.suffix)
    }
}

/// Resolves release tags into distribution versions.
///
/// # Example
///
/// ```
/// use simplepub::core::version::VersionResolver;
///
/// let resolver = VersionResolver::default();
/// let version = resolver.resolve("v0.24.0").unwrap();
/// assert_eq!(version.to_string(), "0.24.0+doppel");
/// assert_eq!(version.canonical().to_string(), "0.24.0");
///
/// assert!(resolver.resolve("0.24.0").is_err());
/// assert!(resolver.resolve("v1.2").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    suffix: LocalSuffix,
}

impl VersionResolver {
    pub fn new(suffix: LocalSuffix) -> Self {
        Self { suffix }
    }

    pub fn suffix(&self) -> &LocalSuffix {
        &self.suffix
    }

    /// Resolve a raw tag string.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidTagFormat` for malformed tags.
    pub fn resolve(&self, tag: &str) -> Result<DistributionVersion, VersionError> {
        let (_, canonical) = ReleaseTag::parse(tag)?;
        Ok(DistributionVersion {
            canonical,
            suffix: self.suffix.clone(),
        })
    }

    /// Parse a rendered distribution version (`0.24.0+doppel`) back into its
    /// typed form. Inverse of `Display` for versions from this resolver.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::ForeignVersion` if the suffix differs, or
    /// `VersionError::InvalidTagFormat` if the canonical part is malformed.
    pub fn parse_distribution(&self, s: &str) -> Result<DistributionVersion, VersionError> {
        let foreign = || VersionError::ForeignVersion {
            version: s.to_string(),
            suffix: self.suffix.to_string(),
        };
        let (canonical, suffix) = s.split_once('+').ok_or_else(foreign)?;
        if suffix != self.suffix.as_str() {
            return Err(foreign());
        }
        self.resolve(&format!("v{canonical}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_release_tag() {
        let version = VersionResolver::default().resolve("v0.24.0").unwrap();
        assert_eq!(version.to_string(), "0.24.0+doppel");
        assert_eq!(version.tag(), "v0.24.0");
    }

    #[test]
    fn resolves_prerelease_tag() {
        let version = VersionResolver::default().resolve("v1.0.0-rc.1").unwrap();
        assert_eq!(version.to_string(), "1.0.0-rc.1+doppel");
    }

    #[test]
    fn rejects_malformed_tags() {
        let resolver = VersionResolver::default();
        for tag in [
            "0.24.0",
            "v1.2",
            "release-1",
            "v1.2.3.4",
            "v01.2.3",
            "v1.2.3-",
            "v1.2.3+build",
            " v1.2.3",
            "",
        ] {
            assert!(
                matches!(
                    resolver.resolve(tag),
                    Err(VersionError::InvalidTagFormat { .. })
                ),
                "{tag:?} should be rejected"
            );
        }
    }

    #[test]
    fn custom_suffix() {
        let resolver = VersionResolver::new(LocalSuffix::new("fork.2").unwrap());
        assert_eq!(resolver.resolve("v2.0.1").unwrap().to_string(), "2.0.1+fork.2");
    }

    #[test]
    fn invalid_suffixes() {
        for suffix in ["", "Doppel", "a..b", "a-b", ".a"] {
            assert!(LocalSuffix::new(suffix).is_err(), "{suffix:?} should be invalid");
        }
    }

    #[test]
    fn parse_distribution_inverts_display() {
        let resolver = VersionResolver::default();
        let version = resolver.resolve("v3.1.4-beta.2").unwrap();
        let parsed = resolver.parse_distribution(&version.to_string()).unwrap();
        assert_eq!(parsed, version);
    }

    #[test]
    fn filename_component_escapes_prerelease_separator() {
        let resolver = VersionResolver::default();
        assert_eq!(
            resolver.resolve("v1.0.0-rc.1").unwrap().filename_component(),
            "1.0.0_rc.1+doppel"
        );
        assert_eq!(
            resolver.resolve("v0.24.0").unwrap().filename_component(),
            "0.24.0+doppel"
        );
    }

    #[test]
    fn parse_distribution_rejects_other_suffix() {
        let resolver = VersionResolver::default();
        assert!(matches!(
            resolver.parse_distribution("0.24.0+other"),
            Err(VersionError::ForeignVersion { .. })
        ));
        assert!(resolver.parse_distribution("0.24.0").is_err());
    }

    #[test]
    fn canonical_ordering_follows_semver() {
        let resolver = VersionResolver::default();
        let rc = resolver.resolve("v1.0.0-rc.1").unwrap();
        let release = resolver.resolve("v1.0.0").unwrap();
        let older = resolver.resolve("v0.9.10").unwrap();
        assert!(rc.canonical() < release.canonical());
        assert!(older.canonical() < rc.canonical());
    }
}
