//! core::artifact
//!
//! Build outputs, uploaded artifacts and releases.
//!
//! # Flow
//!
//! 1. The build collaborator supplies [`BuildOutput`]s (platform, filename,
//!    local path).
//! 2. [`ArtifactSet::collect`] validates them against the required
//!    [`PlatformSet`] and the filename convention for the release version.
//! 3. The release host uploads the set and returns [`Artifact`]s carrying
//!    download URLs.
//! 4. [`ArtifactSet::into_release`] pairs those with the set and produces the
//!    immutable [`PackageRelease`] handed to the index store.
//!
//! # Naming convention
//!
//! Every filename starts with `<escaped name>-<escaped version>` followed by
//! `-` (wheels) or `.` (sdists). The escaped name is the wheel form of the
//! package name (`foo_bar` for `Foo.Bar`) and is compared case-insensitively.
//! The escaped version is the distribution version with its prerelease
//! separator replaced by `_` (`1.0.0_rc.1+doppel`) and must match exactly,
//! since [`version_from_filename`] reads it back when the index is parsed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use thiserror::Error;

use super::platform::PlatformSet;
use super::types::{PackageName, Platform};
use super::version::{DistributionVersion, VersionResolver};

/// Errors from artifact collection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// One or more required platforms have no artifact.
    #[error("incomplete platform set: missing {}", format_platforms(.missing))]
    IncompletePlatformSet { missing: Vec<Platform> },

    /// A filename does not follow the convention or is duplicated.
    #[error("artifact '{filename}' does not match naming convention: {reason}")]
    ArtifactNamingMismatch { filename: String, reason: String },

    /// The release host returned a different set of files than was uploaded.
    #[error("uploaded artifacts do not match the collected set: {reason}")]
    UploadMismatch { reason: String },
}

fn format_platforms(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A file produced by the build collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub platform: Platform,
    pub filename: String,
    pub path: PathBuf,
}

/// A published artifact with its public download location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Artifact {
    pub platform: Platform,
    pub filename: String,
    pub url: String,
}

/// All artifacts of one version.
///
/// Artifacts are kept ordered by platform name, then filename, which is the
/// order they are rendered in. Filenames are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRelease {
    version: DistributionVersion,
    artifacts: Vec<Artifact>,
}

impl PackageRelease {
    /// # Errors
    ///
    /// Returns `ArtifactError::ArtifactNamingMismatch` if two artifacts share
    /// a filename.
    pub fn new(
        version: DistributionVersion,
        mut artifacts: Vec<Artifact>,
    ) -> Result<Self, ArtifactError> {
        ensure_unique(artifacts.iter().map(|a| a.filename.as_str()))?;
        artifacts.sort_by(|a, b| {
            (a.platform.as_str(), a.filename.as_str())
                .cmp(&(b.platform.as_str(), b.filename.as_str()))
        });
        Ok(Self { version, artifacts })
    }

    pub fn version(&self) -> &DistributionVersion {
        &self.version
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Artifact-set equality by (filename, URL); platform labels are ignored.
    pub fn same_artifacts(&self, other: &PackageRelease) -> bool {
        let key = |r: &PackageRelease| -> BTreeSet<(String, String)> {
            r.artifacts
                .iter()
                .map(|a| (a.filename.clone(), a.url.clone()))
                .collect()
        };
        key(self) == key(other)
    }
}

/// Validated build outputs for one version, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    version: DistributionVersion,
    outputs: Vec<BuildOutput>,
}

impl ArtifactSet {
    /// Validate build outputs for `version`.
    ///
    /// # Errors
    ///
    /// - `ArtifactError::IncompletePlatformSet` listing every required
    ///   platform without an output.
    /// - `ArtifactError::ArtifactNamingMismatch` for a filename that is
    ///   unsafe, duplicated or does not embed `version`.
    ///
    /// Naming is checked before coverage, so a stale file from another
    /// version is reported by name rather than as a missing platform.
    pub fn collect(
        package: &PackageName,
        version: &DistributionVersion,
        mut outputs: Vec<BuildOutput>,
        platforms: &PlatformSet,
    ) -> Result<Self, ArtifactError> {
        for output in &outputs {
            check_naming(package, version, &output.filename)?;
        }
        ensure_unique(outputs.iter().map(|o| o.filename.as_str()))?;

        let missing: Vec<Platform> = platforms
            .names()
            .into_iter()
            .filter(|required| !outputs.iter().any(|o| &o.platform == required))
            .collect();
        if !missing.is_empty() {
            return Err(ArtifactError::IncompletePlatformSet { missing });
        }

        outputs.sort_by(|a, b| {
            (a.platform.as_str(), a.filename.as_str())
                .cmp(&(b.platform.as_str(), b.filename.as_str()))
        });
        Ok(Self {
            version: version.clone(),
            outputs,
        })
    }

    pub fn version(&self) -> &DistributionVersion {
        &self.version
    }

    pub fn outputs(&self) -> &[BuildOutput] {
        &self.outputs
    }

    /// Combine with the host's upload result.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError::UploadMismatch` unless `uploaded` names exactly
    /// the collected filenames.
    pub fn into_release(self, uploaded: Vec<Artifact>) -> Result<PackageRelease, ArtifactError> {
        let mut by_name: BTreeMap<String, Artifact> = uploaded
            .into_iter()
            .map(|a| (a.filename.clone(), a))
            .collect();

        let mut artifacts = Vec::with_capacity(self.outputs.len());
        for output in &self.outputs {
            let uploaded = by_name.remove(&output.filename).ok_or_else(|| {
                ArtifactError::UploadMismatch {
                    reason: format!("no download URL for '{}'", output.filename),
                }
            })?;
            artifacts.push(Artifact {
                platform: output.platform.clone(),
                filename: output.filename.clone(),
                url: uploaded.url,
            });
        }
        if let Some(extra) = by_name.keys().next() {
            return Err(ArtifactError::UploadMismatch {
                reason: format!("unexpected uploaded file '{extra}'"),
            });
        }

        PackageRelease::new(self.version, artifacts)
    }
}

/// Check a filename against the naming convention for `version`.
///
/// # Errors
///
/// Returns `ArtifactError::ArtifactNamingMismatch` describing the first
/// violation.
pub fn check_naming(
    package: &PackageName,
    version: &DistributionVersion,
    filename: &str,
) -> Result<(), ArtifactError> {
    let mismatch = |reason: String| ArtifactError::ArtifactNamingMismatch {
        filename: filename.to_string(),
        reason,
    };

    check_filename_chars(filename).map_err(mismatch)?;

    let name = format!("{}-", package.wheel_prefix());
    let embedded = version.filename_component();
    let name_matches = filename
        .get(..name.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(&name));
    let version_matches = name_matches
        && filename[name.len()..].starts_with(&embedded)
        && matches!(
            filename.as_bytes().get(name.len() + embedded.len()),
            Some(b'-') | Some(b'.')
        );
    if !version_matches {
        let expected = format!("{name}{embedded}");
        return Err(mismatch(format!(
            "expected filename to start with '{expected}-' or '{expected}.'"
        )));
    }
    Ok(())
}

/// Reject characters that cannot appear in an index link or a URL path
/// segment without escaping.
///
/// # Errors
///
/// Returns the reason as a string.
pub fn check_filename_chars(filename: &str) -> Result<(), String> {
    if filename.is_empty() {
        return Err("filename is empty".into());
    }
    if let Some(c) = filename.chars().find(|c| {
        c.is_control() || c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '&' | '/' | '\\')
    }) {
        return Err(format!("filename contains forbidden character {c:?}"));
    }
    Ok(())
}

/// Recover the distribution version embedded in a filename.
///
/// The version starts after `<escaped name>-` and ends at the first
/// `+<suffix>` that is followed by `-` or `.`. The `_` escape applied by
/// [`DistributionVersion::filename_component`] is reversed. Returns `None`
/// for files of other packages or other suffixes.
pub fn version_from_filename(
    package: &PackageName,
    resolver: &VersionResolver,
    filename: &str,
) -> Option<DistributionVersion> {
    let prefix = format!("{}-", package.wheel_prefix());
    let head = filename.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(&prefix) {
        return None;
    }
    let rest = &filename[prefix.len()..];
    let delimiter = format!("+{}", resolver.suffix());
    let end = rest.match_indices(&delimiter).find_map(|(idx, _)| {
        let end = idx + delimiter.len();
        matches!(rest.as_bytes().get(end), Some(b'-') | Some(b'.')).then_some(end)
    })?;
    resolver
        .parse_distribution(&rest[..end].replace('_', "-"))
        .ok()
}

fn ensure_unique<'a>(filenames: impl Iterator<Item = &'a str>) -> Result<(), ArtifactError> {
    let mut seen = BTreeSet::new();
    for filename in filenames {
        if !seen.insert(filename) {
            return Err(ArtifactError::ArtifactNamingMismatch {
                filename: filename.to_string(),
                reason: "filename appears more than once".into(),
            });
        }
    }
    Ok(())
}
