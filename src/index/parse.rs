//! index::parse
//!
//! Reconstruction of [`PackageIndexState`] from committed documents.
//!
//! The parser accepts what this crate renders and the common shapes other
//! simple-index generators produce: anchors with arbitrary extra attributes,
//! single or double quoted attribute values, and entity-escaped text. Only
//! `<a>` elements matter; everything else is ignored.
//!
//! Artifacts are grouped into releases by the version embedded in their
//! filename, in order of first appearance.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::state::PackageIndexState;
use crate::core::artifact::{version_from_filename, Artifact, PackageRelease};
use crate::core::platform::PlatformSet;
use crate::core::types::{PackageName, Platform};
use crate::core::version::{DistributionVersion, VersionResolver};

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<a\s+([^>]*)>(.*?)</a\s*>").expect("valid anchor regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

/// Errors from parsing index documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("link '{text}' has no href")]
    MissingHref { text: String },

    #[error("artifact '{filename}' does not belong to this package: {reason}")]
    UnrecognizedArtifact { filename: String, reason: String },

    #[error("cannot determine platform of artifact '{filename}'")]
    UnknownPlatform { filename: String },

    #[error("artifact '{filename}' is listed more than once")]
    DuplicateArtifact { filename: String },

    #[error("root document lists invalid package name '{name}'")]
    InvalidPackageName { name: String },
}

/// One `<a>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
}

/// Extract every anchor with its unescaped text and attributes.
pub fn parse_links(body: &str) -> Result<Vec<Link>, ParseError> {
    ANCHOR
        .captures_iter(body)
        .map(|anchor| -> Result<Link, ParseError> {
            let attributes: BTreeMap<String, String> = ATTRIBUTE
                .captures_iter(&anchor[1])
                .map(|attr| {
                    let value = attr
                        .get(2)
                        .or_else(|| attr.get(3))
                        .map(|m| m.as_str())
                        .unwrap_or_default();
                    (attr[1].to_ascii_lowercase(), unescape(value))
                })
                .collect();
            let text = unescape(anchor[2].trim());
            let href = attributes
                .get("href")
                .cloned()
                .ok_or_else(|| ParseError::MissingHref { text: text.clone() })?;
            Ok(Link {
                href,
                text,
                attributes,
            })
        })
        .collect()
}

/// Package names listed in a root document, keyed by normalized name.
///
/// # Errors
///
/// Returns `ParseError::InvalidPackageName` for link text that is not a
/// valid package name.
pub fn parse_root(body: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut packages = BTreeMap::new();
    for link in parse_links(body)? {
        let name = PackageName::new(link.text.as_str())
            .map_err(|_| ParseError::InvalidPackageName { name: link.text.clone() })?;
        packages
            .entry(name.normalized())
            .or_insert_with(|| link.text.clone());
    }
    Ok(packages)
}

/// Releases listed in a package document, in order of first appearance.
///
/// The platform comes from `data-platform` when present, otherwise from
/// the wheel platform tag.
///
/// # Errors
///
/// - `ParseError::UnrecognizedArtifact` for a filename of another package or
///   suffix
/// - `ParseError::UnknownPlatform` if no platform can be determined
/// - `ParseError::DuplicateArtifact` for a filename listed twice
pub fn parse_package(
    body: &str,
    package: &PackageName,
    resolver: &VersionResolver,
    platforms: &PlatformSet,
) -> Result<Vec<PackageRelease>, ParseError> {
    let mut groups: Vec<(DistributionVersion, Vec<Artifact>)> = Vec::new();
    let mut seen = std::collections::BTreeSet::new();

    for link in parse_links(body)? {
        let filename = link.text;
        if !seen.insert(filename.clone()) {
            return Err(ParseError::DuplicateArtifact { filename });
        }

        let version = version_from_filename(package, resolver, &filename).ok_or_else(|| {
            ParseError::UnrecognizedArtifact {
                filename: filename.clone(),
                reason: format!(
                    "expected '{}-<version>+{}' prefix",
                    package.wheel_prefix(),
                    resolver.suffix()
                ),
            }
        })?;

        let platform = match link.attributes.get("data-platform") {
            Some(value) => Platform::new(value.as_str()).ok(),
            None => platforms.detect(&filename),
        }
        .ok_or_else(|| ParseError::UnknownPlatform {
            filename: filename.clone(),
        })?;

        let artifact = Artifact {
            platform,
            filename,
            url: link.href,
        };
        match groups.iter_mut().find(|(v, _)| *v == version) {
            Some((_, artifacts)) => artifacts.push(artifact),
            None => groups.push((version, vec![artifact])),
        }
    }

    groups
        .into_iter()
        .map(|(version, artifacts)| {
            PackageRelease::new(version, artifacts).map_err(|e| ParseError::UnrecognizedArtifact {
                filename: String::new(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Rebuild the full state from whichever documents exist.
///
/// A missing root document yields only `package` as a known package; a
/// missing package document yields an empty history.
pub fn parse_index(
    root: Option<&str>,
    package_doc: Option<&str>,
    package: &PackageName,
    resolver: &VersionResolver,
    platforms: &PlatformSet,
) -> Result<PackageIndexState, ParseError> {
    let known = root.map(parse_root).transpose()?.unwrap_or_default();
    let releases = package_doc
        .map(|body| parse_package(body, package, resolver, platforms))
        .transpose()?
        .unwrap_or_default();
    Ok(PackageIndexState::from_parts(package.clone(), releases, known))
}

/// Decode the entities [`super::render`] produces plus common numeric forms.
fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
