//! core::platform
//!
//! The set of platforms a release must cover, and detection of an artifact's
//! platform from its wheel filename.
//!
//! A wheel filename ends in `-<platform tag>.whl`, where the platform tag may
//! be a compound of several tags joined by `.` (for example
//! `manylinux_2_17_x86_64.manylinux2014_x86_64`). A [`PlatformSpec`] matches
//! a tag when one of its OS prefixes starts the tag and the tag ends in
//! `_<arch>`.

use serde::{Deserialize, Serialize};

use super::types::Platform;

/// How to recognize one platform in artifact filenames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformSpec {
    pub name: Platform,
    pub os_prefixes: Vec<String>,
    pub arch: String,
}

impl PlatformSpec {
    fn new(name: &str, os_prefixes: &[&str], arch: &str) -> Option<Self> {
        Some(Self {
            name: Platform::new(name).ok()?,
            os_prefixes: os_prefixes.iter().map(|p| (*p).to_string()).collect(),
            arch: arch.to_string(),
        })
    }

    /// Whether a single (non-compound) wheel platform tag belongs to this platform.
    pub fn matches_tag(&self, tag: &str) -> bool {
        let tag = tag.to_ascii_lowercase();
        let arch_suffix = format!("_{}", self.arch.to_ascii_lowercase());
        tag.ends_with(&arch_suffix)
            && self
                .os_prefixes
                .iter()
                .any(|prefix| tag.starts_with(&prefix.to_ascii_lowercase()))
    }
}

/// The required platforms for a release, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSet {
    specs: Vec<PlatformSpec>,
}

impl Default for PlatformSet {
    /// `linux-x86_64`, `macos-x86_64` and `macos-arm64`.
    fn default() -> Self {
        let specs = [
            PlatformSpec::new(
                "linux-x86_64",
                &["linux", "manylinux", "musllinux"],
                "x86_64",
            ),
            PlatformSpec::new("macos-x86_64", &["macosx"], "x86_64"),
            PlatformSpec::new("macos-arm64", &["macosx"], "arm64"),
        ];
        Self {
            specs: specs.into_iter().flatten().collect(),
        }
    }
}

impl PlatformSet {
    pub fn new(specs: Vec<PlatformSpec>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &[PlatformSpec] {
        &self.specs
    }

    /// Required platform identifiers.
    pub fn names(&self) -> Vec<Platform> {
        self.specs.iter().map(|spec| spec.name.clone()).collect()
    }

    pub fn contains(&self, platform: &Platform) -> bool {
        self.specs.iter().any(|spec| &spec.name == platform)
    }

    /// Detect the platform of a wheel by its filename.
    ///
    /// Returns `None` for non-wheel files, universal wheels (`any`) and tags
    /// no spec recognizes. The first matching spec in configuration order
    /// wins.
    pub fn detect(&self, filename: &str) -> Option<Platform> {
        let tag = wheel_platform_tag(filename)?;
        tag.split('.').find_map(|part| {
            self.specs
                .iter()
                .find(|spec| spec.matches_tag(part))
                .map(|spec| spec.name.clone())
        })
    }
}

/// The trailing platform tag of a wheel filename, if it is a wheel.
fn wheel_platform_tag(filename: &str) -> Option<&str> {
    let stem = filename
        .strip_suffix(".whl")
        .or_else(|| filename.strip_suffix(".WHL"))?;
    let (_, tag) = stem.rsplit_once('-')?;
    (!tag.is_empty()).then_some(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(filename: &str) -> Option<String> {
        PlatformSet::default()
            .detect(filename)
            .map(|p| p.as_str().to_string())
    }

    #[test]
    fn default_set_has_three_platforms() {
        let names: Vec<_> = PlatformSet::default()
            .names()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, ["linux-x86_64", "macos-x86_64", "macos-arm64"]);
    }

    #[test]
    fn detects_simple_linux_tag() {
        assert_eq!(
            detect("deptry-0.24.0+doppel-linux_x86_64.whl").as_deref(),
            Some("linux-x86_64")
        );
    }

    #[test]
    fn detects_compound_manylinux_tag() {
        assert_eq!(
            detect("deptry-0.24.0+doppel-cp39-abi3-manylinux_2_17_x86_64.manylinux2014_x86_64.whl")
                .as_deref(),
            Some("linux-x86_64")
        );
    }

    #[test]
    fn distinguishes_macos_architectures() {
        assert_eq!(
            detect("deptry-0.24.0+doppel-cp39-abi3-macosx_10_12_x86_64.whl").as_deref(),
            Some("macos-x86_64")
        );
        assert_eq!(
            detect("deptry-0.24.0+doppel-cp39-abi3-macosx_11_0_arm64.whl").as_deref(),
            Some("macos-arm64")
        );
    }

    #[test]
    fn ignores_unknown_and_universal() {
        assert_eq!(detect("deptry-0.24.0+doppel-py3-none-any.whl"), None);
        assert_eq!(detect("deptry-0.24.0+doppel-win_amd64.whl"), None);
        assert_eq!(detect("deptry-0.24.0+doppel.tar.gz"), None);
        assert_eq!(detect("linux_aarch64.whl"), None);
    }

    #[test]
    fn custom_platform_spec() {
        let windows = PlatformSpec {
            name: Platform::new("windows-amd64").unwrap(),
            os_prefixes: vec!["win".into()],
            arch: "amd64".into(),
        };
        let set = PlatformSet::new(vec![windows]);
        assert_eq!(
            set.detect("pkg-1.0.0+doppel-cp39-abi3-win_amd64.whl")
                .map(String::from)
                .as_deref(),
            Some("windows-amd64")
        );
    }
}
