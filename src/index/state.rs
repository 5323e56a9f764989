//! index::state
//!
//! The in-memory model of a package's published history.
//!
//! [`PackageIndexState`] is rebuilt from the committed documents at the start
//! of every publish and never persisted in any other form. Releases are kept
//! in the order they were discovered; that order is the rendering order.

use std::collections::BTreeMap;

use crate::core::artifact::PackageRelease;
use crate::core::types::PackageName;
use crate::core::version::{CanonicalVersion, DistributionVersion};

/// Outcome of merging a release into the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The version was new and has been appended.
    Appended,
    /// The version exists with the same artifacts; nothing changed.
    Identical,
    /// The version exists with different artifacts; nothing changed.
    Conflict { existing: PackageRelease },
}

/// Full version history of one package plus the package names listed in
/// the root document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIndexState {
    package: PackageName,
    releases: Vec<PackageRelease>,
    /// Normalized name -> link text, for every package in the root document.
    known_packages: BTreeMap<String, String>,
}

impl PackageIndexState {
    /// Empty history for `package`.
    pub fn new(package: PackageName) -> Self {
        Self::from_parts(package, Vec::new(), BTreeMap::new())
    }

    /// Rebuild from parsed parts. `package` is always added to the known
    /// packages.
    pub fn from_parts(
        package: PackageName,
        releases: Vec<PackageRelease>,
        mut known_packages: BTreeMap<String, String>,
    ) -> Self {
        known_packages
            .entry(package.normalized())
            .or_insert_with(|| package.as_str().to_string());
        Self {
            package,
            releases,
            known_packages,
        }
    }

    pub fn package(&self) -> &PackageName {
        &self.package
    }

    pub fn releases(&self) -> &[PackageRelease] {
        &self.releases
    }

    /// Packages listed in the root document, ordered by normalized name.
    pub fn known_packages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.known_packages
            .iter()
            .map(|(normalized, text)| (normalized.as_str(), text.as_str()))
    }

    pub fn find(&self, version: &DistributionVersion) -> Option<&PackageRelease> {
        self.releases.iter().find(|r| r.version() == version)
    }

    /// Merge `release`, appending it only if its version is new.
    pub fn merge(&mut self, release: PackageRelease) -> MergeOutcome {
        match self.find(release.version()) {
            Some(existing) if existing.same_artifacts(&release) => MergeOutcome::Identical,
            Some(existing) => MergeOutcome::Conflict {
                existing: existing.clone(),
            },
            None => {
                self.releases.push(release);
                MergeOutcome::Appended
            }
        }
    }

    /// Highest canonical version already published, by semver precedence.
    pub fn latest_canonical(&self) -> Option<&CanonicalVersion> {
        self.releases.iter().map(|r| r.version().canonical()).max()
    }
}
