//! build
//!
//! The build collaborator seam: where finished artifacts come from.
//!
//! Nothing here compiles anything. A [`BuildSource`] only reports the files
//! an external build already produced, each tagged with its platform.
//! Validation against the required platform set and the naming convention
//! happens later, in `ArtifactSet::collect`.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::artifact::BuildOutput;
use crate::core::platform::PlatformSet;
use crate::core::version::DistributionVersion;

/// Errors from a build source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("build output directory not found: {}", .0.display())]
    DirNotFound(PathBuf),

    #[error("cannot read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

/// Supplies the build outputs for a version.
pub trait BuildSource: Send + Sync {
    fn outputs(&self, version: &DistributionVersion) -> Result<Vec<BuildOutput>, BuildError>;
}

/// Outputs found in a distribution directory such as `dist/`.
///
/// Every regular file with a configured extension is reported. The platform
/// comes from the wheel platform tag; files whose platform cannot be
/// determined are skipped with a warning.
#[derive(Debug, Clone)]
pub struct DistDirSource {
    dir: PathBuf,
    extensions: Vec<String>,
    platforms: PlatformSet,
}

impl DistDirSource {
    pub fn new(dir: impl Into<PathBuf>, extensions: Vec<String>, platforms: PlatformSet) -> Self {
        Self {
            dir: dir.into(),
            extensions,
            platforms,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn has_extension(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
    }
}

impl BuildSource for DistDirSource {
    fn outputs(&self, version: &DistributionVersion) -> Result<Vec<BuildOutput>, BuildError> {
        if !self.dir.is_dir() {
            return Err(BuildError::DirNotFound(self.dir.clone()));
        }
        let io_err = |path: &Path, e: std::io::Error| BuildError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut outputs = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))? {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            let path = entry.path();
            if !entry.file_type().map_err(|e| io_err(&path, e))?.is_file() {
                continue;
            }
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %path.display(), "skipping file with non-UTF-8 name");
                continue;
            };
            if !self.has_extension(&filename) {
                continue;
            }
            match self.platforms.detect(&filename) {
                Some(platform) => outputs.push(BuildOutput {
                    platform,
                    filename,
                    path,
                }),
                None => warn!(file = %filename, "skipping artifact for unrecognized platform"),
            }
        }

        outputs.sort_by(|a, b| a.filename.cmp(&b.filename));
        debug!(
            dir = %self.dir.display(),
            version = %version,
            count = outputs.len(),
            "found build outputs"
        );
        Ok(outputs)
    }
}

/// A fixed list of outputs, for callers that already know them.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    outputs: Vec<BuildOutput>,
}

impl StaticSource {
    pub fn new(outputs: Vec<BuildOutput>) -> Self {
        Self { outputs }
    }
}

impl BuildSource for StaticSource {
    fn outputs(&self, _version: &DistributionVersion) -> Result<Vec<BuildOutput>, BuildError> {
        Ok(self.outputs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::VersionResolver;
    use tempfile::TempDir;

    fn version() -> DistributionVersion {
        VersionResolver::default().resolve("v0.24.0").unwrap()
    }

    fn source(dir: &TempDir) -> DistDirSource {
        DistDirSource::new(dir.path(), vec![".whl".into()], PlatformSet::default())
    }

    #[test]
    fn finds_wheels_with_platforms() {
        let dir = TempDir::new().unwrap();
        for name in [
            "deptry-0.24.0+doppel-cp39-abi3-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
            "deptry-0.24.0+doppel-cp39-abi3-macosx_11_0_arm64.whl",
            "deptry-0.24.0+doppel.tar.gz",
            "deptry-0.24.0+doppel-py3-none-any.whl",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.whl")).unwrap();

        let outputs = source(&dir).outputs(&version()).unwrap();
        let found: Vec<(&str, &str)> = outputs
            .iter()
            .map(|o| (o.platform.as_str(), o.filename.as_str()))
            .collect();
        assert_eq!(
            found,
            [
                ("macos-arm64", "deptry-0.24.0+doppel-cp39-abi3-macosx_11_0_arm64.whl"),
                (
                    "linux-x86_64",
                    "deptry-0.24.0+doppel-cp39-abi3-manylinux_2_17_x86_64.manylinux2014_x86_64.whl"
                ),
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = DistDirSource::new(dir.path().join("dist"), vec![".whl".into()], PlatformSet::default());
        assert!(matches!(source.outputs(&version()), Err(BuildError::DirNotFound(_))));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("deptry-0.24.0+doppel-linux_x86_64.WHL"), b"x").unwrap();
        assert_eq!(source(&dir).outputs(&version()).unwrap().len(), 1);
    }
}
