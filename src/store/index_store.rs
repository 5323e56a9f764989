//! store::index_store
//!
//! Read-merge-write of the index over an [`IndexBackend`].
//!
//! # Algorithm
//!
//! 1. Read both documents and the revision they were read at.
//! 2. Parse them into a [`PackageIndexState`].
//! 3. Merge the release. An identical release is a no-op; a different
//!    release under the same version is a conflict.
//! 4. Render and write both documents, conditional on the revision from 1.
//!
//! # Convergence
//!
//! The documents are the only state, so anything a crashed or partial
//! publish left behind is re-derived on the next run. When the committed
//! documents differ from the canonical rendering of what they contain (a
//! root document that was never written, say), an otherwise no-op publish
//! rewrites them.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::backend::{BackendError, IndexBackend, Revision};
use crate::core::artifact::PackageRelease;
use crate::core::platform::PlatformSet;
use crate::core::types::PackageName;
use crate::core::version::VersionResolver;
use crate::index::{
    parse_index, Document, IndexDocumentBuilder, MergeOutcome, PackageIndexState, ParseError,
    RenderError, RenderedIndex,
};

/// Errors from the index store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The current index could not be fetched or understood.
    #[error("cannot read index: {message}")]
    IndexReadError { message: String },

    #[error(transparent)]
    EncodingError(#[from] RenderError),

    /// The version is already published with different artifacts.
    #[error("version {version} is already published with different artifacts")]
    VersionConflict { version: String },

    /// The store moved between read and write.
    #[error("index changed concurrently (expected {expected}, found {actual})")]
    ConcurrentModification { expected: String, actual: String },

    /// The write did not complete.
    #[error("cannot write index: {message}")]
    WriteFailed { message: String },
}

impl From<ParseError> for StoreError {
    fn from(err: ParseError) -> Self {
        StoreError::IndexReadError {
            message: err.to_string(),
        }
    }
}

impl StoreError {
    fn from_read(err: BackendError) -> Self {
        StoreError::IndexReadError {
            message: err.to_string(),
        }
    }

    fn from_write(err: BackendError) -> Self {
        match err {
            BackendError::Conflict { expected, actual } => {
                StoreError::ConcurrentModification { expected, actual }
            }
            other => StoreError::WriteFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Successful publish outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishResult {
    /// The release was appended and committed.
    Created,
    /// The release was already present with identical artifacts.
    AlreadyUpToDate,
}

/// The parsed index at one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub revision: Option<Revision>,
    pub state: PackageIndexState,
    /// Committed documents differ from the canonical rendering of `state`.
    pub drifted: bool,
}

/// The index of one package, persisted through a backend.
pub struct IndexStore {
    backend: Box<dyn IndexBackend>,
    builder: IndexDocumentBuilder,
    package: PackageName,
    resolver: VersionResolver,
    platforms: PlatformSet,
}

impl IndexStore {
    pub fn new(
        backend: Box<dyn IndexBackend>,
        builder: IndexDocumentBuilder,
        package: PackageName,
        resolver: VersionResolver,
        platforms: PlatformSet,
    ) -> Self {
        Self {
            backend,
            builder,
            package,
            resolver,
            platforms,
        }
    }

    pub fn builder(&self) -> &IndexDocumentBuilder {
        &self.builder
    }

    pub fn package(&self) -> &PackageName {
        &self.package
    }

    /// Read and parse the committed index.
    ///
    /// # Errors
    ///
    /// `StoreError::IndexReadError` on backend or parse failure.
    pub fn load(&self) -> Result<IndexSnapshot, StoreError> {
        let root_path = self.builder.root_path();
        let package_path = self.builder.package_path(&self.package.normalized());
        let snapshot = self
            .backend
            .read(&[root_path.clone(), package_path.clone()])
            .map_err(StoreError::from_read)?;

        let root = snapshot.files.get(&root_path).map(String::as_str);
        let package_doc = snapshot.files.get(&package_path).map(String::as_str);
        let state = parse_index(root, package_doc, &self.package, &self.resolver, &self.platforms)?;

        let canonical = self.builder.render(&state)?;
        let drifted = root != Some(canonical.root.body.as_str())
            || package_doc != Some(canonical.package.body.as_str());

        debug!(
            backend = self.backend.name(),
            revision = ?snapshot.revision,
            releases = state.releases().len(),
            drifted,
            "index loaded"
        );
        Ok(IndexSnapshot {
            revision: snapshot.revision,
            state,
            drifted,
        })
    }

    /// Merge `release` into the committed index.
    ///
    /// # Errors
    ///
    /// - `StoreError::IndexReadError` if the index cannot be read
    /// - `StoreError::VersionConflict` if the version exists with other
    ///   artifacts; nothing is written
    /// - `StoreError::EncodingError` if the merged state cannot be rendered
    /// - `StoreError::ConcurrentModification` if the index moved since it
    ///   was read; nothing is written and the caller should start over
    /// - `StoreError::WriteFailed` for any other write failure
    pub fn publish(&self, release: PackageRelease) -> Result<PublishResult, StoreError> {
        let IndexSnapshot {
            revision,
            mut state,
            drifted,
        } = self.load()?;
        let version = release.version().clone();
        let latest = state.latest_canonical().cloned();

        match state.merge(release) {
            MergeOutcome::Identical => {
                if drifted {
                    info!(version = %version, "release already indexed, repairing documents");
                    self.write(revision.as_ref(), &state, &format!("Repair index for {version}"))?;
                } else {
                    info!(version = %version, "release already indexed");
                }
                Ok(PublishResult::AlreadyUpToDate)
            }
            MergeOutcome::Conflict { existing } => {
                warn!(
                    version = %version,
                    existing = existing.artifacts().len(),
                    "version already published with different artifacts"
                );
                Err(StoreError::VersionConflict {
                    version: version.to_string(),
                })
            }
            MergeOutcome::Appended => {
                if let Some(latest) = latest.filter(|l| l > version.canonical()) {
                    warn!(
                        version = %version,
                        latest = %latest,
                        "publishing a version lower than the latest published"
                    );
                }
                self.write(revision.as_ref(), &state, &format!("Publish {version}"))?;
                info!(version = %version, "release indexed");
                Ok(PublishResult::Created)
            }
        }
    }

    /// Documents for the committed index as it would be rendered now.
    pub fn render_current(&self) -> Result<RenderedIndex, StoreError> {
        let snapshot = self.load()?;
        Ok(self.builder.render(&snapshot.state)?)
    }

    fn write(
        &self,
        expected: Option<&Revision>,
        state: &PackageIndexState,
        message: &str,
    ) -> Result<Revision, StoreError> {
        let rendered = self.builder.render(state)?;
        // Package document first: if only one lands, the next run re-derives
        // the history from it and repairs the root.
        let files: [Document; 2] = [rendered.package, rendered.root];
        let revision = self
            .backend
            .write(expected, &files, message)
            .map_err(StoreError::from_write)?;
        debug!(revision = %revision, "index written");
        Ok(revision)
    }
}
