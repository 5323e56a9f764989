//! engine::error
//!
//! The pipeline's error taxonomy. Layer errors are folded into these
//! variants so the caller can tell operator errors (bad tag, conflicting
//! republish) from collaborator failures.

use std::fmt;

use thiserror::Error;

use crate::build::BuildError;
use crate::core::artifact::ArtifactError;
use crate::core::config::ConfigError;
use crate::core::types::Platform;
use crate::core::version::VersionError;
use crate::host::HostError;
use crate::index::RenderError;
use crate::store::StoreError;

/// Why a pipeline run failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidTagFormat(VersionError),

    #[error("missing artifacts for required platforms: {}", format_platforms(.missing))]
    IncompletePlatformSet { missing: Vec<Platform> },

    #[error("artifact '{filename}' does not match naming convention: {reason}")]
    ArtifactNamingMismatch { filename: String, reason: String },

    #[error("cannot read index: {message}")]
    IndexReadError { message: String },

    #[error(transparent)]
    EncodingError(RenderError),

    #[error("version {version} is already published with different artifacts; push a new tag")]
    VersionConflict { version: String },

    #[error("index kept changing concurrently; gave up after {attempts} attempts")]
    ConcurrentModification { attempts: u32 },

    #[error("not triggered by a tag (event: {event})")]
    UntriggeredByTag { event: String },

    #[error("release host failed: {0}")]
    Host(#[from] HostError),

    /// The host answered with a different set of files than was uploaded.
    #[error("release host returned unexpected artifacts: {reason}")]
    UploadMismatch { reason: String },

    #[error("build outputs unavailable: {0}")]
    Build(#[from] BuildError),

    #[error("cannot write index: {message}")]
    Store { message: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// The variant of a [`PipelineError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidTagFormat,
    IncompletePlatformSet,
    ArtifactNamingMismatch,
    IndexReadError,
    EncodingError,
    VersionConflict,
    ConcurrentModification,
    UntriggeredByTag,
    Host,
    UploadMismatch,
    Build,
    Store,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidTagFormat(_) => ErrorKind::InvalidTagFormat,
            PipelineError::IncompletePlatformSet { .. } => ErrorKind::IncompletePlatformSet,
            PipelineError::ArtifactNamingMismatch { .. } => ErrorKind::ArtifactNamingMismatch,
            PipelineError::IndexReadError { .. } => ErrorKind::IndexReadError,
            PipelineError::EncodingError(_) => ErrorKind::EncodingError,
            PipelineError::VersionConflict { .. } => ErrorKind::VersionConflict,
            PipelineError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            PipelineError::UntriggeredByTag { .. } => ErrorKind::UntriggeredByTag,
            PipelineError::Host(_) => ErrorKind::Host,
            PipelineError::UploadMismatch { .. } => ErrorKind::UploadMismatch,
            PipelineError::Build(_) => ErrorKind::Build,
            PipelineError::Store { .. } => ErrorKind::Store,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }

    /// Only a lost compare-and-swap race is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ConcurrentModification { .. })
    }

    /// Errors that need a new tag rather than a re-run.
    pub fn is_operator_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidTagFormat(_)
                | PipelineError::VersionConflict { .. }
                | PipelineError::ArtifactNamingMismatch { .. }
        )
    }
}

impl From<ArtifactError> for PipelineError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::IncompletePlatformSet { missing } => {
                PipelineError::IncompletePlatformSet { missing }
            }
            ArtifactError::ArtifactNamingMismatch { filename, reason } => {
                PipelineError::ArtifactNamingMismatch { filename, reason }
            }
            ArtifactError::UploadMismatch { reason } => PipelineError::UploadMismatch { reason },
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IndexReadError { message } => PipelineError::IndexReadError { message },
            StoreError::EncodingError(e) => PipelineError::EncodingError(e),
            StoreError::VersionConflict { version } => PipelineError::VersionConflict { version },
            // A single lost race; the run loop counts attempts.
            StoreError::ConcurrentModification { .. } => {
                PipelineError::ConcurrentModification { attempts: 1 }
            }
            StoreError::WriteFailed { message } => PipelineError::Store { message },
        }
    }
}

fn format_platforms(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_concurrent_modification_is_retryable() {
        let retryable: PipelineError = StoreError::ConcurrentModification {
            expected: "a".into(),
            actual: "b".into(),
        }
        .into();
        assert!(retryable.is_retryable());

        for err in [
            PipelineError::VersionConflict { version: "1.0.0+doppel".into() },
            PipelineError::IndexReadError { message: "timeout".into() },
            PipelineError::UntriggeredByTag { event: "push".into() },
            PipelineError::Host(HostError::RateLimited),
        ] {
            assert!(!err.is_retryable(), "{err} should not be retried");
        }
    }

    #[test]
    fn artifact_errors_keep_their_category() {
        let err: PipelineError = ArtifactError::IncompletePlatformSet {
            missing: vec![Platform::new("macos-arm64").unwrap()],
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::IncompletePlatformSet);
        assert!(err.to_string().contains("macos-arm64"));
    }

    #[test]
    fn operator_errors() {
        assert!(PipelineError::VersionConflict { version: "x".into() }.is_operator_error());
        assert!(!PipelineError::ConcurrentModification { attempts: 3 }.is_operator_error());
    }
}
