//! host::traits
//!
//! The release host seam.
//!
//! # Contract
//!
//! `upload` publishes every output of an [`ArtifactSet`] under the set's
//! release tag and returns one [`Artifact`] per output with its public
//! download URL. It must be idempotent per filename: an output that is
//! already present with the same content is not uploaded again, while an
//! existing name with different content fails with
//! [`HostError::AssetConflict`].

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::artifact::{Artifact, ArtifactSet};

/// Errors from release host operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// No token is available.
    #[error("authentication required: set {env}")]
    AuthRequired { env: String },

    /// The token was rejected or lacks permission.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    #[error("network error: {0}")]
    NetworkError(String),

    /// A request did not finish within the configured bound.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// An asset with this name exists with different content.
    #[error("asset '{name}' already exists with different content")]
    AssetConflict { name: String },

    /// A build output could not be read.
    #[error("cannot read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

/// Uploads artifacts and hands back stable public URLs.
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// Host name for logs.
    fn name(&self) -> &'static str;

    /// Upload `set` under its release tag.
    async fn upload(&self, set: &ArtifactSet) -> Result<Vec<Artifact>, HostError>;
}
