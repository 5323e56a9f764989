//! host::mock
//!
//! Mock release host for deterministic testing.
//!
//! # Design
//!
//! Uploads are recorded in memory and answered with
//! `<base_url>/<tag>/<filename>`. The same filename uploaded twice under
//! one tag is a no-op, matching the idempotence real hosts provide. Failures
//! can be configured per call.
//!
//! # Example
//!
//! ```
//! use simplepub::host::mock::MockReleaseHost;
//!
//! let host = MockReleaseHost::new("https://downloads.example.com");
//! assert!(host.uploads().is_empty());
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::traits::{HostError, ReleaseHost};
use crate::core::artifact::{Artifact, ArtifactSet};

/// Mock release host for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockReleaseHost {
    inner: Arc<Mutex<MockHostInner>>,
}

#[derive(Debug)]
struct MockHostInner {
    base_url: String,
    /// (tag, filename) -> url
    uploads: BTreeMap<(String, String), String>,
    fail_on: Option<FailOn>,
    operations: Vec<HostOperation>,
}

/// Configuration for which call should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Every upload fails with the given error.
    Upload(HostError),
    /// Only the next upload fails with the given error.
    NextUpload(HostError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOperation {
    Upload { tag: String, filenames: Vec<String> },
}

impl MockReleaseHost {
    /// Create a host whose URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockHostInner {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                uploads: BTreeMap::new(),
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Configure the mock to fail.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Every stored upload as `(tag, filename)`.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.lock().uploads.keys().cloned().collect()
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<HostOperation> {
        self.lock().operations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockHostInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ReleaseHost for MockReleaseHost {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn upload(&self, set: &ArtifactSet) -> Result<Vec<Artifact>, HostError> {
        let mut inner = self.lock();
        let tag = set.version().tag();
        inner.operations.push(HostOperation::Upload {
            tag: tag.clone(),
            filenames: set.outputs().iter().map(|o| o.filename.clone()).collect(),
        });

        match inner.fail_on.clone() {
            Some(FailOn::Upload(err)) => return Err(err),
            Some(FailOn::NextUpload(err)) => {
                inner.fail_on = None;
                return Err(err);
            }
            None => {}
        }

        let base_url = inner.base_url.clone();
        let artifacts = set
            .outputs()
            .iter()
            .map(|output| {
                let url = inner
                    .uploads
                    .entry((tag.clone(), output.filename.clone()))
                    .or_insert_with(|| format!("{base_url}/{tag}/{}", output.filename))
                    .clone();
                Artifact {
                    platform: output.platform.clone(),
                    filename: output.filename.clone(),
                    url,
                }
            })
            .collect();
        Ok(artifacts)
    }
}
