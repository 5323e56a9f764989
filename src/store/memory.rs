//! store::memory
//!
//! In-memory backend for deterministic testing.
//!
//! # Design
//!
//! Files live in a map behind a counter revision. Clones share state, so a
//! test can hold one handle while the store under test owns another, and
//! can stage failures or a competing writer between steps.
//!
//! # Example
//!
//! ```
//! use simplepub::index::Document;
//! use simplepub::store::backend::IndexBackend;
//! use simplepub::store::memory::MemoryBackend;
//!
//! let backend = MemoryBackend::new();
//! let doc = Document { path: "simple/index.html".into(), body: "<html/>".into() };
//! let rev = backend.write(None, &[doc], "first").unwrap();
//!
//! // A second writer that read before `rev` loses.
//! assert!(backend.write(None, &[], "stale").is_err());
//! assert_eq!(backend.read(&["simple/index.html".into()]).unwrap().revision, Some(rev));
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::backend::{BackendError, IndexBackend, Revision, Snapshot};
use crate::index::Document;

/// In-memory backend for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    files: BTreeMap<String, String>,
    /// Number of successful writes; 0 means never written.
    generation: u64,
    fail_on: Option<FailOn>,
    /// Writes applied by a simulated competing publisher just before the
    /// next `write` call.
    concurrent: Vec<Vec<Document>>,
    operations: Vec<BackendOperation>,
}

/// Which operation should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOn {
    /// Every read fails with a transport error.
    Read,
    /// Every write fails with a transport error and changes nothing.
    Write,
    /// The next write lands only its first file, then fails.
    PartialWrite,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOperation {
    Read { paths: Vec<String> },
    Write { expected: Option<String>, paths: Vec<String>, message: String },
    ConcurrentWrite { paths: Vec<String> },
}

impl MemoryBackend {
    /// Create an empty, never-written backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend already holding `files` at revision `mem-1`.
    pub fn with_files(files: impl IntoIterator<Item = (String, String)>) -> Self {
        let backend = Self::new();
        {
            let mut inner = backend.lock();
            inner.files = files.into_iter().collect();
            inner.generation = 1;
        }
        backend
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.set_fail_on(Some(fail_on));
        self
    }

    /// Change or clear the failure configuration.
    pub fn set_fail_on(&self, fail_on: Option<FailOn>) {
        self.lock().fail_on = fail_on;
    }

    /// Have another publisher write `files` right before the next write,
    /// making that write's expected revision stale.
    pub fn inject_concurrent_write(&self, files: Vec<Document>) {
        self.lock().concurrent.push(files);
    }

    /// Current file contents.
    pub fn files(&self) -> BTreeMap<String, String> {
        self.lock().files.clone()
    }

    /// Current revision.
    pub fn revision(&self) -> Option<Revision> {
        Self::revision_of(self.lock().generation)
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<BackendOperation> {
        self.lock().operations.clone()
    }

    /// Lock the shared state, ignoring poisoning.
    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of write attempts, successful or not.
    pub fn write_attempts(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, BackendOperation::Write { .. }))
            .count()
    }

    fn revision_of(generation: u64) -> Option<Revision> {
        (generation > 0).then(|| Revision::new(format!("mem-{generation}")))
    }

    fn apply(inner: &mut MemoryInner, files: &[Document]) {
        for doc in files {
            inner.files.insert(doc.path.clone(), doc.body.clone());
        }
        inner.generation += 1;
    }
}

impl IndexBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn read(&self, paths: &[String]) -> Result<Snapshot, BackendError> {
        let mut inner = self.lock();
        inner.operations.push(BackendOperation::Read {
            paths: paths.to_vec(),
        });
        if inner.fail_on == Some(FailOn::Read) {
            return Err(BackendError::Transport {
                message: "injected read failure".into(),
            });
        }

        let files = paths
            .iter()
            .filter_map(|p| inner.files.get(p).map(|body| (p.clone(), body.clone())))
            .collect();
        Ok(Snapshot {
            revision: Self::revision_of(inner.generation),
            files,
        })
    }

    fn write(
        &self,
        expected: Option<&Revision>,
        files: &[Document],
        message: &str,
    ) -> Result<Revision, BackendError> {
        let mut inner = self.lock();
        inner.operations.push(BackendOperation::Write {
            expected: expected.map(|r| r.to_string()),
            paths: files.iter().map(|d| d.path.clone()).collect(),
            message: message.to_string(),
        });

        if !inner.concurrent.is_empty() {
            let competing = inner.concurrent.remove(0);
            inner.operations.push(BackendOperation::ConcurrentWrite {
                paths: competing.iter().map(|d| d.path.clone()).collect(),
            });
            Self::apply(&mut inner, &competing);
        }

        let fail_on = inner.fail_on.clone();
        match fail_on {
            Some(FailOn::Write) => {
                return Err(BackendError::Transport {
                    message: "injected write failure".into(),
                })
            }
            Some(FailOn::PartialWrite) => {
                inner.fail_on = None;
                let first: Vec<Document> = files.iter().take(1).cloned().collect();
                Self::apply(&mut inner, &first);
                return Err(BackendError::Transport {
                    message: "injected partial write".into(),
                });
            }
            _ => {}
        }

        let current = Self::revision_of(inner.generation);
        if current.as_ref() != expected {
            return Err(BackendError::Conflict {
                expected: expected.map_or_else(|| "<none>".to_string(), |r| r.to_string()),
                actual: current.map_or_else(|| "<none>".to_string(), |r| r.to_string()),
            });
        }

        Self::apply(&mut inner, files);
        Self::revision_of(inner.generation).ok_or_else(|| BackendError::Internal {
            message: "revision missing after write".into(),
        })
    }
}
