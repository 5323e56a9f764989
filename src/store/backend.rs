//! store::backend
//!
//! The durable-store seam: a set of text files behind a revision, updated
//! with compare-and-swap on that revision.
//!
//! # Contract
//!
//! - `read` returns the current revision together with the requested files,
//!   from one consistent snapshot.
//! - `write` replaces the given files and leaves all others alone, as one
//!   atomic unit, but only if the store is still at `expected`. A store that
//!   has never been written is at revision `None`.
//! - A stale `expected` fails with [`BackendError::Conflict`] and writes
//!   nothing.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::git::GitError;
use crate::index::Document;

/// Opaque store revision (a commit id for git, a counter for memory).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Files read at one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// `None` when the store has never been written
    pub revision: Option<Revision>,
    /// Requested files that exist, by path
    pub files: BTreeMap<String, String>,
}

/// Errors from a storage backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The store moved since `expected` was read.
    #[error("store changed concurrently: expected {expected}, found {actual}")]
    Conflict { expected: String, actual: String },

    /// The store could not be reached.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// A bounded operation did not finish in time.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Stored content is unreadable.
    #[error("corrupt store content: {message}")]
    Corrupt { message: String },

    /// Local failure not caused by the remote.
    #[error("storage error: {message}")]
    Internal { message: String },
}

impl From<GitError> for BackendError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::CasFailed {
                expected, actual, ..
            } => BackendError::Conflict { expected, actual },
            GitError::Timeout { operation, secs } => BackendError::Timeout {
                operation: format!("git {operation}"),
                secs,
            },
            other @ GitError::CommandFailed { .. } => BackendError::Transport {
                message: other.to_string(),
            },
            other @ GitError::InvalidUtf8 { .. } => BackendError::Corrupt {
                message: other.to_string(),
            },
            other => BackendError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// A revisioned file store with compare-and-swap writes.
pub trait IndexBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Read `paths` at the current revision.
    fn read(&self, paths: &[String]) -> Result<Snapshot, BackendError>;

    /// Atomically replace `files` if the store is still at `expected`.
    ///
    /// Returns the new revision.
    fn write(
        &self,
        expected: Option<&Revision>,
        files: &[Document],
        message: &str,
    ) -> Result<Revision, BackendError>;
}
