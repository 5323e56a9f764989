//! store
//!
//! Durable persistence of the index documents.
//!
//! # Modules
//!
//! - [`backend`] - `IndexBackend`, the revisioned compare-and-swap file store
//! - [`git_backend`] - documents committed to a Git branch
//! - [`memory`] - in-memory backend for tests
//! - [`index_store`] - `IndexStore`, the read-merge-write publish cycle
//!
//! # Invariants
//!
//! - Every write names the revision it was derived from; a stale revision
//!   writes nothing.
//! - Readers see the documents of one revision, never a mix.

pub mod backend;
pub mod git_backend;
pub mod index_store;
pub mod memory;

pub use backend::{BackendError, IndexBackend, Revision, Snapshot};
pub use git_backend::GitBackend;
pub use index_store::{IndexSnapshot, IndexStore, PublishResult, StoreError};
pub use memory::MemoryBackend;
