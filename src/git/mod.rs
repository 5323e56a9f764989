//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. No other module imports
//! `git2` or spawns `git`. Object and ref access goes through [`Git`]
//! (git2); network synchronization of the index branch goes through
//! [`Transport`] (the system `git` binary, bounded by a timeout).
//!
//! # Responsibilities
//!
//! - Repository discovery and opening (bare or not)
//! - Reading files from a commit's tree
//! - Building commits from a parent tree plus replaced files
//! - Ref CAS updates
//! - Fetch and leased push of a single branch
//! - Remote URL parsing
//!
//! # Invariants
//!
//! - Branch updates use CAS (compare-and-swap) semantics, locally and remotely
//! - All operations return strong types (Oid, BranchName, RefName)
//!
//! # Example
//!
//! ```ignore
//! use simplepub::git::{Git, TreeFile};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let tip = git.try_resolve_ref("refs/heads/gh-pages")?;
//! let commit = git.commit_files(tip.as_ref(), &files, "publish", None)?;
//!
//! // CAS update (fails if the branch moved since `tip` was read)
//! git.update_ref_cas("refs/heads/gh-pages", &commit, tip.as_ref(), "simplepub: publish")?;
//! ```

mod interface;
mod transport;

pub use interface::{Git, GitError, TreeFile};
pub use transport::Transport;
