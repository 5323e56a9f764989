//! host
//!
//! Release hosts: where artifacts are uploaded and served from.
//!
//! # Modules
//!
//! - `traits`: the `ReleaseHost` trait and `HostError`
//! - [`github`]: GitHub Releases
//! - [`mock`]: in-memory host for deterministic testing
//!
//! Hosts are invoked only after the artifact set has been validated, and
//! only their returned URLs reach the index.

pub mod github;
pub mod mock;
mod traits;

pub use github::GitHubReleaseHost;
pub use traits::*;
