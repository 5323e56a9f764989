//! simplepub - publish tagged releases of a forked Python package to a static
//! PEP 503 simple index.
//!
//! A run turns a release tag into a local distribution version
//! (`v0.24.0` -> `0.24.0+doppel`), checks the built wheels against the
//! required platforms, uploads them to a release host, and appends their
//! links to the index documents on a Git branch.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, wires collaborators)
//! - [`engine`] - The release pipeline state machine and its retry policy
//! - [`core`] - Domain types, versions, artifacts, platforms, configuration
//! - [`index`] - Rendering and parsing of the index documents
//! - [`store`] - Compare-and-swap persistence of the documents
//! - [`git`] - Single interface for all Git operations
//! - [`host`] - Release hosts (GitHub Releases)
//! - [`build`] - Discovery of build outputs
//! - [`logging`] - `tracing` subscriber setup
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! 1. A tag always resolves to the same distribution version
//! 2. A published version is never rewritten with different artifacts
//! 3. Concurrent publishers never silently overwrite each other
//! 4. Readers see the index before or after a publish, never halfway

pub mod build;
pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod host;
pub mod index;
pub mod logging;
pub mod store;
pub mod ui;
