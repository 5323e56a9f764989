//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! The tool runs unattended in CI, so there are no prompts. All printing of
//! command results goes through this module so `--quiet` is honored in one
//! place.

pub mod output;
