//! core
//!
//! Core domain types and pure operations for simplepub.
//!
//! # Modules
//!
//! - [`types`] - Strong types: PackageName, Platform, BranchName, Oid, RefName
//! - [`version`] - Tag to distribution version resolution
//! - [`platform`] - Required platform set and wheel platform detection
//! - [`artifact`] - Build outputs, artifact sets and releases
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here performs I/O except config loading

pub mod artifact;
pub mod config;
pub mod platform;
pub mod types;
pub mod version;
