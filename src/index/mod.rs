//! index
//!
//! The static simple index: the in-memory history model, its rendering to
//! documents, and parsing of documents back into the model.
//!
//! # Modules
//!
//! - [`state`] - `PackageIndexState`, the merged release history
//! - [`render`] - `IndexDocumentBuilder`, pure state -> documents
//! - [`parse`] - documents -> state
//!
//! # Invariants
//!
//! - `parse(render(state)) == state` for any state this crate produces
//! - Rendering the same state twice is byte-identical

pub mod parse;
pub mod render;
pub mod state;

pub use parse::{parse_index, ParseError};
pub use render::{Document, IndexDocumentBuilder, RenderError, RenderedIndex};
pub use state::{MergeOutcome, PackageIndexState};
