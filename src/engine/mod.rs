//! engine
//!
//! Orchestrates a release: Resolve -> Collect -> Publish.
//!
//! # Modules
//!
//! - [`pipeline`] - `ReleasePipeline`, the state machine driving one run
//! - [`retry`] - backoff between attempts after a lost race
//! - [`error`] - `PipelineError`, the failure taxonomy
//!
//! # Invariants
//!
//! - A run starts only from a tag
//! - Only `ConcurrentModification` is retried, and only a bounded number
//!   of times
//! - Nothing is written to the index before every artifact is uploaded

pub mod error;
pub mod pipeline;
pub mod retry;

pub use error::{ErrorKind, PipelineError};
pub use pipeline::{PipelineOutcome, PipelineReport, PipelineState, ReleasePipeline, Trigger};
pub use retry::RetryPolicy;
