//! Pipeline orchestration: the retry/recovery controller and the single
//! caller-facing entry point [`runner::run_pipeline`].
//!
//! Callers never manipulate specifications or validation results directly;
//! they hand in an utterance plus owner context and get back either a
//! deployment or an ordered account of what was tried and why it failed.

pub mod error;
pub mod retry;
pub mod runner;
pub mod source;

pub use error::PipelineError;
pub use retry::{generate_validated, GenerateOutcome, RetryPolicy};
pub use runner::{run_pipeline, run_pipeline_detached, PipelineDeps, PipelineOutcome};
pub use source::{BuilderSource, SpecSource};
