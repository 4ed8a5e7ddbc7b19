//! Engine-agnostic workflow model, constraint validation, and audit types
//! for the Clixen generation pipeline.
//!
//! Everything in this crate is free of network I/O. The only async surface
//! is the [`audit::AuditStore`] trait, whose implementations live elsewhere.

pub mod audit;
pub mod error;
pub mod limits;
pub mod requirement;
pub mod spec;
pub mod validation;

pub use error::CoreError;
