//! Model inference abstraction plus the two generation components built on
//! it: the intent classifier and the specification builder.
//!
//! All non-determinism sits behind the [`inference::ModelInference`] trait,
//! so tests pin model output and everything downstream stays reproducible.

pub mod builder;
pub mod classifier;
pub mod inference;
pub mod parse;
