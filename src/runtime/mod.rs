//! Runtime support for hosts embedding the planner.
//!
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure

pub mod tracing;

pub use tracing::*;
