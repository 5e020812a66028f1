//! Prefetch of join keys from related resources.

pub mod error;
pub mod resolver;

pub use error::*;
pub use resolver::*;
