//! Relationship configuration.
//!
//! - [`RelationshipEntry`] - raw entry as declared by a configuration layer
//! - [`RelationshipConfig`] - validated entry used by the planner
//! - [`ConfigStore`] - loads and merges the built-in, defaults and tenant layers

pub mod entry;
pub mod error;
pub mod store;

pub use entry::*;
pub use error::*;
pub use store::*;
