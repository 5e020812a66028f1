//! # Relation Prefetch
//!
//! > **Join-style filters for backends that cannot join.**
//!
//! Resource query APIs often accept a `where` filter made of plain field
//! comparisons. Callers still write clauses such as `asset.assettype="SENSOR"`
//! against work orders, expecting a join the backend cannot evaluate.
//!
//! This crate closes that gap before the primary query runs. It detects the dotted
//! relation clauses, asks the related resource for the matching keys, and rewrites
//! the filter into a backend-native disjunction:
//!
//! ```text
//! asset.assettype="SENSOR"   ──▶   (assetnum="A100" or assetnum="A101")
//! ```
//!
//! When no related record matches, the clause becomes `assetnum="__NO_MATCH__"`,
//! so the primary query returns nothing instead of an unfiltered set.
//!
//! ## 🏗️ Design Notes
//!
//! ### 1. Tokens and Spans
//! Filters are tokenized once and predicates are detected structurally. Every
//! predicate remembers its byte span, so rewriting is a replacement by offset.
//! Repeated identical clauses are resolved once and all of them are replaced.
//!
//! ### 2. Layered Configuration
//! Relations come from built-in defaults, a shared override file and a
//! tenant-specific override file. A later layer replaces whole entries. Broken
//! files are logged and skipped, never fatal.
//!
//! ### 3. Host-owned Transport
//! The crate does not ship an HTTP client. Hosts implement [`transport::Transport`]
//! and provide auth headers and base URLs; responses arrive either parsed or as a
//! raw text envelope ([`transport::TransportResponse`]).
//!
//! ### 4. Degrade, Never Fail
//! [`Planner::plan`](planner::Planner::plan) has no error return. Failures are
//! recorded in the returned [`Plan`](plan::Plan) and the affected clause is left
//! as the caller wrote it.
//!
//! ### 5. Observability
//! Everything is logged with `tracing`; see [`runtime::tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! - [`planner`]: the entry point, [`Planner`](planner::Planner)
//! - [`config`]: relationship definitions and the [`ConfigStore`](config::ConfigStore)
//! - [`filter`]: lexer, predicate detection and span rewriting
//! - [`prefetch`]: related-resource queries and key extraction
//! - [`plan`]: the [`Plan`](plan::Plan) trace and its recorder
//! - [`transport`]: collaborator traits and the [`MockTransport`](transport::mock::MockTransport)
//! - [`runtime`]: tracing setup
//!
//! ## 🚀 Quick Start
//!
//! ```ignore
//! let planner = Planner::new(ConfigStore::from_env(), transport, Arc::new(auth), Arc::new(base_url));
//!
//! let mut params = QueryParams::from([("where".into(), r#"asset.assettype="SENSOR""#.into())]);
//! let outcome = planner
//!     .plan(PlanRequest::new("acme", "mxapiwo", &mut params).with_default_site("BEDFORD"))
//!     .await;
//!
//! // params["where"] now holds the rewritten filter
//! response_meta.insert("prefetchPlan", outcome.plan.to_json());
//! ```

pub mod config;
pub mod filter;
pub mod plan;
pub mod planner;
pub mod prefetch;
pub mod runtime;
pub mod transport;

pub use planner::{PlanOutcome, PlanRequest, Planner, QueryParams, WHERE_PARAM};
