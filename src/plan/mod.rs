//! # Plan
//!
//! A [`Plan`] is the trace of one planning call: which predicates were detected,
//! which prefetch queries went out, what they returned, which clauses were
//! rewritten and what failed. It serializes to JSON so hosts can attach it to
//! response metadata as-is.
//!
//! ```json
//! {
//!   "mode": "prefetch",
//!   "rootResource": "mxapiwo",
//!   "detected": [{ "relation": "asset", "field": "assettype", "operator": "=", "value": "SENSOR", ... }],
//!   "steps": [
//!     { "type": "prefetch", "relation": "asset", "relatedResource": "mxapiasset", ... },
//!     { "type": "prefetch_result", "relation": "asset", "returned": 2, "used": 2, "truncated": false },
//!     { "type": "rewrite", "relation": "asset", "from": "asset.assettype=\"SENSOR\"", "to": "(assetnum=\"A100\" or assetnum=\"A101\")", ... }
//!   ],
//!   "truncated": false,
//!   "errors": []
//! }
//! ```

pub mod recorder;

pub use recorder::*;

use serde::Serialize;

use crate::filter::{Predicate, PredicateOp};

/// Overall outcome of a planning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Nothing was prefetched; the filter is unchanged.
    None,
    /// At least one prefetch ran and nothing failed.
    Prefetch,
    /// At least one error was recorded.
    Error,
}

/// One recorded planner action, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PlanStep {
    /// A prefetch query is about to be sent.
    Prefetch {
        relation: String,
        field: String,
        operator: PredicateOp,
        related_resource: String,
        where_clause: String,
        select: String,
        page_size: usize,
        site_scoped: bool,
    },
    /// Keys returned by the related resource vs. keys used after truncation.
    PrefetchResult {
        relation: String,
        field: String,
        returned: usize,
        used: usize,
        truncated: bool,
    },
    /// A clause was substituted.
    Rewrite {
        relation: String,
        field: String,
        from: String,
        to: String,
        occurrences: usize,
    },
    /// Resolution of a predicate failed; its clause was left as written.
    Error {
        relation: String,
        field: String,
        message: String,
    },
}

/// An error recorded during planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanError {
    /// Relation the error belongs to, absent for planner-level errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    pub message: String,
}

/// Immutable trace of a planning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    mode: PlanMode,
    root_resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    detected: Vec<Predicate>,
    steps: Vec<PlanStep>,
    truncated: bool,
    errors: Vec<PlanError>,
}

impl Plan {
    pub fn mode(&self) -> PlanMode {
        self.mode
    }

    pub fn root_resource(&self) -> &str {
        &self.root_resource
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Every dotted-relation predicate found in the filter, configured or not.
    pub fn detected(&self) -> &[Predicate] {
        &self.detected
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Whether any relation returned more keys than its `maxKeys`.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn errors(&self) -> &[PlanError] {
        &self.errors
    }

    /// JSON form for response metadata.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
