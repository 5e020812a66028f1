//! # Relationship Prefetch Planner
//!
//! Entry point of the crate. [`Planner::plan`] takes the query parameters of a
//! request against a root resource, finds `relation.field <op> "literal"` clauses
//! in its `where` parameter, resolves each one against the related resource and
//! rewrites the filter into clauses the backend understands.
//!
//! ## Flow
//!
//! ```text
//! where? ──no──▶ mode=none
//!   │
//! detect ──no predicates──▶ mode=none
//!   │
//! load relationships (built-in ▸ defaults ▸ tenant)
//!   │
//! for each distinct predicate, in source order:
//!   config? ──no──▶ leave clause as written
//!   prefetch ──error──▶ record error, leave clause as written
//!   rewrite every occurrence: (join="k1" or ...) | join="__NO_MATCH__"
//!   │
//! write `where` once ──▶ mode=prefetch | error
//! ```
//!
//! Predicates are resolved one after another; each prefetch completes before the
//! next one starts. The parameter bag is written at most once, at the end.
//!
//! ## Failure Model
//!
//! [`Planner::plan`] always returns a [`PlanOutcome`]. Per-predicate failures are
//! recorded as `error` steps; a filter that cannot be tokenized is recorded as a
//! planner-level error. In both cases the primary query can still proceed.

pub mod error;

pub use error::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::ConfigStore;
use crate::filter::rewrite::{self, Substitution};
use crate::filter::{detect_predicates, Predicate, Span};
use crate::plan::{Plan, PlanRecorder};
use crate::prefetch::{PrefetchQuery, PrefetchResolver, RequestContext};
use crate::transport::{AuthProvider, BaseUrlProvider, Transport};

/// Name of the filter parameter in the query-parameter bag.
pub const WHERE_PARAM: &str = "where";

/// Query parameters of the primary request.
pub type QueryParams = BTreeMap<String, String>;

/// Input of one planning call.
#[derive(Debug)]
pub struct PlanRequest<'a> {
    pub tenant_id: &'a str,
    /// Opaque host context forwarded to the transport in request metadata.
    pub transport_context: Option<Value>,
    pub root_resource: &'a str,
    /// Parameter bag; only `where` is ever written.
    pub params: &'a mut QueryParams,
    /// Site used to scope prefetch queries of site-aware relations.
    pub default_site: Option<&'a str>,
    pub correlation_id: Option<&'a str>,
}

impl<'a> PlanRequest<'a> {
    pub fn new(tenant_id: &'a str, root_resource: &'a str, params: &'a mut QueryParams) -> Self {
        Self {
            tenant_id,
            transport_context: None,
            root_resource,
            params,
            default_site: None,
            correlation_id: None,
        }
    }

    pub fn with_default_site(mut self, site: &'a str) -> Self {
        self.default_site = Some(site);
        self
    }

    pub fn with_correlation_id(mut self, id: &'a str) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn with_transport_context(mut self, context: Value) -> Self {
        self.transport_context = Some(context);
        self
    }
}

/// Result of a planning call.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
}

/// Values shared by every predicate of one call.
struct CallContext<'a> {
    tenant_id: &'a str,
    root_resource: &'a str,
    default_site: Option<&'a str>,
    correlation_id: Option<&'a str>,
    transport_context: Option<&'a Value>,
}

/// Identical predicates and every place they occur.
struct PredicateGroup<'p> {
    predicate: &'p Predicate,
    spans: Vec<Span>,
}

/// Rewrites relation predicates using the host's transport collaborators.
#[derive(Clone)]
pub struct Planner {
    store: ConfigStore,
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthProvider>,
    base_url: Arc<dyn BaseUrlProvider>,
}

impl Planner {
    pub fn new(
        store: ConfigStore,
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthProvider>,
        base_url: Arc<dyn BaseUrlProvider>,
    ) -> Self {
        Self {
            store,
            transport,
            auth,
            base_url,
        }
    }

    /// Plans and applies the rewrite of `request.params["where"]`.
    #[instrument(
        skip_all,
        fields(tenant = request.tenant_id, root = request.root_resource, correlation_id = request.correlation_id)
    )]
    pub async fn plan(&self, request: PlanRequest<'_>) -> PlanOutcome {
        let PlanRequest {
            tenant_id,
            transport_context,
            root_resource,
            params,
            default_site,
            correlation_id,
        } = request;
        let mut recorder = PlanRecorder::new(root_resource, correlation_id);

        let Some(filter) = params
            .get(WHERE_PARAM)
            .filter(|f| !f.trim().is_empty())
            .cloned()
        else {
            debug!("No where clause");
            return PlanOutcome { plan: recorder.finish() };
        };
        debug!(%filter, "Planning filter");

        let call = CallContext {
            tenant_id,
            root_resource,
            default_site,
            correlation_id,
            transport_context: transport_context.as_ref(),
        };
        match self.rewrite_filter(&call, &filter, &mut recorder).await {
            Ok(rewritten) if rewritten != filter => {
                info!(from = %filter, to = %rewritten, "Filter rewritten");
                params.insert(WHERE_PARAM.to_string(), rewritten);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Planning failed, filter left unchanged");
                recorder.planner_error(e.to_string());
            }
        }

        let plan = recorder.finish();
        info!(mode = ?plan.mode(), steps = plan.steps().len(), truncated = plan.truncated(), "Plan complete");
        PlanOutcome { plan }
    }

    async fn rewrite_filter(
        &self,
        call: &CallContext<'_>,
        filter: &str,
        recorder: &mut PlanRecorder,
    ) -> Result<String, PlannerError> {
        let predicates = detect_predicates(filter)?;
        recorder.detected(&predicates);
        if predicates.is_empty() {
            return Ok(filter.to_string());
        }

        let relationships = self.store.load(call.root_resource, call.tenant_id);
        let resolver = PrefetchResolver::new(self.transport.as_ref(), self.auth.as_ref(), self.base_url.as_ref());
        let mut substitutions = Vec::new();

        for group in group_predicates(&predicates) {
            let predicate = group.predicate;
            let Some(config) = relationships.get(&predicate.relation.to_ascii_lowercase()) else {
                debug!(relation = %predicate.relation, "No relationship configured, leaving clause as written");
                continue;
            };

            let query = PrefetchQuery::build(predicate, config, call.default_site);
            recorder.prefetch(predicate, &query);

            let ctx = RequestContext {
                tenant: call.tenant_id,
                root_resource: call.root_resource,
                relation: &predicate.relation,
                correlation_id: call.correlation_id,
                transport_context: call.transport_context,
            };
            match resolver.resolve(&ctx, &query, config).await {
                Ok(resolved) => {
                    recorder.prefetch_result(predicate, &resolved);
                    let replacement = rewrite::replacement_for(&config.root_join_field, &resolved.keys);
                    let from = predicate.span.slice(filter).unwrap_or_default();
                    recorder.rewrite(predicate, from, &replacement, group.spans.len());
                    substitutions.extend(group.spans.iter().map(|span| Substitution {
                        span: *span,
                        replacement: replacement.clone(),
                    }));
                }
                Err(e) => {
                    warn!(relation = %predicate.relation, error = %e, "Prefetch failed, leaving clause as written");
                    recorder.error(predicate, e.to_string());
                }
            }
        }

        Ok(rewrite::apply(filter, substitutions)?)
    }
}

/// Groups identical predicates, keeping the order of first occurrence.
fn group_predicates(predicates: &[Predicate]) -> Vec<PredicateGroup<'_>> {
    let mut groups: Vec<PredicateGroup<'_>> = Vec::new();
    for predicate in predicates {
        match groups.iter_mut().find(|g| g.predicate.same_clause(predicate)) {
            Some(group) => group.spans.push(predicate.span),
            None => groups.push(PredicateGroup {
                predicate,
                spans: vec![predicate.span],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_duplicates_in_first_occurrence_order() {
        let filter = r#"location.type="A" or asset.assettype="S" or location.type='A'"#;
        let predicates = detect_predicates(filter).unwrap();
        let groups = group_predicates(&predicates);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].predicate.relation, "location");
        assert_eq!(groups[0].spans.len(), 2);
        assert_eq!(groups[1].predicate.relation, "asset");
    }

    #[test]
    fn request_builder_sets_optional_fields() {
        let mut params = QueryParams::new();
        let request = PlanRequest::new("acme", "mxapiwo", &mut params)
            .with_default_site("BEDFORD")
            .with_correlation_id("req-1")
            .with_transport_context(serde_json::json!({"user": "wilson"}));
        assert_eq!(request.default_site, Some("BEDFORD"));
        assert_eq!(request.correlation_id, Some("req-1"));
        assert_eq!(request.transport_context.unwrap()["user"], "wilson");
    }
}
