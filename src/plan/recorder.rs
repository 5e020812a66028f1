//! Accumulator that builds a [`Plan`] step by step.

use super::{Plan, PlanError, PlanMode, PlanStep};
use crate::filter::Predicate;
use crate::prefetch::{PrefetchQuery, ResolvedKeys};

/// Appends plan entries in call order. Has no side effects beyond itself.
#[derive(Debug)]
pub struct PlanRecorder {
    root_resource: String,
    correlation_id: Option<String>,
    detected: Vec<Predicate>,
    steps: Vec<PlanStep>,
    truncated: bool,
    errors: Vec<PlanError>,
}

impl PlanRecorder {
    pub fn new(root_resource: impl Into<String>, correlation_id: Option<&str>) -> Self {
        Self {
            root_resource: root_resource.into(),
            correlation_id: correlation_id.map(str::to_string),
            detected: Vec::new(),
            steps: Vec::new(),
            truncated: false,
            errors: Vec::new(),
        }
    }

    pub fn detected(&mut self, predicates: &[Predicate]) {
        self.detected.extend_from_slice(predicates);
    }

    pub fn prefetch(&mut self, predicate: &Predicate, query: &PrefetchQuery) {
        self.steps.push(PlanStep::Prefetch {
            relation: predicate.relation.clone(),
            field: predicate.field.clone(),
            operator: predicate.operator,
            related_resource: query.related_resource.clone(),
            where_clause: query.where_clause.clone(),
            select: query.select.clone(),
            page_size: query.page_size,
            site_scoped: query.site_scoped,
        });
    }

    pub fn prefetch_result(&mut self, predicate: &Predicate, resolved: &ResolvedKeys) {
        self.truncated |= resolved.truncated;
        self.steps.push(PlanStep::PrefetchResult {
            relation: predicate.relation.clone(),
            field: predicate.field.clone(),
            returned: resolved.returned,
            used: resolved.keys.len(),
            truncated: resolved.truncated,
        });
    }

    pub fn rewrite(&mut self, predicate: &Predicate, from: &str, to: &str, occurrences: usize) {
        self.steps.push(PlanStep::Rewrite {
            relation: predicate.relation.clone(),
            field: predicate.field.clone(),
            from: from.to_string(),
            to: to.to_string(),
            occurrences,
        });
    }

    /// Records a failed resolution both as a step and in the error list.
    pub fn error(&mut self, predicate: &Predicate, message: impl Into<String>) {
        let message = message.into();
        self.steps.push(PlanStep::Error {
            relation: predicate.relation.clone(),
            field: predicate.field.clone(),
            message: message.clone(),
        });
        self.errors.push(PlanError {
            relation: Some(predicate.relation.clone()),
            message,
        });
    }

    /// Records an error that stopped planning as a whole.
    pub fn planner_error(&mut self, message: impl Into<String>) {
        self.errors.push(PlanError {
            relation: None,
            message: message.into(),
        });
    }

    /// Freezes the recorded entries into a [`Plan`].
    pub fn finish(self) -> Plan {
        let prefetched = self.steps.iter().any(|s| matches!(s, PlanStep::Prefetch { .. }));
        let mode = if !self.errors.is_empty() {
            PlanMode::Error
        } else if prefetched {
            PlanMode::Prefetch
        } else {
            PlanMode::None
        };

        Plan {
            mode,
            root_resource: self.root_resource,
            correlation_id: self.correlation_id,
            detected: self.detected,
            steps: self.steps,
            truncated: self.truncated,
            errors: self.errors,
        }
    }
}
