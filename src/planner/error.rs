//! Planner-level errors.

use thiserror::Error;

use crate::filter::{LexError, RewriteError};

/// Errors that stop a planning call as a whole.
///
/// [`Planner::plan`](super::Planner::plan) never returns these; they are recorded
/// in the plan and the filter is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("Filter could not be tokenized: {0}")]
    Lex(#[from] LexError),

    #[error("Filter could not be rewritten: {0}")]
    Rewrite(#[from] RewriteError),
}
