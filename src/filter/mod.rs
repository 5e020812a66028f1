//! Filter handling: tokenizing, relation detection and rewriting.
//!
//! - [`lexer`] - span-carrying tokens for `where` strings
//! - [`detect`] - finds `relation.field <op> "literal"` clauses
//! - [`rewrite`] - builds replacement clauses and applies them by span

pub mod detect;
pub mod lexer;
pub mod rewrite;

pub use detect::{detect_predicates, Predicate, PredicateOp};
pub use lexer::{LexError, QuoteStyle, Span};
pub use rewrite::{RewriteError, Substitution, NO_MATCH_SENTINEL};
