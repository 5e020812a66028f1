//! Detection of dotted-relation comparisons (`relation.field <op> "literal"`).

use std::fmt;

use serde::Serialize;

use super::lexer::{tokenize, LexError, QuoteStyle, Span, Symbol, Token, TokenKind};

/// Operators accepted in a dotted-relation predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PredicateOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "like")]
    Like,
}

impl PredicateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateOp::Eq => "=",
            PredicateOp::Ne => "!=",
            PredicateOp::Like => "like",
        }
    }

    fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Symbol(Symbol::Eq) => Some(PredicateOp::Eq),
            TokenKind::Symbol(Symbol::Ne) => Some(PredicateOp::Ne),
            TokenKind::Ident(word) if word.eq_ignore_ascii_case("like") => Some(PredicateOp::Like),
            _ => None,
        }
    }
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comparison against a related resource's field, e.g. `asset.assettype="SENSOR"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub relation: String,
    pub field: String,
    pub operator: PredicateOp,
    /// Literal value with quotes removed and escapes resolved.
    pub value: String,
    pub quote: QuoteStyle,
    /// Span of the whole clause, from the relation name to the closing quote.
    pub span: Span,
}

impl Predicate {
    /// Whether `other` compares the same relation field against the same literal.
    pub fn same_clause(&self, other: &Predicate) -> bool {
        self.relation.eq_ignore_ascii_case(&other.relation)
            && self.field.eq_ignore_ascii_case(&other.field)
            && self.operator == other.operator
            && self.value == other.value
    }
}

/// Tokenizes `filter` and returns its dotted-relation predicates in source order.
pub fn detect_predicates(filter: &str) -> Result<Vec<Predicate>, LexError> {
    Ok(detect(&tokenize(filter)?))
}

/// Finds every `ident . ident op string` sequence in the token stream.
///
/// Paths longer than two segments (`a.b.c`) are not matched.
pub fn detect(tokens: &[Token]) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    let mut i = 0;
    while i + 5 <= tokens.len() {
        let preceded_by_dot = i > 0 && tokens[i - 1].kind == TokenKind::Dot;
        match (preceded_by_dot, match_at(&tokens[i..i + 5])) {
            (false, Some(predicate)) => {
                predicates.push(predicate);
                i += 5;
            }
            _ => i += 1,
        }
    }
    predicates
}

fn match_at(window: &[Token]) -> Option<Predicate> {
    let [relation, dot, field, op, literal] = window else {
        return None;
    };
    let TokenKind::Ident(relation_name) = &relation.kind else {
        return None;
    };
    if dot.kind != TokenKind::Dot {
        return None;
    }
    let TokenKind::Ident(field_name) = &field.kind else {
        return None;
    };
    let operator = PredicateOp::from_token(&op.kind)?;
    let TokenKind::Str { value, quote } = &literal.kind else {
        return None;
    };

    Some(Predicate {
        relation: relation_name.clone(),
        field: field_name.clone(),
        operator,
        value: value.clone(),
        quote: *quote,
        span: Span::new(relation.span.start, literal.span.end),
    })
}
