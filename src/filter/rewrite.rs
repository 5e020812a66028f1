//! Span-based filter rewriting.
//!
//! Replacement clauses are built here and applied to the original filter in a
//! single pass once every predicate has been processed.

use thiserror::Error;

use super::lexer::Span;

/// Sentinel key that matches no root record.
pub const NO_MATCH_SENTINEL: &str = "__NO_MATCH__";

/// A pending replacement of one clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub span: Span,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("Span {start}..{end} is outside the filter or splits a character")]
    InvalidSpan { start: usize, end: usize },
    #[error("Span {start}..{end} overlaps another substitution")]
    Overlap { start: usize, end: usize },
}

/// Quotes `value` as a double-quoted literal, escaping `\` and `"`.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// `(field="k1" or field="k2" ...)` over `keys` in the given order.
pub fn disjunction(field: &str, keys: &[String]) -> String {
    let clauses: Vec<String> = keys
        .iter()
        .map(|key| format!("{field}={}", quote_literal(key)))
        .collect();
    format!("({})", clauses.join(" or "))
}

/// A clause on `field` that no root record satisfies.
pub fn no_match_clause(field: &str) -> String {
    format!("{field}={}", quote_literal(NO_MATCH_SENTINEL))
}

/// Builds the replacement for a resolved predicate.
pub fn replacement_for(join_field: &str, keys: &[String]) -> String {
    if keys.is_empty() {
        no_match_clause(join_field)
    } else {
        disjunction(join_field, keys)
    }
}

/// Applies all substitutions to `filter`, leaving every other byte untouched.
pub fn apply(filter: &str, mut substitutions: Vec<Substitution>) -> Result<String, RewriteError> {
    substitutions.sort_by_key(|s| s.span.start);

    let mut previous_end = 0;
    for s in &substitutions {
        let Span { start, end } = s.span;
        if start > end || s.span.slice(filter).is_none() {
            return Err(RewriteError::InvalidSpan { start, end });
        }
        if start < previous_end {
            return Err(RewriteError::Overlap { start, end });
        }
        previous_end = end;
    }

    let mut output = filter.to_string();
    for s in substitutions.into_iter().rev() {
        output.replace_range(s.span.start..s.span.end, &s.replacement);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn disjunction_keeps_key_order() {
        assert_eq!(
            disjunction("assetnum", &keys(&["B2", "A1"])),
            r#"(assetnum="B2" or assetnum="A1")"#
        );
        assert_eq!(disjunction("assetnum", &keys(&["A1"])), r#"(assetnum="A1")"#);
    }

    #[test]
    fn empty_keys_produce_sentinel() {
        assert_eq!(replacement_for("assetnum", &[]), r#"assetnum="__NO_MATCH__""#);
    }

    #[test]
    fn literals_escape_quotes_and_backslashes() {
        assert_eq!(quote_literal(r#"6" PIPE"#), r#""6\" PIPE""#);
        assert_eq!(quote_literal(r"C:\tmp"), r#""C:\\tmp""#);
    }

    #[test]
    fn apply_replaces_by_span_in_any_order() {
        let filter = r#"a.x="1" and b.y="2""#;
        let out = apply(
            filter,
            vec![
                Substitution { span: Span::new(12, 19), replacement: "B".into() },
                Substitution { span: Span::new(0, 7), replacement: "A".into() },
            ],
        )
        .unwrap();
        assert_eq!(out, "A and B");
    }

    #[test]
    fn apply_rejects_bad_spans() {
        let bad = vec![Substitution { span: Span::new(3, 40), replacement: String::new() }];
        assert_eq!(apply("abc", bad), Err(RewriteError::InvalidSpan { start: 3, end: 40 }));

        let overlapping = vec![
            Substitution { span: Span::new(0, 2), replacement: String::new() },
            Substitution { span: Span::new(1, 3), replacement: String::new() },
        ];
        assert_eq!(apply("abc", overlapping), Err(RewriteError::Overlap { start: 1, end: 3 }));
    }
}
