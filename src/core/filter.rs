//! Filter expression builder
//!
//! Serializes [`FilterPredicate`]s into the `$filter` grammar:
//!
//! ```text
//! contains(tolower(title),tolower('case'))
//! status eq APPROVED and verified eq true
//! roles/any(x: x eq 'ADMIN' or x eq 'SELLER')
//! (contains(tolower(title),tolower('a')) or contains(tolower(email),tolower('a'))) and status eq OPEN
//! ```

use crate::core::predicate::{FilterPredicate, Literal, escape_text, normalize_all};

/// Variable name bound by `any(...)` lambdas
pub const LAMBDA_VARIABLE: &str = "x";

/// Serialize a predicate set into a `$filter` expression
///
/// Predicates that constrain nothing are skipped; if none remain the result
/// is an empty string and the caller should omit the clause entirely.
pub fn build(predicates: &[FilterPredicate]) -> String {
    normalize_all(predicates)
        .iter()
        .map(|p| serialize(p, true))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn serialize(predicate: &FilterPredicate, top_level: bool) -> String {
    match predicate {
        FilterPredicate::Contains {
            field,
            value,
            case_insensitive: true,
        } => format!(
            "contains(tolower({}),tolower('{}'))",
            field,
            escape_text(value)
        ),
        FilterPredicate::Contains { field, value, .. } => {
            format!("contains({},'{}')", field, escape_text(value))
        }
        FilterPredicate::Equals { field, value } => format!("{} eq {}", field, value.to_wire()),
        FilterPredicate::InSet { field, values } => {
            format!("{}/any({}: {})", field, LAMBDA_VARIABLE, lambda_body(values))
        }
        FilterPredicate::AnyOf(members) => {
            let body = members
                .iter()
                .map(|p| serialize(p, false))
                .collect::<Vec<_>>()
                .join(" or ");
            if top_level {
                format!("({})", body)
            } else {
                // Nested groups flatten into the enclosing OR
                body
            }
        }
    }
}

fn lambda_body(values: &[Literal]) -> String {
    values
        .iter()
        .map(|v| format!("{} eq {}", LAMBDA_VARIABLE, v.to_wire()))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Fluent builder over [`build`]
///
/// # Example
/// ```rust,ignore
/// let expr = FilterExpressionBuilder::new()
///     .search(&term, ["title", "content", "email"])
///     .equals("status", Literal::enumeration("OPEN"))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterExpressionBuilder {
    predicates: Vec<FilterPredicate>,
}

impl FilterExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicate(mut self, predicate: FilterPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn contains(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicate(FilterPredicate::contains(field, value))
    }

    pub fn equals(self, field: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.predicate(FilterPredicate::equals(field, value))
    }

    pub fn in_set<I, L>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        self.predicate(FilterPredicate::in_set(field, values))
    }

    pub fn search<I, F>(self, term: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.predicate(FilterPredicate::search(term, fields))
    }

    pub fn predicates(&self) -> &[FilterPredicate] {
        &self.predicates
    }

    pub fn build(&self) -> String {
        build(&self.predicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_lowercases_both_sides() {
        let expr = build(&[FilterPredicate::contains("title", "  Phone")]);
        assert_eq!(expr, "contains(tolower(title),tolower('Phone'))");
    }

    #[test]
    fn test_contains_exact_case() {
        let expr = build(&[FilterPredicate::contains_exact_case("sku", "AB-1")]);
        assert_eq!(expr, "contains(sku,'AB-1')");
    }

    #[test]
    fn test_quotes_are_escaped() {
        let expr = build(&[FilterPredicate::contains("name", "Mai's")]);
        assert_eq!(expr, "contains(tolower(name),tolower('Mai''s'))");
    }

    #[test]
    fn test_equals_quoting() {
        assert_eq!(
            build(&[FilterPredicate::equals("email", "a@b.vn")]),
            "email eq 'a@b.vn'"
        );
        assert_eq!(
            build(&[FilterPredicate::equals(
                "status",
                Literal::enumeration("APPROVED")
            )]),
            "status eq APPROVED"
        );
        assert_eq!(
            build(&[FilterPredicate::equals("isActive", true)]),
            "isActive eq true"
        );
    }

    #[test]
    fn test_in_set_uses_any_lambda() {
        assert_eq!(
            build(&[FilterPredicate::in_set("roles", ["ADMIN", "SELLER"])]),
            "roles/any(x: x eq 'ADMIN' or x eq 'SELLER')"
        );
    }

    #[test]
    fn test_search_group_is_parenthesized_and_anded() {
        let expr = FilterExpressionBuilder::new()
            .search("late", ["title", "content"])
            .equals("status", Literal::enumeration("OPEN"))
            .build();
        assert_eq!(
            expr,
            "(contains(tolower(title),tolower('late')) or contains(tolower(content),tolower('late'))) and status eq OPEN"
        );
    }

    #[test]
    fn test_empty_predicates_build_empty_string() {
        assert_eq!(build(&[]), "");
        let expr = FilterExpressionBuilder::new()
            .contains("title", "   ")
            .search("", ["title", "email"])
            .equals("status", Literal::enumeration(""))
            .build();
        assert_eq!(expr, "");
    }

    #[test]
    fn test_blank_predicates_never_emit_clauses() {
        let expr = FilterExpressionBuilder::new()
            .contains("title", " ")
            .contains("email", "an")
            .build();
        assert_eq!(expr, "contains(tolower(email),tolower('an'))");
        assert!(!expr.contains("title"));
    }

    #[test]
    fn test_single_member_search_is_not_parenthesized() {
        let expr = build(&[FilterPredicate::search("vn", ["email"])]);
        assert_eq!(expr, "contains(tolower(email),tolower('vn'))");
    }
}
