//! Filter predicates shared by the query-string serializer and the
//! in-memory evaluator
//!
//! Both paths go through [`normalize_all`] first, so a predicate that is
//! skipped on the wire is also skipped in memory.

use crate::core::field::{FieldValue, Record};

/// A literal on the right-hand side of an equality test
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string literal
    Text(String),
    /// Enumeration member, written unquoted
    Enum(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl Literal {
    pub fn text(value: impl Into<String>) -> Self {
        Literal::Text(value.into())
    }

    /// Enumeration member
    ///
    /// Members that cannot be written unquoted (`ON HOLD`, `5STAR`, `and`)
    /// become text literals; both compare equal to the same string value.
    pub fn enumeration(value: impl Into<String>) -> Self {
        let value = value.into();
        if is_enum_member(&value) {
            Literal::Enum(value)
        } else {
            Literal::Text(value)
        }
    }

    /// Floating point literal; `None` for NaN and infinities
    pub fn float(value: f64) -> Option<Self> {
        value.is_finite().then_some(Literal::Float(value))
    }

    /// Wire form of the literal (`'it''s'`, `APPROVED`, `true`, `42`, `2e20`)
    pub fn to_wire(&self) -> String {
        match self {
            Literal::Text(s) => format!("'{}'", escape_text(s)),
            Literal::Enum(s) if is_enum_member(s) => s.clone(),
            Literal::Enum(s) => format!("'{}'", escape_text(s)),
            Literal::Bool(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            // Debug keeps the fractional part, so 1.0 does not come back as an
            // integer; very large and small values use exponent form
            Literal::Float(f) => format!("{:?}", f),
        }
    }

    /// Strict comparison against a record value
    pub fn matches(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (Literal::Text(expected) | Literal::Enum(expected), FieldValue::String(actual)) => {
                expected == actual
            }
            (Literal::Bool(expected), FieldValue::Boolean(actual)) => expected == actual,
            (Literal::Integer(expected), FieldValue::Integer(actual)) => expected == actual,
            (Literal::Integer(expected), FieldValue::Float(actual)) => *expected as f64 == *actual,
            (Literal::Float(expected), other) => other.as_f64() == Some(*expected),
            _ => false,
        }
    }

    /// Blank text and enum literals, and non-finite floats, carry no constraint
    fn is_blank(&self) -> bool {
        match self {
            Literal::Text(s) | Literal::Enum(s) => s.trim().is_empty(),
            Literal::Float(f) => !f.is_finite(),
            _ => false,
        }
    }
}

const RESERVED_WORDS: &[&str] = &["and", "or", "eq", "not", "true", "false", "null"];

/// Whether `value` can be written as a bare identifier in a filter
fn is_enum_member(value: &str) -> bool {
    let mut chars = value.chars();
    let starts_like_identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_like_identifier
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.contains(&value.to_ascii_lowercase().as_str())
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

/// Escape a string literal for the filter grammar (quotes are doubled)
pub fn escape_text(raw: &str) -> String {
    raw.replace('\'', "''")
}

/// A single boolean test over one field, or an OR group of such tests
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    /// Substring match
    Contains {
        field: String,
        value: String,
        case_insensitive: bool,
    },
    /// Direct equality
    Equals { field: String, value: Literal },
    /// Any element of the field's collection equals one of `values`
    InSet { field: String, values: Vec<Literal> },
    /// At least one of the predicates holds (parenthesized on the wire)
    AnyOf(Vec<FilterPredicate>),
}

impl FilterPredicate {
    /// Case-insensitive substring match
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        FilterPredicate::Contains {
            field: field.into(),
            value: value.into(),
            case_insensitive: true,
        }
    }

    /// Case-sensitive substring match
    pub fn contains_exact_case(field: impl Into<String>, value: impl Into<String>) -> Self {
        FilterPredicate::Contains {
            field: field.into(),
            value: value.into(),
            case_insensitive: false,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        FilterPredicate::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn in_set<I, L>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        FilterPredicate::InSet {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Free-text search: `term` matched case-insensitively against any of `fields`
    pub fn search<I, F>(term: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        FilterPredicate::AnyOf(
            fields
                .into_iter()
                .map(|field| FilterPredicate::contains(field, term))
                .collect(),
        )
    }

    /// Canonical form of the predicate, or `None` when it constrains nothing
    ///
    /// - `Contains`: leading whitespace stripped; blank values are dropped
    /// - `Equals`: blank text/enum values are dropped
    /// - `InSet`: blank members removed; an empty set is dropped
    /// - `AnyOf`: members normalized; empty groups dropped, singletons unwrapped
    pub fn normalized(&self) -> Option<FilterPredicate> {
        match self {
            FilterPredicate::Contains {
                field,
                value,
                case_insensitive,
            } => {
                let value = value.trim_start();
                if value.trim().is_empty() {
                    return None;
                }
                Some(FilterPredicate::Contains {
                    field: field.clone(),
                    value: value.to_string(),
                    case_insensitive: *case_insensitive,
                })
            }
            FilterPredicate::Equals { value, .. } if value.is_blank() => None,
            FilterPredicate::Equals { .. } => Some(self.clone()),
            FilterPredicate::InSet { field, values } => {
                let values: Vec<Literal> =
                    values.iter().filter(|v| !v.is_blank()).cloned().collect();
                if values.is_empty() {
                    return None;
                }
                Some(FilterPredicate::InSet {
                    field: field.clone(),
                    values,
                })
            }
            FilterPredicate::AnyOf(members) => {
                let mut members: Vec<FilterPredicate> =
                    members.iter().filter_map(FilterPredicate::normalized).collect();
                match members.len() {
                    0 => None,
                    1 => members.pop(),
                    _ => Some(FilterPredicate::AnyOf(members)),
                }
            }
        }
    }

    /// Evaluate the predicate against a record
    ///
    /// Expects a normalized predicate; missing and null fields never match.
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        match self {
            FilterPredicate::Contains {
                field,
                value,
                case_insensitive,
            } => match record.field_value(field) {
                Some(FieldValue::String(actual)) if *case_insensitive => {
                    actual.to_lowercase().contains(&value.to_lowercase())
                }
                Some(FieldValue::String(actual)) => actual.contains(value.as_str()),
                _ => false,
            },
            FilterPredicate::Equals { field, value } => record
                .field_value(field)
                .is_some_and(|actual| value.matches(&actual)),
            FilterPredicate::InSet { field, values } => match record.field_value(field) {
                Some(FieldValue::List(elements)) => elements
                    .iter()
                    .any(|element| values.iter().any(|v| v.matches(element))),
                Some(FieldValue::Null) | None => false,
                // A scalar is treated as a one-element collection
                Some(scalar) => values.iter().any(|v| v.matches(&scalar)),
            },
            FilterPredicate::AnyOf(members) => members.iter().any(|p| p.matches(record)),
        }
    }
}

/// Normalize a predicate set, dropping predicates that constrain nothing
pub fn normalize_all(predicates: &[FilterPredicate]) -> Vec<FilterPredicate> {
    predicates
        .iter()
        .filter_map(FilterPredicate::normalized)
        .collect()
}

/// True when the record satisfies every (normalized) predicate
pub fn matches_all<R: Record + ?Sized>(predicates: &[FilterPredicate], record: &R) -> bool {
    predicates.iter().all(|p| p.matches(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_wire_forms() {
        assert_eq!(Literal::text("it's").to_wire(), "'it''s'");
        assert_eq!(Literal::enumeration("APPROVED").to_wire(), "APPROVED");
        assert_eq!(Literal::Bool(true).to_wire(), "true");
        assert_eq!(Literal::Integer(-3).to_wire(), "-3");
        assert_eq!(Literal::Float(1.5).to_wire(), "1.5");
        assert_eq!(Literal::Float(2.0).to_wire(), "2.0");
        assert_eq!(Literal::Float(2e20).to_wire(), "2e20");
        assert_eq!(Literal::Float(1e-7).to_wire(), "1e-7");
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        assert_eq!(Literal::float(4.5), Some(Literal::Float(4.5)));
        assert_eq!(Literal::float(f64::NAN), None);
        assert_eq!(Literal::float(f64::INFINITY), None);
        assert_eq!(
            FilterPredicate::equals("price", Literal::Float(f64::NAN)).normalized(),
            None
        );
    }

    #[test]
    fn test_enumeration_members_must_be_identifiers() {
        assert_eq!(Literal::enumeration("ON_HOLD"), Literal::Enum("ON_HOLD".into()));
        assert_eq!(Literal::enumeration("ON HOLD"), Literal::text("ON HOLD"));
        assert_eq!(Literal::enumeration("5STAR"), Literal::text("5STAR"));
        assert_eq!(Literal::enumeration("and"), Literal::text("and"));
        assert_eq!(Literal::enumeration("True"), Literal::text("True"));
        assert_eq!(Literal::Enum("ON HOLD".into()).to_wire(), "'ON HOLD'");
        assert!(Literal::enumeration("ON HOLD").matches(&FieldValue::String("ON HOLD".into())));
    }

    #[test]
    fn test_literal_strict_matching() {
        assert!(Literal::text("A").matches(&FieldValue::String("A".into())));
        assert!(!Literal::text("A").matches(&FieldValue::String("a".into())));
        assert!(!Literal::text("1").matches(&FieldValue::Integer(1)));
        assert!(Literal::Integer(1).matches(&FieldValue::Float(1.0)));
        assert!(Literal::Bool(false).matches(&FieldValue::Boolean(false)));
        assert!(!Literal::Bool(false).matches(&FieldValue::Null));
    }

    #[test]
    fn test_contains_normalization() {
        let p = FilterPredicate::contains("title", "   phone case ");
        assert_eq!(
            p.normalized(),
            Some(FilterPredicate::contains("title", "phone case "))
        );
        assert_eq!(FilterPredicate::contains("title", "   ").normalized(), None);
        assert_eq!(FilterPredicate::contains("title", "").normalized(), None);
    }

    #[test]
    fn test_in_set_normalization_drops_blank_members() {
        let p = FilterPredicate::in_set("roles", ["ADMIN", " ", ""]);
        assert_eq!(
            p.normalized(),
            Some(FilterPredicate::in_set("roles", ["ADMIN"]))
        );
        assert_eq!(
            FilterPredicate::in_set("roles", Vec::<&str>::new()).normalized(),
            None
        );
    }

    #[test]
    fn test_any_of_normalization() {
        let empty = FilterPredicate::search("  ", ["title", "content"]);
        assert_eq!(empty.normalized(), None);

        let single = FilterPredicate::AnyOf(vec![
            FilterPredicate::contains("title", "x"),
            FilterPredicate::contains("content", ""),
        ]);
        assert_eq!(
            single.normalized(),
            Some(FilterPredicate::contains("title", "x"))
        );
    }

    #[test]
    fn test_contains_matches_case_insensitively() {
        let ticket = json!({ "title": "Refund for Order #12" });
        assert!(FilterPredicate::contains("title", "REFUND").matches(&ticket));
        assert!(!FilterPredicate::contains_exact_case("title", "REFUND").matches(&ticket));
        assert!(!FilterPredicate::contains("content", "refund").matches(&ticket));
    }

    #[test]
    fn test_in_set_matches_collection_members() {
        let account = json!({ "roles": ["BUYER", "SELLER"], "tier": "GOLD" });
        assert!(FilterPredicate::in_set("roles", ["ADMIN", "SELLER"]).matches(&account));
        assert!(!FilterPredicate::in_set("roles", ["ADMIN"]).matches(&account));
        assert!(FilterPredicate::in_set("tier", ["GOLD"]).matches(&account));
        assert!(!FilterPredicate::in_set("missing", ["GOLD"]).matches(&account));
    }

    #[test]
    fn test_search_group_matches_any_field() {
        let feedback = json!({ "title": "Late delivery", "content": "box was damaged", "email": null });
        let search = FilterPredicate::search("damaged", ["title", "content", "email"]);
        assert!(search.matches(&feedback));
        let search = FilterPredicate::search("refund", ["title", "content", "email"]);
        assert!(!search.matches(&feedback));
    }

    #[test]
    fn test_normalize_all_and_matches_all() {
        let shop = json!({ "name": "Mai's Crafts", "status": "APPROVED" });
        let predicates = normalize_all(&[
            FilterPredicate::contains("name", " crafts"),
            FilterPredicate::equals("status", Literal::enumeration("APPROVED")),
            FilterPredicate::equals("status", Literal::enumeration("")),
        ]);
        assert_eq!(predicates.len(), 2);
        assert!(matches_all(&predicates, &shop));
    }
}
