//! Field value types and record access

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// A polymorphic field value read out of a record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    List(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of integers and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Timestamp view of datetimes and date-like strings
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            FieldValue::String(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Elements of a collection field
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Key used when grouping records by this value
    pub fn group_key(&self) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::DateTime(dt) => dt.to_rfc3339(),
            FieldValue::List(items) => items
                .iter()
                .map(FieldValue::group_key)
                .collect::<Vec<_>>()
                .join(","),
            FieldValue::Null => "null".to_string(),
        }
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            },
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Array(items) => FieldValue::List(items.iter().map(FieldValue::from).collect()),
            // Nested objects are reached through navigation paths, never compared whole
            Value::Object(_) => FieldValue::Null,
        }
    }
}

/// Read access to named fields of a list item
///
/// Field names may be navigation paths separated by `/` (e.g. `owner/email`),
/// the same notation the filter grammar uses.
pub trait Record {
    /// Value of the field, `None` when the record has no such field
    fn field_value(&self, path: &str) -> Option<FieldValue>;
}

impl Record for Value {
    fn field_value(&self, path: &str) -> Option<FieldValue> {
        let mut current = self;
        for segment in path.split('/') {
            current = current.as_object()?.get(segment)?;
        }
        Some(FieldValue::from(current))
    }
}

/// Parse the date formats list endpoints emit
///
/// Accepts RFC 3339, naive ISO datetimes (taken as UTC), and plain dates.
/// Anything else (including empty strings) is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    static DATE_PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = DATE_PREFIX.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("date prefix pattern is valid")
    });

    let raw = raw.trim();
    if !prefix.is_match(raw) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_from_json() {
        assert_eq!(FieldValue::from(&json!("x")), FieldValue::String("x".into()));
        assert_eq!(FieldValue::from(&json!(3)), FieldValue::Integer(3));
        assert_eq!(FieldValue::from(&json!(2.5)), FieldValue::Float(2.5));
        assert_eq!(FieldValue::from(&json!(true)), FieldValue::Boolean(true));
        assert_eq!(FieldValue::from(&json!(null)), FieldValue::Null);
        assert_eq!(
            FieldValue::from(&json!(["ADMIN", "SELLER"])),
            FieldValue::List(vec![
                FieldValue::String("ADMIN".into()),
                FieldValue::String("SELLER".into())
            ])
        );
    }

    #[test]
    fn test_record_navigation_path() {
        let order = json!({
            "id": 7,
            "buyer": { "email": "an@shop.vn", "roles": ["BUYER"] }
        });
        assert_eq!(order.field_value("id"), Some(FieldValue::Integer(7)));
        assert_eq!(
            order.field_value("buyer/email"),
            Some(FieldValue::String("an@shop.vn".into()))
        );
        assert_eq!(order.field_value("buyer/phone"), None);
        assert_eq!(order.field_value("id/nested"), None);
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(FieldValue::Integer(4).as_f64(), Some(4.0));
        assert_eq!(FieldValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(FieldValue::String("4".into()).as_f64(), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-03-01T10:00:00Z").unwrap();
        let offset = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(rfc, offset);

        let naive = parse_timestamp("2024-03-01T10:00:00.123").unwrap();
        assert_eq!(naive.timestamp(), rfc.timestamp());

        let date = parse_timestamp("2024-03-01").unwrap();
        assert!(date < rfc);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-45").is_none());
    }

    #[test]
    fn test_group_key() {
        assert_eq!(FieldValue::String("APPROVED".into()).group_key(), "APPROVED");
        assert_eq!(FieldValue::Boolean(false).group_key(), "false");
        assert_eq!(FieldValue::Null.group_key(), "null");
    }
}
