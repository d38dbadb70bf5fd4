//! List response normalization
//!
//! List endpoints answer in one of three shapes:
//!
//! - a bare array of items,
//! - an envelope `{ "value": [...], "@odata.count": n }` whose count field
//!   name varies between deployments,
//! - a bare integer for count-only requests.
//!
//! [`ResponseNormalizer`] turns all of them into a [`ListResult`] and reports
//! which shape it saw, so the caller can tell a real total from
//! "total equals what was returned".

use crate::core::error::{QueryResult, ResponseError};
use crate::core::query::ListResult;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Count field names, in priority order
pub const DEFAULT_COUNT_FIELDS: &[&str] = &[
    "@odata.count",
    "@odata.Count",
    "odata.count",
    "Count",
    "count",
    "totalCount",
    "total",
];

/// Items collection names, in priority order
pub const DEFAULT_ITEM_FIELDS: &[&str] = &["value", "Value", "items", "data"];

/// The shape a list response arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Bare array: the total is only the number of returned items
    BareArray,
    /// Envelope object; `count_reported` is false when no count field was found
    Envelope { count_reported: bool },
    /// Bare integer from a count-only request
    CountOnly,
}

impl ResponseShape {
    /// Whether the server told us the size of the filtered collection
    pub fn reports_total(&self) -> bool {
        matches!(
            self,
            ResponseShape::Envelope {
                count_reported: true
            } | ResponseShape::CountOnly
        )
    }
}

/// A normalized response together with the shape it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub result: ListResult<T>,
    pub shape: ResponseShape,
}

impl Normalized<Value> {
    /// Deserialize the items into `T`
    pub fn into_typed<T: DeserializeOwned>(self) -> QueryResult<Normalized<T>> {
        let result = self.result.try_map(serde_json::from_value)?;
        Ok(Normalized {
            result,
            shape: self.shape,
        })
    }
}

/// Normalizes raw list responses
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    count_fields: Vec<String>,
    item_fields: Vec<String>,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self {
            count_fields: DEFAULT_COUNT_FIELDS.iter().map(|s| s.to_string()).collect(),
            item_fields: DEFAULT_ITEM_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom count field priority list (first match wins)
    pub fn with_count_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.count_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn count_fields(&self) -> &[String] {
        &self.count_fields
    }

    /// Normalize a raw response
    pub fn normalize(&self, raw: Value) -> QueryResult<Normalized<Value>> {
        match raw {
            Value::Array(items) => {
                let total_count = items.len();
                Ok(Normalized {
                    result: ListResult::new(items, total_count),
                    shape: ResponseShape::BareArray,
                })
            }
            Value::Number(n) => {
                let count = n.as_u64().ok_or_else(|| ResponseError::Malformed {
                    reason: format!("count result {} is not a non-negative integer", n),
                })?;
                Ok(Normalized {
                    result: ListResult::new(Vec::new(), count as usize),
                    shape: ResponseShape::CountOnly,
                })
            }
            Value::Object(mut envelope) => {
                let items = match self.item_fields.iter().find(|f| envelope.contains_key(*f)) {
                    Some(field) => match envelope.remove(field) {
                        Some(Value::Array(items)) => Some(items),
                        _ => {
                            return Err(ResponseError::UnexpectedType {
                                field: field.clone(),
                                expected: "an array",
                            }
                            .into());
                        }
                    },
                    None => None,
                };

                let count = match self.count_fields.iter().find(|f| envelope.contains_key(*f)) {
                    Some(field) => Some(parse_count(field, &envelope[field.as_str()])?),
                    None => None,
                };

                match (items, count) {
                    (None, None) => Err(ResponseError::Malformed {
                        reason: "object has neither an items collection nor a count".into(),
                    }
                    .into()),
                    (Some(items), Some(count)) => Ok(Normalized {
                        result: ListResult::new(items, count),
                        shape: ResponseShape::Envelope {
                            count_reported: true,
                        },
                    }),
                    (Some(items), None) => {
                        let total_count = items.len();
                        Ok(Normalized {
                            result: ListResult::new(items, total_count),
                            shape: ResponseShape::Envelope {
                                count_reported: false,
                            },
                        })
                    }
                    (None, Some(count)) => Ok(Normalized {
                        result: ListResult::new(Vec::new(), count),
                        shape: ResponseShape::Envelope {
                            count_reported: true,
                        },
                    }),
                }
            }
            Value::Null => Err(ResponseError::Malformed {
                reason: "response body is null".into(),
            }
            .into()),
            Value::Bool(_) | Value::String(_) => Err(ResponseError::Malformed {
                reason: "response is neither a list, an envelope nor a count".into(),
            }
            .into()),
        }
    }
}

/// Counts arrive as numbers, and from some gateways as digit strings
fn parse_count(field: &str, value: &Value) -> QueryResult<usize> {
    let count = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    count.map(|c| c as usize).ok_or_else(|| {
        ResponseError::UnexpectedType {
            field: field.to_string(),
            expected: "a non-negative integer",
        }
        .into()
    })
}

/// Normalize with the default field names
pub fn normalize(raw: Value) -> QueryResult<ListResult<Value>> {
    ResponseNormalizer::default()
        .normalize(raw)
        .map(|normalized| normalized.result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_bare_array() {
        let n = ResponseNormalizer::new()
            .normalize(json!([{ "id": 1 }, { "id": 2 }]))
            .unwrap();
        assert_eq!(n.result.total_count, 2);
        assert_eq!(n.shape, ResponseShape::BareArray);
        assert!(!n.shape.reports_total());
    }

    #[test]
    fn test_envelope_with_odata_count() {
        let n = ResponseNormalizer::new()
            .normalize(json!({ "value": [{ "id": 1 }], "@odata.count": 41 }))
            .unwrap();
        assert_eq!(n.result.items.len(), 1);
        assert_eq!(n.result.total_count, 41);
        assert!(n.shape.reports_total());
    }

    #[test]
    fn test_count_field_casings() {
        for field in DEFAULT_COUNT_FIELDS {
            let mut body = serde_json::Map::new();
            body.insert("value".into(), json!([]));
            body.insert(field.to_string(), json!(7));
            let result = normalize(Value::Object(body)).unwrap();
            assert_eq!(result.total_count, 7, "count field {}", field);
        }
    }

    #[test]
    fn test_first_count_field_wins() {
        let result = normalize(json!({ "value": [], "count": 3, "@odata.count": 9 })).unwrap();
        assert_eq!(result.total_count, 9);
    }

    #[test]
    fn test_string_count_is_tolerated() {
        let result = normalize(json!({ "items": [1, 2], "totalCount": "12" })).unwrap();
        assert_eq!(result.total_count, 12);
    }

    #[test]
    fn test_envelope_without_count() {
        let n = ResponseNormalizer::new()
            .normalize(json!({ "data": [1, 2, 3] }))
            .unwrap();
        assert_eq!(n.result.total_count, 3);
        assert_eq!(
            n.shape,
            ResponseShape::Envelope {
                count_reported: false
            }
        );
    }

    #[test]
    fn test_count_only_integer() {
        let n = ResponseNormalizer::new().normalize(json!(15)).unwrap();
        assert!(n.result.is_empty());
        assert_eq!(n.result.total_count, 15);
        assert_eq!(n.shape, ResponseShape::CountOnly);
    }

    #[test]
    fn test_malformed_inputs() {
        for raw in [
            json!(null),
            json!({ "message": "ok" }),
            json!("shops"),
            json!(-1),
            json!({ "value": "not a list" }),
            json!({ "value": [], "count": -4 }),
        ] {
            let err = normalize(raw.clone()).unwrap_err();
            assert!(err.is_malformed_response(), "expected malformed for {}", raw);
        }
    }

    #[test]
    fn test_custom_count_fields() {
        let normalizer = ResponseNormalizer::new().with_count_fields(["hits"]);
        let n = normalizer
            .normalize(json!({ "value": [], "hits": 4, "count": 99 }))
            .unwrap();
        assert_eq!(n.result.total_count, 4);
    }

    #[test]
    fn test_normalize_is_idempotent_on_bare_arrays() {
        let raw = json!({ "value": [{ "id": 1 }, { "id": 2 }], "@odata.count": 10 });
        let first = normalize(raw).unwrap();
        let again = normalize(Value::Array(first.items.clone())).unwrap();
        assert_eq!(again.items, first.items);
        assert_eq!(again.total_count, first.items.len());

        let bare = json!([1, 2, 3]);
        let once = normalize(bare).unwrap();
        let twice = normalize(Value::Array(once.items.clone())).unwrap();
        assert_eq!(once.total_count, twice.total_count);
    }

    #[test]
    fn test_into_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Shop {
            name: String,
        }

        let typed = ResponseNormalizer::new()
            .normalize(json!([{ "name": "Mai" }]))
            .unwrap()
            .into_typed::<Shop>()
            .unwrap();
        assert_eq!(typed.result.items, vec![Shop { name: "Mai".into() }]);

        let err = ResponseNormalizer::new()
            .normalize(json!([{ "title": 1 }]))
            .unwrap()
            .into_typed::<Shop>()
            .unwrap_err();
        assert!(err.is_malformed_response());
    }
}
