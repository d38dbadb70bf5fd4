//! Typed error handling for the query layer
//!
//! Callers get a [`QueryError`] back from every fallible operation and can
//! match on the category instead of inspecting strings.
//!
//! # Error Categories
//!
//! - [`ResponseError`]: the response shape was not recognized (`MalformedResponse`)
//! - [`TransportError`]: the request never produced a usable response (`NetworkFailure`)
//! - [`ConfigError`]: the layer was configured with something it cannot use
//!
//! An empty list is never an error: it is a `ListResult` with no items.
//!
//! # Example
//!
//! ```rust,ignore
//! match client.fetch("shops", &query).await {
//!     Ok(result) if result.is_empty() => show_empty_state(),
//!     Ok(result) => render(result),
//!     Err(e) if e.is_network_failure() => show_retry(e.display_message()),
//!     Err(e) => show_error(e.display_message()),
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

/// The main error type of the query layer
#[derive(Debug)]
pub enum QueryError {
    /// The response could not be normalized
    Response(ResponseError),

    /// The transport failed (connectivity, timeout, non-2xx)
    Transport(TransportError),

    /// Configuration errors
    Config(ConfigError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Response(e) => write!(f, "{}", e),
            QueryError::Transport(e) => write!(f, "{}", e),
            QueryError::Config(e) => write!(f, "{}", e),
            QueryError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Response(e) => Some(e),
            QueryError::Transport(e) => Some(e),
            QueryError::Config(e) => Some(e),
            QueryError::Internal(_) => None,
        }
    }
}

/// Error body shape shared by the reference server and client-side reporting
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl QueryError {
    /// HTTP status used when the reference server renders this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::Response(_) => StatusCode::BAD_GATEWAY,
            QueryError::Transport(e) => e.status_code(),
            QueryError::Config(ConfigError::UnknownEndpoint { .. }) => StatusCode::NOT_FOUND,
            QueryError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::Response(_) => "MALFORMED_RESPONSE",
            QueryError::Transport(e) => e.error_code(),
            QueryError::Config(_) => "CONFIG_ERROR",
            QueryError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for errors the normalizer raised on an unrecognized shape
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, QueryError::Response(_))
    }

    /// True for transport-level failures; the caller owns the retry affordance
    pub fn is_network_failure(&self) -> bool {
        matches!(self, QueryError::Transport(_))
    }

    /// Message suitable for an error banner
    pub fn display_message(&self) -> String {
        match self {
            QueryError::Response(_) => "The server returned data in an unexpected format".into(),
            QueryError::Transport(TransportError::Status {
                message: Some(message),
                ..
            }) if !message.trim().is_empty() => message.trim().to_string(),
            QueryError::Transport(TransportError::Timeout { .. }) => {
                "The request timed out, please try again".into()
            }
            QueryError::Transport(_) => "Could not reach the server, please try again".into(),
            QueryError::Config(e) => e.to_string(),
            QueryError::Internal(_) => "Something went wrong".into(),
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            QueryError::Transport(TransportError::Status { status, .. }) => {
                Some(serde_json::json!({ "status": status }))
            }
            QueryError::Transport(TransportError::Timeout { url })
            | QueryError::Transport(TransportError::Connection { url, .. }) => {
                Some(serde_json::json!({ "url": url }))
            }
            QueryError::Config(ConfigError::UnknownEndpoint { name }) => {
                Some(serde_json::json!({ "endpoint": name }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Response Errors
// =============================================================================

/// Errors raised while normalizing a list response
#[derive(Debug)]
pub enum ResponseError {
    /// `null`, or an object with neither an items collection nor a count
    Malformed { reason: String },

    /// A recognized field held a value of the wrong type
    UnexpectedType {
        field: String,
        expected: &'static str,
    },

    /// Items could not be converted into the requested type
    Deserialize { message: String },
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseError::Malformed { reason } => {
                write!(f, "Malformed list response: {}", reason)
            }
            ResponseError::UnexpectedType { field, expected } => {
                write!(
                    f,
                    "Malformed list response: field '{}' should be {}",
                    field, expected
                )
            }
            ResponseError::Deserialize { message } => {
                write!(f, "Failed to deserialize list items: {}", message)
            }
        }
    }
}

impl std::error::Error for ResponseError {}

impl From<ResponseError> for QueryError {
    fn from(err: ResponseError) -> Self {
        QueryError::Response(err)
    }
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Transport-level failures
#[derive(Debug)]
pub enum TransportError {
    /// The server answered with a non-2xx status
    Status {
        status: u16,
        message: Option<String>,
    },

    /// The request did not complete in time
    Timeout { url: String },

    /// The server could not be reached
    Connection { url: String, message: String },

    /// The target URL could not be built
    InvalidUrl { url: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status {
                status,
                message: Some(message),
            } => write!(f, "Request failed with status {}: {}", status, message),
            TransportError::Status {
                status,
                message: None,
            } => write!(f, "Request failed with status {}", status),
            TransportError::Timeout { url } => write!(f, "Request to '{}' timed out", url),
            TransportError::Connection { url, message } => {
                write!(f, "Failed to reach '{}': {}", url, message)
            }
            TransportError::InvalidUrl { url } => write!(f, "Invalid URL: {}", url),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::Status { status, .. } if *status == 404 => "NOT_FOUND",
            TransportError::Status { status, .. } if *status < 500 => "REQUEST_REJECTED",
            TransportError::Status { .. } => "SERVER_ERROR",
            TransportError::Timeout { .. } => "TIMEOUT",
            TransportError::Connection { .. } => "NETWORK_FAILURE",
            TransportError::InvalidUrl { .. } => "INVALID_URL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TransportError::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            TransportError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            TransportError::Connection { .. } => StatusCode::BAD_GATEWAY,
            TransportError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// HTTP status carried by the failure, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for QueryError {
    fn from(err: TransportError) -> Self {
        QueryError::Transport(err)
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// No endpoint with this name is configured
    UnknownEndpoint { name: String },

    /// A configuration value is out of range or inconsistent
    InvalidValue { field: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownEndpoint { name } => {
                write!(f, "Unknown endpoint: {}", name)
            }
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid configuration for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for QueryError {
    fn from(err: ConfigError) -> Self {
        QueryError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Response(ResponseError::Deserialize {
            message: err.to_string(),
        })
    }
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to QueryError first
        match err.downcast::<QueryError>() {
            Ok(query_err) => query_err,
            Err(err) => QueryError::Internal(err.to_string()),
        }
    }
}

/// Result alias used across the crate
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_is_not_network_failure() {
        let err = QueryError::from(ResponseError::Malformed {
            reason: "null body".into(),
        });
        assert!(err.is_malformed_response());
        assert!(!err.is_network_failure());
        assert_eq!(err.error_code(), "MALFORMED_RESPONSE");
    }

    #[test]
    fn test_status_error_codes() {
        let not_found = TransportError::Status {
            status: 404,
            message: None,
        };
        let rejected = TransportError::Status {
            status: 400,
            message: None,
        };
        let server = TransportError::Status {
            status: 503,
            message: None,
        };
        assert_eq!(not_found.error_code(), "NOT_FOUND");
        assert_eq!(rejected.error_code(), "REQUEST_REJECTED");
        assert_eq!(server.error_code(), "SERVER_ERROR");
        assert_eq!(server.status(), Some(503));
    }

    #[test]
    fn test_display_message_prefers_server_message() {
        let err = QueryError::from(TransportError::Status {
            status: 409,
            message: Some("  Shop name already taken ".into()),
        });
        assert_eq!(err.display_message(), "Shop name already taken");
    }

    #[test]
    fn test_display_message_for_timeout() {
        let err = QueryError::from(TransportError::Timeout {
            url: "http://localhost/shops".into(),
        });
        assert!(err.is_network_failure());
        assert_eq!(err.error_code(), "TIMEOUT");
        assert!(err.display_message().contains("timed out"));
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_category() {
        let original = QueryError::from(ConfigError::UnknownEndpoint {
            name: "tickets".into(),
        });
        let wrapped = anyhow::Error::new(original);
        let back = QueryError::from(wrapped);
        assert!(matches!(
            back,
            QueryError::Config(ConfigError::UnknownEndpoint { .. })
        ));
    }

    #[test]
    fn test_error_response_details() {
        let err = QueryError::from(TransportError::Status {
            status: 400,
            message: Some("bad filter".into()),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let body = err.to_response();
        assert_eq!(body.code, "REQUEST_REJECTED");
        assert_eq!(body.details, Some(serde_json::json!({ "status": 400 })));

        let internal = QueryError::Internal("boom".into());
        assert!(internal.to_response().details.is_none());
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
