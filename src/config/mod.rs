//! Configuration loading and management

use crate::core::error::ConfigError;
use crate::core::response::DEFAULT_COUNT_FIELDS;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

fn default_debounce_ms() -> u64 {
    500
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    100
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_count_field_names() -> Vec<String> {
    DEFAULT_COUNT_FIELDS.iter().map(|s| s.to_string()).collect()
}

fn default_honors_query() -> bool {
    true
}

/// One list endpoint of the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Logical name used by callers (e.g., "shops")
    pub name: String,

    /// Path relative to the base URL (e.g., "admin/shops")
    pub path: String,

    /// False for legacy endpoints that ignore `$filter`/`$orderby`/`$top`/`$skip`
    #[serde(default = "default_honors_query")]
    pub honors_query: bool,

    /// Fields searched by the free-text box
    #[serde(default)]
    pub search_fields: Vec<String>,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            honors_query: true,
            search_fields: Vec::new(),
        }
    }

    /// Mark the endpoint as ignoring query options
    pub fn legacy(mut self) -> Self {
        self.honors_query = false;
        self
    }

    pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Complete configuration for the query layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Root URL the endpoint paths are joined to
    pub base_url: String,

    /// Quiet period of the search box before a query fires
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound applied to requested page sizes
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Count field names, highest priority first
    #[serde(default = "default_count_field_names")]
    pub count_field_names: Vec<String>,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl QueryConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    ///
    /// The loaded configuration is validated before it is returned.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Find an endpoint by name
    pub fn endpoint(&self, name: &str) -> Result<&EndpointConfig, ConfigError> {
        self.endpoints
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ConfigError::UnknownEndpoint {
                name: name.to_string(),
            })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Clamp a requested page size into `1..=max_page_size`
    pub fn clamp_page_size(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_page_size.max(1))
    }

    /// Check the configuration for values the layer cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(invalid("default_page_size", "must be at least 1"));
        }
        if self.max_page_size < self.default_page_size {
            return Err(invalid(
                "max_page_size",
                "must not be smaller than default_page_size",
            ));
        }
        if self.count_field_names.is_empty() {
            return Err(invalid("count_field_names", "must name at least one field"));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.path.trim().is_empty() {
                return Err(invalid(
                    &format!("endpoints.{}.path", endpoint.name),
                    "must not be empty",
                ));
            }
            if !seen.insert(endpoint.name.as_str()) {
                return Err(invalid(
                    "endpoints",
                    &format!("duplicate endpoint name '{}'", endpoint.name),
                ));
            }
        }
        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            debounce_ms: default_debounce_ms(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            request_timeout_ms: default_request_timeout_ms(),
            count_field_names: default_count_field_names(),
            endpoints: vec![
                EndpointConfig::new("shops", "shops").with_search_fields(["name", "owner/email"]),
                EndpointConfig::new("products", "products").with_search_fields(["title"]),
                EndpointConfig::new("tickets", "tickets")
                    .legacy()
                    .with_search_fields(["title", "content", "email"]),
            ],
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
