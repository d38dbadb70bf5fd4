//! reqwest-backed [`Transport`] for real list endpoints

use crate::config::QueryConfig;
use crate::core::error::{QueryError, QueryResult, ResponseError, TransportError};
use crate::core::query::QueryString;
use crate::core::service::Transport;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;
use std::time::Duration;

/// HTTP transport joining endpoint paths onto a base URL
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> QueryResult<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url).map_err(|_| TransportError::InvalidUrl {
            url: base_url.clone(),
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Build a transport from the configured base URL and request timeout
    pub fn from_config(config: &QueryConfig) -> QueryResult<Self> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> QueryResult<Url> {
        let raw = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|_| TransportError::InvalidUrl { url: raw }.into())
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> QueryResult<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                }
            } else {
                TransportError::Connection {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::debug!(%url, status = status.as_u16(), "List request rejected");
        Err(TransportError::Status {
            status: status.as_u16(),
            message: error_message(&error_text),
        }
        .into())
    }

    async fn json(&self, response: Response, url: &Url) -> QueryResult<Value> {
        let text = response.text().await.map_err(|e| TransportError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ResponseError::Malformed {
                reason: format!("response body is not JSON: {}", e),
            }
            .into()
        })
    }
}

/// Pull a human-readable message out of an error body
///
/// JSON bodies with a `message` field (the reference server's error shape)
/// yield that field; any other non-blank body is used as-is.
fn error_message(body: &str) -> Option<String> {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(message)) = fields.get("message") {
            return Some(message.clone());
        }
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &QueryString) -> QueryResult<Value> {
        let url = self.url(path)?;
        tracing::debug!(%url, query = %query, "GET list endpoint");
        let request = self.client.get(url.clone()).query(query.pairs());
        let response = self.send(request, &url).await?;
        self.json(response, &url).await
    }

    async fn post(&self, path: &str, body: Value) -> QueryResult<Value> {
        let url = self.url(path)?;
        let response = self.send(self.client.post(url.clone()).json(&body), &url).await?;
        self.json(response, &url).await
    }

    async fn put(&self, path: &str, body: Value) -> QueryResult<Value> {
        let url = self.url(path)?;
        let response = self.send(self.client.put(url.clone()).json(&body), &url).await?;
        self.json(response, &url).await
    }

    async fn delete(&self, path: &str) -> QueryResult<()> {
        let url = self.url(path)?;
        self.send(self.client.delete(url.clone()), &url).await?;
        Ok(())
    }
}
