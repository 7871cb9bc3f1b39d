//! Request options and the materialized response type

use crate::error::{BulkheadError, BulkheadResult};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request options for [`crate::pool::ConnectionPool`] calls
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers for this request
    pub headers: Vec<(String, String)>,
    /// Query string pairs
    pub query: Vec<(String, String)>,
    /// JSON body (serialized by the client)
    pub json: Option<serde_json::Value>,
    /// Raw body bytes; takes precedence over `json` when both are set
    pub body: Option<Bytes>,
    /// Override of the pool-wide request timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query pair
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body
    pub fn with_json(mut self, json: serde_json::Value) -> Self {
        self.json = Some(json);
        self
    }

    /// Set a raw byte body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Outbound payload size, where obtainable
    pub(crate) fn body_len(&self) -> u64 {
        if let Some(body) = &self.body {
            body.len() as u64
        } else if let Some(json) = &self.json {
            serde_json::to_vec(json).map(|v| v.len() as u64).unwrap_or(0)
        } else {
            0
        }
    }
}

/// A fully-read HTTP response
///
/// [`reqwest::Response`] cannot be cloned and holds the connection open while
/// the body is unread, so the pool materializes the body before handing the
/// response out (streaming callers use [`crate::pool::ConnectionPool::stream`]
/// instead).
#[derive(Debug, Clone)]
pub struct PoolResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) url: String,
    pub(crate) body: Bytes,
}

impl PoolResponse {
    /// HTTP status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final request URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw body bytes
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body length in bytes
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    /// Body decoded as UTF-8
    pub fn text(&self) -> BulkheadResult<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BulkheadError::other(format!("response body is not valid UTF-8: {}", e)))
    }

    /// Body deserialized from JSON
    pub fn json<T: DeserializeOwned>(&self) -> BulkheadResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
