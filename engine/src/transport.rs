//! Transport boundary consumed by [`RestStore`](crate::RestStore).
//!
//! A transport is a single `request(method, url, body)` function returning the
//! decoded JSON response. Anything that can do that works; [`HttpTransport`]
//! is the `reqwest`-backed default.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;

/// HTTP methods used by the REST wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Issues one request and returns the JSON response body.
///
/// Implementations fail with [`Error::Backend`] on a non-success status or a
/// transport failure. An empty body decodes to `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value>;
}

/// [`Transport`] over a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, headers, proxies).
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let context = format!("{method} {url}");
        tracing::debug!(%method, %url, has_body = body.is_some(), "sending request");

        let mut request = self
            .http_client
            .request(method.into(), url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| Error::Backend {
            status: None,
            body: e.to_string(),
            context: context.clone(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Error::Backend {
            status: Some(status.as_u16()),
            body: e.to_string(),
            context: context.clone(),
        })?;

        if !status.is_success() {
            tracing::debug!(%status, %url, "request failed");
            return Err(Error::Backend {
                status: Some(status.as_u16()),
                body: text,
                context,
            });
        }

        decode_body(&text).map_err(|e| Error::Backend {
            status: Some(status.as_u16()),
            body: format!("invalid JSON response: {e}"),
            context,
        })
    }
}

/// Decode a response body; blank bodies are `null`.
pub(crate) fn decode_body(text: &str) -> serde_json::Result<serde_json::Value> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(text)
}
