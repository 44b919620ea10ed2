//! HTTP transport seam.
//!
//! The engine never talks to the network directly; it hands a [`RawRequest`]
//! to a [`Transport`] and interprets the [`RawResponse`].

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Method;

#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl RawRequest {
    pub fn new(method: Method, url: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            url: url.into(),
            body,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url, None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status_code: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status_code: u16, body: &Value) -> Self {
        Self::new(status_code, body.to_string())
            .with_header("content-type", "application/json")
    }

    pub fn no_content() -> Self {
        Self::new(204, Bytes::new())
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Parsed JSON body; `None` when the body is empty.
    pub fn body_json(&self) -> Result<Option<Value>, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(String),
    #[error("request to `{url}` timed out")]
    Timeout { url: String },
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, TransportError>;

    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        self.send(RawRequest::get(url)).await
    }

    async fn post(&self, url: &str, body: Option<Value>) -> Result<RawResponse, TransportError> {
        self.send(RawRequest::new(Method::Post, url, body)).await
    }

    async fn put(&self, url: &str, body: Option<Value>) -> Result<RawResponse, TransportError> {
        self.send(RawRequest::new(Method::Put, url, body)).await
    }

    async fn patch(&self, url: &str, body: Option<Value>) -> Result<RawResponse, TransportError> {
        self.send(RawRequest::new(Method::Patch, url, body)).await
    }

    async fn delete(&self, url: &str) -> Result<RawResponse, TransportError> {
        self.send(RawRequest::new(Method::Delete, url, None)).await
    }
}
