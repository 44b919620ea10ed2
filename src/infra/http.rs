//! `reqwest`-backed [`Transport`].

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use tracing::debug;

use crate::config::TransportSettings;
use crate::domain::Method;

use super::error::InfraError;
use super::transport::{RawRequest, RawResponse, Transport, TransportError};

const ACCEPT_HAL: &str = "application/hal+json, application/json;q=0.9";
const JSON_PATCH: &str = "application/json-patch+json";

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base: Url,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;
        Ok(Self {
            client,
            base: settings.base_url.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("hypercache/", env!("CARGO_PKG_VERSION"))
    }

    /// Absolute hrefs are used as-is, relative ones are joined to the base.
    pub fn resolve(&self, href: &str) -> Result<Url, TransportError> {
        self.base
            .join(href)
            .map_err(|err| TransportError::InvalidUrl {
                url: href.to_string(),
                reason: err.to_string(),
            })
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn transport_error(err: reqwest::Error, url: &str) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_builder() {
        TransportError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        TransportError::Http(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, TransportError> {
        let url = self.resolve(&request.url)?;
        debug!(method = %request.method, url = %url, "sending http request");

        let mut builder = self
            .client
            .request(method(request.method), url)
            .header(ACCEPT, ACCEPT_HAL);
        if let Some(body) = &request.body {
            let content_type = if request.method == Method::Patch {
                JSON_PATCH
            } else {
                "application/json"
            };
            builder = builder
                .header(CONTENT_TYPE, content_type)
                .body(body.to_string());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| transport_error(err, &request.url))?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|err| transport_error(err, &request.url))?;

        Ok(RawResponse {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
