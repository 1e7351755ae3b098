//! HTTP seam used for description fetches and SOAP calls.
//!
//! [`UreqTransport`] builds a fresh `ureq` agent for every request, so each
//! fetch or action call owns its connection and releases it when it returns.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;
use ureq::Agent;

use crate::DEFAULT_HTTP_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers,
            body,
        }
    }

    /// Header value, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The request never produced an HTTP status (DNS, connect, timeout, I/O).
#[derive(Error, Debug)]
#[error("HTTP request to {url} failed: {source}")]
pub struct TransportError {
    pub url: String,
    #[source]
    pub source: Box<dyn StdError + Send + Sync>,
}

impl TransportError {
    pub fn new(url: impl Into<String>, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// Performs one HTTP exchange. Any status is a successful exchange; only
/// failures to get a response at all are errors.
pub trait HttpTransport: Send + Sync {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] over `ureq`
#[derive(Debug, Clone)]
pub struct UreqTransport {
    timeout: Duration,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn agent(&self) -> Agent {
        // 4xx/5xx must not become Error::StatusCode: SOAP faults come back
        // as HTTP 500 with a body we still want to read.
        let config = Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .http_status_as_error(false)
            .build();
        config.into()
    }
}

/// ureq computes these from the URL and the body
fn is_managed_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length")
}

impl HttpTransport for UreqTransport {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent();
        let url = request.url.as_str();
        trace!("HTTP {:?} {}", request.method, url);

        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = agent.get(url);
                for (name, value) in &request.headers {
                    if !is_managed_header(name) {
                        builder = builder.header(name.as_str(), value.as_str());
                    }
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = agent.post(url);
                for (name, value) in &request.headers {
                    if !is_managed_header(name) {
                        builder = builder.header(name.as_str(), value.as_str());
                    }
                }
                builder.send(&request.body[..])
            }
        };

        let mut response = result.map_err(|e| TransportError::new(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| TransportError::new(url, e))?;

        Ok(HttpResponse { status, body })
    }
}
