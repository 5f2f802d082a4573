//! The narrow capability that actually moves bytes.
//!
//! # Design
//! The client depends only on `Transport::send`, so tests substitute fakes
//! that record requests and fabricate responses. `ReqwestTransport` is the
//! production implementation; it owns one pooled `reqwest::Client` shared by
//! every call made through it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};

/// Sends one request and returns the raw response.
///
/// Implementations must be safe to call concurrently. Non-2xx statuses are
/// responses, not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// Redirect handling for the default transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    None,
    Limited(usize),
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        RedirectPolicy::Limited(10)
    }
}

/// `Transport` backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(redirect: RedirectPolicy) -> Result<Self, reqwest::Error> {
        let redirect = match redirect {
            RedirectPolicy::None => reqwest::redirect::Policy::none(),
            RedirectPolicy::Limited(max) => reqwest::redirect::Policy::limited(max),
        };
        let client = reqwest::Client::builder()
            .redirect(redirect)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(Box::new(err))
    } else {
        TransportError::Other(Box::new(err))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(method(request.method), &request.url)
            .timeout(timeout);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        let body: Bytes = response.bytes().await.map_err(|e| classify(e, timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
