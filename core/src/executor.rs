//! Sends a resolved request and classifies the outcome.
//!
//! # Design
//! The executor owns the transport and the interceptor chain. Interceptors
//! see a read-only view of the request and a mutable header list, so they
//! can add credentials or tracing headers but never change the method or
//! body. Every call is raced against its timeout budget and, when given, a
//! cancellation token; losing the race drops the in-flight transport future.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ApiError, TransportError};
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

/// What an interceptor may look at.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub operation: &'a str,
    pub method: HttpMethod,
    pub url: &'a str,
}

/// Mutates outgoing headers before send. Runs concurrently across calls,
/// so any internal state must be synchronized.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, request: &RequestView<'_>, headers: &mut Headers);
}

impl<F> Interceptor for F
where
    F: Fn(&RequestView<'_>, &mut Headers) + Send + Sync,
{
    fn intercept(&self, request: &RequestView<'_>, headers: &mut Headers) {
        self(request, headers)
    }
}

#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            transport,
            interceptors,
        }
    }

    /// Run `request` and return the response when its status is 2xx.
    ///
    /// Non-2xx statuses become `ApiError::Status` with the raw body; the
    /// body is not decoded.
    pub async fn execute(
        &self,
        operation: &str,
        mut request: HttpRequest,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<HttpResponse, ApiError> {
        let view = RequestView {
            operation,
            method: request.method,
            url: &request.url,
        };
        let mut headers = std::mem::take(&mut request.headers);
        for interceptor in &self.interceptors {
            interceptor.intercept(&view, &mut headers);
        }
        if let Some((name, reason)) = headers.first_invalid() {
            return Err(ApiError::InvalidHeader {
                name: name.to_string(),
                reason,
            });
        }
        request.headers = headers;

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(ApiError::Cancelled);
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let started = Instant::now();
        let call = tokio::time::timeout(timeout, self.transport.send(&request, timeout));
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(elapsed = ?started.elapsed(), "request cancelled");
                    return Err(ApiError::Cancelled);
                }
                outcome = call => outcome,
            },
            None => call.await,
        };

        let response = match outcome {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(timeout).into()),
        };
        debug!(status = response.status, elapsed = ?started.elapsed(), "response received");

        if !response.is_success() {
            debug!(status = response.status, "non-success status");
            return Err(ApiError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}
