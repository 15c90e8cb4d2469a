//! HTTP transport
//!
//! A `Transport` executes one request with a deadline and describes what
//! happened as a `TransportOutcome`. Timeouts and unreachable hosts are
//! outcomes, not errors; `Err` is reserved for failures that prevented an
//! attempt from being made at all (e.g. an invalid header).

mod stub;

pub use stub::StubTransport;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use crate::core::{RequestSpec, TransportOutcome};
use crate::error::{Result, ServiceError};

/// Executes a single timeout-bounded HTTP request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<TransportOutcome>;
}

/// Transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with gzip enabled and no client-wide timeout; the
    /// deadline comes from each `RequestSpec`
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .gzip(true)
            .build()
            .map_err(|e| ServiceError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn failed_attempt(err: &reqwest::Error, elapsed: Duration) -> Option<TransportOutcome> {
        if err.is_timeout() {
            Some(TransportOutcome::timed_out(elapsed))
        } else if err.is_connect() || err.is_redirect() || err.is_body() || err.is_request() {
            Some(TransportOutcome::unreachable(err.to_string()).with_elapsed(elapsed))
        } else {
            None
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestSpec) -> Result<TransportOutcome> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .timeout(request.timeout);

        if let Some(ref query) = request.query {
            builder = builder.query(query);
        }

        for (key, value) in request.headers.iter() {
            builder = builder.header(key, value);
        }

        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                return match Self::failed_attempt(&err, started.elapsed()) {
                    Some(outcome) => Ok(outcome.with_effective_url(request.url.clone())),
                    None => Err(ServiceError::from(err)),
                };
            }
        };

        let status_code = response.status().as_u16();
        let effective_url = response.url().to_string();

        match response.bytes().await {
            Ok(body) => Ok(TransportOutcome::response(status_code, body.to_vec())
                .with_effective_url(effective_url)
                .with_elapsed(started.elapsed())),
            Err(err) => match Self::failed_attempt(&err, started.elapsed()) {
                Some(outcome) => Ok(outcome.with_effective_url(effective_url)),
                None => Err(ServiceError::from(err)),
            },
        }
    }
}
