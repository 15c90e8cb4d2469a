//! # Restful Client
//!
//! A resilient client for calling JSON services over HTTP by logical name.
//!
//! This crate provides:
//!
//! - A service directory mapping names to base URL, timeout, retry budget and
//!   user agent, loadable from `restful_services.yml`
//! - A per-service circuit breaker that refuses calls to services that keep
//!   failing
//! - Timeout retries for idempotent verbs
//! - Failure reporting to a pluggable sink
//!
//! ## Architecture
//!
//! - `RestfulClient`: runs every call through the check, dispatch, classify,
//!   retry and report pipeline
//! - `ServiceDirectory`: resolves service names to `ServiceConfig`
//! - `HealthTracker`: alive/down state per service (`ServiceHealthRegistry`)
//! - `Transport`: the single I/O boundary (`ReqwestTransport`, `StubTransport`)
//! - `Reporter`: sink for failure events
//! - `ServiceError`: every way a call can fail
//!
//! ```no_run
//! use restful_client::{RequestOptions, RestfulClient};
//!
//! # async fn run() -> restful_client::Result<()> {
//! let client = RestfulClient::builder()
//!     .service("posts", "http://localhost:8383/api/v1")
//!     .build()?;
//!
//! let posts = client.get("posts", "/posts", RequestOptions::new()).await?;
//! # let _ = posts;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod metrics;
pub mod reporting;
pub mod resilience;
pub mod transport;
pub mod util;

pub use crate::classify::{classify, Outcome};
pub use crate::client::{Recover, RestfulClient};
pub use crate::config::{ClientSettings, ConfigProvider, ServiceConfig, ServiceDirectory};
pub use crate::core::{ClientBuilder, Headers, Method, Payload, RequestOptions, RequestSpec, TransportOutcome};
pub use crate::error::{ErrorContext, Result, ServiceError};
pub use crate::metrics::ClientMetrics;
pub use crate::reporting::{FnReporter, LogReporter, MemoryReporter, NoopReporter, Reporter};
pub use crate::resilience::{CircuitTransition, HealthOptions, HealthTracker, ServiceHealthRegistry};
pub use crate::transport::{ReqwestTransport, StubTransport, Transport};
pub use crate::util::{client_ip, set_client_ip, uri_join};

#[cfg(test)]
mod tests;

/// Create a new default client builder
pub fn client() -> ClientBuilder {
    ClientBuilder::new()
}
