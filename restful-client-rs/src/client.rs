//! Request execution
//!
//! `RestfulClient` runs every call through the same pipeline:
//!
//! 1. resolve the service in the `ServiceDirectory`
//! 2. refuse the call if the health tracker has the service down
//! 3. build one `RequestSpec` and dispatch it, retrying timeouts of
//!    idempotent verbs
//! 4. classify each attempt, report failures and feed the final failure
//!    of a call to the health tracker
//!
//! Calls return `Result<Option<T>>`; `Ok(None)` is the empty result (empty
//! body, 4xx). Callers that want a fallback instead of an error use
//! [`Recover`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::Instrument;

use crate::classify::{classify, Outcome};
use crate::config::{ServiceConfig, ServiceDirectory};
use crate::core::payload::APPLICATION_JSON;
use crate::core::{prepare_body, ClientBuilder, Headers, Method, Payload, RequestOptions, RequestSpec, TransportOutcome};
use crate::error::{ErrorContext, Result, ServiceError};
use crate::metrics::ClientMetrics;
use crate::reporting::{dispatch_report, Reporter, CIRCUIT_BREAKER, REST_ERROR};
use crate::resilience::{AttemptState, CircuitTransition, HealthTracker, RetryDecision, RetryPolicy};
use crate::transport::Transport;
use crate::util::{client_ip, generate_request_id, sanitize_for_logging, truncate_string, uri_join};

pub const ACCEPT: &str = "Accept";
pub const USER_AGENT: &str = "User-Agent";
pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

/// Longest response body echoed into a log line
const MAX_LOGGED_BODY: usize = 512;

/// Resilient client for the services of a `ServiceDirectory`
#[derive(Clone)]
pub struct RestfulClient {
    directory: Arc<ServiceDirectory>,
    health: Arc<dyn HealthTracker>,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    metrics: Arc<ClientMetrics>,
}

impl RestfulClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        directory: ServiceDirectory,
        health: Arc<dyn HealthTracker>,
        transport: Arc<dyn Transport>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            directory: Arc::new(directory),
            health,
            transport,
            reporter,
            metrics: Arc::new(ClientMetrics::new()),
        }
    }

    pub fn directory(&self) -> &ServiceDirectory {
        &self.directory
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Base URL of `service`, for callers building requests of their own
    pub fn service_url(&self, service: &str) -> Result<&str> {
        Ok(self.directory.resolve(service)?.base_url.as_str())
    }

    /// Full URL a call to `service` at `path` is sent to
    pub fn endpoint_url(&self, service: &str, path: &str) -> Result<String> {
        Ok(uri_join(self.service_url(service)?, path))
    }

    pub async fn get(&self, service: &str, path: &str, options: RequestOptions) -> Result<Option<Value>> {
        self.execute(Method::Get, service, path, Payload::None, options).await
    }

    pub async fn post(
        &self,
        service: &str,
        path: &str,
        payload: impl Into<Payload>,
        options: RequestOptions,
    ) -> Result<Option<Value>> {
        self.execute(Method::Post, service, path, payload.into(), options).await
    }

    pub async fn put(
        &self,
        service: &str,
        path: &str,
        payload: impl Into<Payload>,
        options: RequestOptions,
    ) -> Result<Option<Value>> {
        self.execute(Method::Put, service, path, payload.into(), options).await
    }

    pub async fn delete(
        &self,
        service: &str,
        path: &str,
        payload: impl Into<Payload>,
        options: RequestOptions,
    ) -> Result<Option<Value>> {
        self.execute(Method::Delete, service, path, payload.into(), options).await
    }

    /// Run one call and decode a successful body into `R`
    pub async fn execute<R: DeserializeOwned>(
        &self,
        method: Method,
        service: &str,
        path: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<Option<R>> {
        let request_id = generate_request_id();
        let span = tracing::info_span!(
            "restful_call",
            service = %service,
            method = %method,
            request_id = %request_id
        );

        self.execute_inner(method, service, path, payload, options, &request_id)
            .instrument(span)
            .await
    }

    async fn execute_inner<R: DeserializeOwned>(
        &self,
        method: Method,
        service: &str,
        path: &str,
        payload: Payload,
        options: RequestOptions,
        request_id: &str,
    ) -> Result<Option<R>> {
        let context = ErrorContext::for_service(service).request_id(request_id);

        let config = self
            .directory
            .resolve(service)
            .map_err(|e| e.with_context(context.clone()))?;

        let url = uri_join(&config.base_url, path);
        let context = context.endpoint(sanitize_for_logging(&url));

        if config.use_circuit_breaker && !self.health.is_alive(service) {
            log::warn!("{} set as down, {} {} not dispatched", service, method, sanitize_for_logging(&url));
            self.metrics.record_short_circuit();
            return Err(ServiceError::service_down(service).with_context(context));
        }

        let result = match build_request(method, config, url, &payload, &options) {
            Ok(request) => {
                let policy = RetryPolicy::for_call(method, config.max_retries);
                self.run_attempts::<R>(service, &request, &policy).await
            }
            Err(err) => Err(err),
        };

        result.map_err(|err| self.handle_failure(service, config, err).with_context(context))
    }

    /// Dispatch until an attempt settles the call
    async fn run_attempts<R: DeserializeOwned>(
        &self,
        service: &str,
        request: &RequestSpec,
        policy: &RetryPolicy,
    ) -> Result<Option<R>> {
        let mut state = AttemptState::new();

        loop {
            state.begin_attempt();
            self.metrics
                .record_request(service, request.body.as_ref().map_or(0, Vec::len));

            log::debug!(
                "{} :: Request :: {} {} (attempt {} of at most {})",
                service,
                request.method,
                sanitize_for_logging(&request.url),
                state.attempts_made,
                policy.max_attempts()
            );

            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(err) => {
                    self.metrics.record_transport_error();
                    return Err(err);
                }
            };
            self.metrics.record_bytes_received(response.body.len());

            let classified = match classify(&response) {
                Outcome::Success(value) => match R::deserialize(&value) {
                    Ok(decoded) => {
                        log::debug!(
                            "Success in {} :: Code: {}, {}",
                            request.method,
                            response.status_code,
                            truncate_string(&value.to_string(), MAX_LOGGED_BODY)
                        );
                        self.metrics.record_outcome(&Outcome::Success(value));
                        return Ok(Some(decoded));
                    }
                    Err(e) => Outcome::DecodeFailure {
                        raw: value.to_string(),
                        cause: e.to_string(),
                    },
                },
                other => other,
            };
            self.metrics.record_outcome(&classified);

            let failure = failure_for(&classified, &response);
            if classified.is_reported() {
                let description = describe(classified.label(), request, &response);
                log::error!("{}", description);
                dispatch_report(self.reporter.as_ref(), REST_ERROR, &description, failure.as_ref());
            }

            match &classified {
                Outcome::Timeout => {
                    state.record_timeout();
                    if policy.decide(&classified, &state) == RetryDecision::Retry {
                        log::debug!(
                            "Retrying {} after timeout {} of {}",
                            service,
                            state.timeout_count,
                            policy.max_retries
                        );
                        continue;
                    }
                }
                Outcome::EmptyBody => {
                    log::debug!("Success in {} :: Code: {}, empty body", request.method, response.status_code);
                }
                Outcome::ClientError { .. } => {
                    log::warn!("{}", describe(classified.label(), request, &response));
                }
                Outcome::DecodeFailure { raw, .. } => {
                    log::error!(
                        "Response from {} is not a valid json - [{}]",
                        sanitize_for_logging(&response.effective_url),
                        truncate_string(raw, MAX_LOGGED_BODY)
                    );
                }
                _ => {}
            }

            return match failure {
                Some(err) => Err(err),
                None => Ok(None),
            };
        }
    }

    /// Feed a failed call to the health tracker and escalate a trip
    fn handle_failure(&self, service: &str, config: &ServiceConfig, err: ServiceError) -> ServiceError {
        log::error!("{} call to {} failed: {}", err.kind(), service, err);

        if !config.use_circuit_breaker || err.is_configuration() {
            return err;
        }

        let transition = self.health.record_failure(service);
        log::debug!("Failure recorded for {}: {}", service, transition);

        if transition == CircuitTransition::Tripped {
            dispatch_report(
                self.reporter.as_ref(),
                CIRCUIT_BREAKER,
                &format!("Service {} was taken down as a result of exception", service),
                Some(&err),
            );
        }

        err
    }
}

/// Build the request shared by every attempt of one call
fn build_request(
    method: Method,
    config: &ServiceConfig,
    url: String,
    payload: &Payload,
    options: &RequestOptions,
) -> Result<RequestSpec> {
    let (prepared, body) = prepare_body(payload, &options.headers)?;

    let mut headers = Headers::new().with(ACCEPT, APPLICATION_JSON);
    headers.merge(&prepared);

    if let Some(ip) = client_ip() {
        headers.insert(X_FORWARDED_FOR, ip);
    }
    headers.insert(USER_AGENT, config.user_agent.clone());

    Ok(RequestSpec {
        method,
        url,
        headers,
        body,
        timeout: options.timeout.unwrap_or(config.timeout),
        query: options.query.clone(),
    })
}

/// Error a call ends with for an attempt that settled as `outcome`
fn failure_for(outcome: &Outcome, response: &TransportOutcome) -> Option<ServiceError> {
    match outcome {
        Outcome::Success(_) | Outcome::EmptyBody | Outcome::ClientError { .. } => None,
        Outcome::Timeout => Some(ServiceError::timeout(response.return_code())),
        Outcome::HttpError { reason } => Some(ServiceError::http(reason.clone())),
        Outcome::ServerError { status } | Outcome::BadReturnCode { status } => {
            Some(ServiceError::bad_return_code(*status, response.return_code()))
        }
        Outcome::DecodeFailure { cause, .. } => Some(ServiceError::decode(cause.clone())),
    }
}

/// One-line account of a failed attempt, safe for logs and reports
fn describe(kind: &str, request: &RequestSpec, outcome: &TransportOutcome) -> String {
    sanitize_for_logging(&format!(
        "{} {}/{} for: {}, {}, Total time: {:.3} seconds",
        kind,
        outcome.status_code,
        outcome.return_code(),
        request.method,
        request.url,
        outcome.elapsed.as_secs_f64()
    ))
}

/// Fallbacks for call results
pub trait Recover<T> {
    /// Replace any failure except a configuration error with the value of
    /// `recover`, which receives a description of the failure
    fn or_recover<F>(self, recover: F) -> Result<Option<T>>
    where
        F: FnOnce(String) -> Option<T>;

    /// Treat a service that is down as an empty result
    fn or_empty(self) -> Result<Option<T>>;
}

impl<T> Recover<T> for Result<Option<T>> {
    fn or_recover<F>(self, recover: F) -> Result<Option<T>>
    where
        F: FnOnce(String) -> Option<T>,
    {
        match self {
            Err(err) if !err.is_configuration() => Ok(recover(err.recovery_message())),
            other => other,
        }
    }

    fn or_empty(self) -> Result<Option<T>> {
        match self {
            Err(err) if err.is_service_down() => Ok(None),
            other => other,
        }
    }
}
