//! Client-side counters
//!
//! One `ClientMetrics` per `RestfulClient`, updated on every attempt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::classify::Outcome;

#[derive(Debug, Default)]
pub struct ClientMetrics {
    request_count: AtomicU64,
    success_count: AtomicU64,
    empty_count: AtomicU64,
    timeout_count: AtomicU64,
    http_error_count: AtomicU64,
    server_error_count: AtomicU64,
    client_error_count: AtomicU64,
    bad_return_code_count: AtomicU64,
    decode_failure_count: AtomicU64,
    transport_error_count: AtomicU64,
    short_circuit_count: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,

    /// Attempts per service
    service_requests: Mutex<HashMap<String, u64>>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one dispatched attempt
    pub(crate) fn record_request(&self, service: &str, bytes_sent: usize) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes_sent as u64, Ordering::Relaxed);

        let mut per_service = self
            .service_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *per_service.entry(service.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn record_bytes_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count one classified attempt
    pub(crate) fn record_outcome(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Success(_) => &self.success_count,
            Outcome::EmptyBody => &self.empty_count,
            Outcome::DecodeFailure { .. } => &self.decode_failure_count,
            Outcome::Timeout => &self.timeout_count,
            Outcome::HttpError { .. } => &self.http_error_count,
            Outcome::ServerError { .. } => &self.server_error_count,
            Outcome::ClientError { .. } => &self.client_error_count,
            Outcome::BadReturnCode { .. } => &self.bad_return_code_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_error(&self) {
        self.transport_error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a call refused because its service is down
    pub(crate) fn record_short_circuit(&self) {
        self.short_circuit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn short_circuit_count(&self) -> u64 {
        self.short_circuit_count.load(Ordering::Relaxed)
    }

    /// Attempts dispatched to `service` so far
    pub fn service_request_count(&self, service: &str) -> u64 {
        self.service_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .copied()
            .unwrap_or(0)
    }

    /// All counters as a map
    pub fn as_map(&self) -> HashMap<String, String> {
        let counters = [
            ("request_count", &self.request_count),
            ("success_count", &self.success_count),
            ("empty_count", &self.empty_count),
            ("timeout_count", &self.timeout_count),
            ("http_error_count", &self.http_error_count),
            ("server_error_count", &self.server_error_count),
            ("client_error_count", &self.client_error_count),
            ("bad_return_code_count", &self.bad_return_code_count),
            ("decode_failure_count", &self.decode_failure_count),
            ("transport_error_count", &self.transport_error_count),
            ("short_circuit_count", &self.short_circuit_count),
            ("bytes_sent", &self.bytes_sent),
            ("bytes_received", &self.bytes_received),
        ];

        counters
            .into_iter()
            .map(|(name, counter)| (name.to_string(), counter.load(Ordering::Relaxed).to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_land_in_their_counter() {
        let metrics = ClientMetrics::new();
        metrics.record_request("posts", 10);
        metrics.record_request("posts", 0);
        metrics.record_outcome(&Outcome::Timeout);
        metrics.record_outcome(&Outcome::ClientError { status: 404 });
        metrics.record_short_circuit();

        let map = metrics.as_map();
        assert_eq!(map["request_count"], "2");
        assert_eq!(map["timeout_count"], "1");
        assert_eq!(map["client_error_count"], "1");
        assert_eq!(map["short_circuit_count"], "1");
        assert_eq!(map["bytes_sent"], "10");
        assert_eq!(metrics.service_request_count("posts"), 2);
        assert_eq!(metrics.service_request_count("users"), 0);
    }
}
