//! Core types shared by the request pipeline
//!
//! - `Method`: the four verbs the client speaks
//! - `Headers`: ordered, case-sensitive header list
//! - `RequestOptions`: per-call overrides supplied by the caller
//! - `RequestSpec`: one fully built outbound request
//! - `TransportOutcome`: what one physical attempt produced
//! - `ClientBuilder`: builder for `RestfulClient`

pub mod builder;
pub mod payload;

pub use builder::ClientBuilder;
pub use payload::{prepare_body, Payload};

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// HTTP verbs supported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// GET and DELETE may be re-dispatched after a timeout; POST and PUT never are
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
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
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Ordered header list. Keys are compared case-sensitively and a later
/// insert of the same key replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Insert a header and return self (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Merge `other` into self, `other` winning on equal keys
    pub fn merge(&mut self, other: &Headers) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (key, value) in iter {
            headers.insert(key, value);
        }
        headers
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Headers that win over the client defaults
    pub headers: Headers,

    /// Query string parameters
    pub query: Option<BTreeMap<String, String>>,

    /// Replaces the service's configured timeout for this call
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a per-call header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Override the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One outbound request, built once per call and reused for every attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub query: Option<BTreeMap<String, String>>,
}

/// Result of one physical attempt, as seen by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOutcome {
    /// HTTP status, 0 when no response was received
    pub status_code: u16,

    pub body: Vec<u8>,

    pub timed_out: bool,

    /// URL the response finally came from
    pub effective_url: String,

    pub elapsed: Duration,

    /// Low-level reason when the transport could not get a response
    pub transport_error: Option<String>,
}

impl TransportOutcome {
    /// A response that reached us with the given status and body
    pub fn response(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            body: body.into(),
            timed_out: false,
            effective_url: String::new(),
            elapsed: Duration::ZERO,
            transport_error: None,
        }
    }

    /// An attempt abandoned at the deadline
    pub fn timed_out(elapsed: Duration) -> Self {
        Self {
            status_code: 0,
            body: Vec::new(),
            timed_out: true,
            effective_url: String::new(),
            elapsed,
            transport_error: Some("operation_timedout".to_string()),
        }
    }

    /// An attempt that never got an HTTP response
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            body: Vec::new(),
            timed_out: false,
            effective_url: String::new(),
            elapsed: Duration::ZERO,
            transport_error: Some(reason.into()),
        }
    }

    pub fn with_effective_url(mut self, url: impl Into<String>) -> Self {
        self.effective_url = url.into();
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Transport return code for log lines, "ok" when the response arrived
    pub fn return_code(&self) -> &str {
        self.transport_error.as_deref().unwrap_or("ok")
    }
}
