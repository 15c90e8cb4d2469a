//! Canned responses for registered URLs
//!
//! `StubTransport` answers requests for registered URLs with queued
//! outcomes and forwards everything else to an inner transport, if any.
//! Every dispatched request is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::Transport;
use crate::core::{RequestSpec, TransportOutcome};
use crate::error::{Result, ServiceError};

#[derive(Debug, Clone)]
enum StubReply {
    Outcome(TransportOutcome),
    Fail(String),
}

#[derive(Default)]
struct StubState {
    /// Per URL; the last reply keeps answering once the others are used up
    replies: HashMap<String, VecDeque<StubReply>>,
    requests: Vec<RequestSpec>,
}

/// Transport serving canned outcomes
#[derive(Default)]
pub struct StubTransport {
    state: Mutex<StubState>,
    inner: Option<Arc<dyn Transport>>,
}

impl StubTransport {
    /// A stub with no fallback; unregistered URLs are unreachable
    pub fn new() -> Self {
        Self::default()
    }

    /// A stub that forwards unregistered URLs to `inner`
    pub fn wrapping(inner: Arc<dyn Transport>) -> Self {
        Self {
            state: Mutex::new(StubState::default()),
            inner: Some(inner),
        }
    }

    /// Queue an outcome for `url`
    pub fn stub(&self, url: impl Into<String>, outcome: TransportOutcome) -> &Self {
        self.push(url.into(), StubReply::Outcome(outcome));
        self
    }

    /// Queue a JSON response for `url`
    pub fn stub_json(&self, url: impl Into<String>, status: u16, body: &serde_json::Value) -> &Self {
        self.stub(url, TransportOutcome::response(status, body.to_string()))
    }

    /// Queue a transport failure (no outcome at all) for `url`
    pub fn stub_failure(&self, url: impl Into<String>, message: impl Into<String>) -> &Self {
        self.push(url.into(), StubReply::Fail(message.into()));
        self
    }

    /// Drop every stub for `url`
    pub fn clear(&self, url: &str) {
        self.lock().replies.remove(url);
    }

    /// Requests dispatched so far, in order
    pub fn requests(&self) -> Vec<RequestSpec> {
        self.lock().requests.clone()
    }

    /// Number of requests dispatched so far
    pub fn dispatch_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn push(&self, url: String, reply: StubReply) {
        self.lock().replies.entry(url).or_default().push_back(reply);
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_reply(&self, request: &RequestSpec) -> Option<StubReply> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        let queue = state.replies.get_mut(&request.url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &RequestSpec) -> Result<TransportOutcome> {
        match self.next_reply(request) {
            Some(StubReply::Outcome(outcome)) => {
                Ok(outcome.with_effective_url(request.url.clone()))
            }
            Some(StubReply::Fail(message)) => Err(ServiceError::transport(message)),
            None => match self.inner {
                Some(ref inner) => inner.send(request).await,
                None => Ok(TransportOutcome::unreachable("couldnt_connect")
                    .with_effective_url(request.url.clone())),
            },
        }
    }
}
