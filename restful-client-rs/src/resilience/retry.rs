//! Timeout retry decisions
//!
//! Only timeouts are ever retried, and only for idempotent verbs. Retries
//! are immediate: the attempt timeout is the only pacing.

use std::fmt;

use crate::classify::Outcome;
use crate::core::Method;

/// Counters for one top-level call. Created fresh for every call and never
/// shared between calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptState {
    pub attempts_made: u32,
    pub timeout_count: u32,
}

impl AttemptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that one more attempt is being dispatched
    pub fn begin_attempt(&mut self) {
        self.attempts_made += 1;
    }

    /// Record one more timed out attempt
    pub fn record_timeout(&mut self) {
        self.timeout_count += 1;
    }
}

/// What to do after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    GiveUp,
}

/// Retry policy for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Timeouts tolerated before giving up
    pub max_retries: u32,

    /// False for POST and PUT, whatever `max_retries` says
    pub retry_timeouts: bool,
}

impl RetryPolicy {
    /// Policy for a call made with `method` against a service allowing `max_retries`
    pub fn for_call(method: Method, max_retries: u32) -> Self {
        Self {
            max_retries,
            retry_timeouts: method.is_idempotent(),
        }
    }

    /// Decide after an attempt. `state` must already count the outcome
    /// being judged (i.e. `record_timeout` was called for a timeout).
    pub fn decide(&self, outcome: &Outcome, state: &AttemptState) -> RetryDecision {
        match outcome {
            Outcome::Timeout if self.retry_timeouts && state.timeout_count <= self.max_retries => {
                RetryDecision::Retry
            }
            _ => RetryDecision::GiveUp,
        }
    }

    /// Upper bound on dispatches for one call
    pub fn max_attempts(&self) -> u32 {
        if self.retry_timeouts {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryPolicy {{ max_retries: {}, retry_timeouts: {} }}",
            self.max_retries, self.retry_timeouts
        )
    }
}
