//! Resilience patterns for service calls
//!
//! This module provides:
//! - `HealthTracker`: the alive/down gate consulted before every call
//! - `ServiceHealthRegistry`: the default windowed circuit breaker
//! - `RetryPolicy` and `AttemptState`: timeout retry decisions for one call

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{HealthOptions, ServiceHealthRegistry, ServiceHealthSnapshot};
pub use retry::{AttemptState, RetryDecision, RetryPolicy};

use std::fmt;

/// Result of reporting a failure to a health tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitTransition {
    /// The failure was counted, the service stays up
    NoChange,

    /// This failure took the service down
    Tripped,

    /// The service was already down
    AlreadyDown,
}

impl fmt::Display for CircuitTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChange => write!(f, "NoChange"),
            Self::Tripped => write!(f, "Tripped"),
            Self::AlreadyDown => write!(f, "AlreadyDown"),
        }
    }
}

/// Per-service alive/down state shared by every call.
///
/// Implementations are called concurrently from many requests and must do
/// their own synchronization.
#[cfg_attr(test, mockall::automock)]
pub trait HealthTracker: Send + Sync {
    /// Whether calls to `service` may be dispatched
    fn is_alive(&self, service: &str) -> bool;

    /// Count one failed call against `service`
    fn record_failure(&self, service: &str) -> CircuitTransition;
}
