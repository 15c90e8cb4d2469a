//! Windowed circuit breaker keyed by service name
//!
//! A service goes down once `max_errors` failures land inside
//! `time_window`, and is brought back up by the first `is_alive` check after
//! `grace_period` has passed.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{CircuitTransition, HealthTracker};

pub const DEFAULT_TIME_WINDOW_SECS: u64 = 20;
pub const DEFAULT_MAX_ERRORS: usize = 10;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 120;

/// Breaker options for one service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthOptions {
    /// Failures older than this are forgotten
    pub time_window: Duration,

    /// Failures inside the window that take the service down
    pub max_errors: usize,

    /// How long a service stays down before it is probed again
    pub grace_period: Duration,
}

impl Default for HealthOptions {
    fn default() -> Self {
        Self {
            time_window: Duration::from_secs(DEFAULT_TIME_WINDOW_SECS),
            max_errors: DEFAULT_MAX_ERRORS,
            grace_period: Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS),
        }
    }
}

#[derive(Debug)]
struct ServiceHealth {
    options: HealthOptions,
    failures: VecDeque<Instant>,
    down_since: Option<Instant>,
    down_reason: Option<String>,
}

impl ServiceHealth {
    fn new(options: HealthOptions) -> Self {
        Self {
            options,
            failures: VecDeque::new(),
            down_since: None,
            down_reason: None,
        }
    }

    fn forget_aged(&mut self, now: Instant) {
        while let Some(oldest) = self.failures.front() {
            if now.duration_since(*oldest) > self.options.time_window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn bring_up(&mut self) {
        self.failures.clear();
        self.down_since = None;
        self.down_reason = None;
    }
}

/// Read-only view of one service's breaker state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealthSnapshot {
    pub alive: bool,
    pub failures_in_window: usize,
    pub down_for: Option<Duration>,
    pub down_reason: Option<String>,
    pub options: HealthOptions,
}

/// Thread-safe registry of per-service breaker state
#[derive(Debug, Default)]
pub struct ServiceHealthRegistry {
    services: Mutex<HashMap<String, ServiceHealth>>,
    default_options: HealthOptions,
}

impl ServiceHealthRegistry {
    /// Create an empty registry using the default options for unknown services
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with custom options for unknown services
    pub fn with_default_options(options: HealthOptions) -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
            default_options: options,
        }
    }

    /// Register (or re-register) a service, resetting its state
    pub fn register(&self, service: impl Into<String>, options: HealthOptions) {
        let service = service.into();
        log::debug!("Registering {} with health options {:?}", service, options);
        self.lock().insert(service, ServiceHealth::new(options));
    }

    pub fn is_registered(&self, service: &str) -> bool {
        self.lock().contains_key(service)
    }

    /// Bring a service back up immediately
    pub fn reset(&self, service: &str) {
        if let Some(health) = self.lock().get_mut(service) {
            health.bring_up();
        }
    }

    /// Take a service down by hand
    pub fn mark_down(&self, service: &str, reason: impl Into<String>) {
        let default_options = self.default_options;
        let mut services = self.lock();
        let health = services
            .entry(service.to_string())
            .or_insert_with(|| ServiceHealth::new(default_options));
        health.down_since = Some(Instant::now());
        health.down_reason = Some(reason.into());
    }

    pub fn snapshot(&self, service: &str) -> Option<ServiceHealthSnapshot> {
        let now = Instant::now();
        let mut services = self.lock();
        let health = services.get_mut(service)?;
        health.forget_aged(now);

        Some(ServiceHealthSnapshot {
            alive: health.down_since.is_none(),
            failures_in_window: health.failures.len(),
            down_for: health.down_since.map(|since| now.duration_since(since)),
            down_reason: health.down_reason.clone(),
            options: health.options,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ServiceHealth>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HealthTracker for ServiceHealthRegistry {
    fn is_alive(&self, service: &str) -> bool {
        let mut services = self.lock();
        let Some(health) = services.get_mut(service) else {
            return true;
        };

        match health.down_since {
            None => true,
            Some(since) if since.elapsed() >= health.options.grace_period => {
                log::info!("Grace period over for {}, bringing it back up", service);
                health.bring_up();
                true
            }
            Some(_) => false,
        }
    }

    fn record_failure(&self, service: &str) -> CircuitTransition {
        let now = Instant::now();
        let default_options = self.default_options;
        let mut services = self.lock();
        let health = services
            .entry(service.to_string())
            .or_insert_with(|| ServiceHealth::new(default_options));

        if health.down_since.is_some() {
            log::debug!("Failure recorded for {} while already down", service);
            return CircuitTransition::AlreadyDown;
        }

        health.failures.push_back(now);
        health.forget_aged(now);

        if health.failures.len() >= health.options.max_errors {
            let reason = format!(
                "Max error count ({}) reached within {:?}",
                health.options.max_errors, health.options.time_window
            );
            log::warn!("Taking {} down: {}", service, reason);
            health.down_since = Some(now);
            health.down_reason = Some(reason);
            CircuitTransition::Tripped
        } else {
            CircuitTransition::NoChange
        }
    }
}
