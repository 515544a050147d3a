//! Circuit breaking for column stores and remote calls.
//!
//! ```text
//! +--------+     failures >= threshold     +------+
//! | Closed | --------------------------->  | Open |
//! +--------+                               +------+
//!     ^                                        |
//!     |  success                               | reset timeout elapsed
//!     |                                        v
//!     +--------------------------------  +-----------+
//!                                        | Half-Open |
//!                                        +-----------+
//! ```
//!
//! [`ResilientColumnStore`] wraps any [`ColumnStore`]; the geo RPC client keeps
//! one [`CircuitBreaker`] per remote site.

use super::traits::{Column, ColumnRange, ColumnStore};
use crate::{Error, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResilienceConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub reset_timeout_ms: u64,
    /// Maximum trial calls while half-open.
    pub half_open_max_calls: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_max_calls: 1,
        }
    }
}

impl ResilienceConfig {
    /// Loads configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `RECLAIM_BREAKER_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<u32>("RECLAIM_BREAKER_FAILURE_THRESHOLD") {
            self.failure_threshold = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("RECLAIM_BREAKER_RESET_MS") {
            self.reset_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u32>("RECLAIM_BREAKER_HALF_OPEN_MAX_CALLS") {
            self.half_open_max_calls = v.max(1);
        }
        self
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the reset timeout in milliseconds.
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.reset_timeout_ms = timeout_ms;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
    name: String,
}

impl CircuitBreaker {
    /// Creates a closed breaker guarding the resource `name`.
    #[must_use]
    pub fn new(config: &ResilienceConfig, name: impl Into<String>) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
            half_open_max_calls: config.half_open_max_calls.max(1),
            name: name.into(),
        }
    }

    /// Returns `true` if a call may proceed.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    tracing::info!(resource = %self.name, "Circuit breaker half-open");
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    /// Records a successful call and closes the circuit.
    pub fn on_success(&mut self) {
        if !matches!(self.state, BreakerState::Closed { failures: 0 }) {
            tracing::info!(resource = %self.name, "Circuit breaker closed");
        }
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failed call. Returns `true` if the circuit just opened.
    pub fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures < self.failure_threshold {
                    return false;
                }
                tracing::warn!(
                    resource = %self.name,
                    failures = *failures,
                    "Circuit breaker opened after consecutive failures"
                );
            },
            BreakerState::HalfOpen { .. } => {
                tracing::warn!(resource = %self.name, "Circuit breaker re-opened");
            },
            BreakerState::Open { .. } => return false,
        }
        self.state = BreakerState::Open {
            opened_at: Instant::now(),
        };
        true
    }

    /// Returns the state as a gauge value: 0 closed, 1 open, 2 half-open.
    #[must_use]
    pub const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }

    /// Returns the guarded resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Column store wrapper with circuit breaker protection.
///
/// An open circuit fails fast with [`Error::QueryFailed`].
pub struct ResilientColumnStore<S: ColumnStore> {
    inner: S,
    breaker: Mutex<CircuitBreaker>,
}

impl<S: ColumnStore> ResilientColumnStore<S> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: S, config: &ResilienceConfig) -> Self {
        let name = inner.backend_name();
        Self {
            inner,
            breaker: Mutex::new(CircuitBreaker::new(config, name)),
        }
    }

    /// Returns the wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn execute<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let backend = self.inner.backend_name();
        let mut breaker = self
            .breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !breaker.allow() {
            let state = breaker.state_value();
            drop(breaker);
            record_metrics(backend, operation, "circuit_open", state);
            return Err(Error::QueryFailed {
                operation: format!("storage_{operation}"),
                cause: format!("circuit breaker open for backend '{backend}'"),
            });
        }
        drop(breaker);

        let result = call();

        let mut breaker = self
            .breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let status = if result.is_ok() {
            breaker.on_success();
            "success"
        } else {
            if breaker.on_failure() {
                metrics::counter!(
                    "storage_circuit_breaker_trips_total",
                    "backend" => backend,
                    "operation" => operation
                )
                .increment(1);
            }
            "error"
        };
        let state = breaker.state_value();
        drop(breaker);
        record_metrics(backend, operation, status, state);

        result
    }
}

fn record_metrics(backend: &'static str, operation: &'static str, status: &'static str, state: u8) {
    metrics::counter!(
        "storage_requests_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::gauge!("storage_circuit_breaker_state", "backend" => backend).set(f64::from(state));
}

impl<S: ColumnStore> ColumnStore for ResilientColumnStore<S> {
    fn put(&self, table: &str, row: &[u8], name: &[u8], value: &[u8]) -> Result<()> {
        self.execute("put", || self.inner.put(table, row, name, value))
    }

    fn get(&self, table: &str, row: &[u8], name: &[u8]) -> Result<Option<Vec<u8>>> {
        self.execute("get", || self.inner.get(table, row, name))
    }

    fn delete(&self, table: &str, row: &[u8], name: &[u8]) -> Result<bool> {
        self.execute("delete", || self.inner.delete(table, row, name))
    }

    fn scan(&self, table: &str, row: &[u8], range: &ColumnRange) -> Result<Vec<Column>> {
        self.execute("scan", || self.inner.scan(table, row, range))
    }

    fn compare_and_swap(
        &self,
        table: &str,
        row: &[u8],
        name: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool> {
        self.execute("compare_and_swap", || {
            self.inner.compare_and_swap(table, row, name, expected, new)
        })
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
