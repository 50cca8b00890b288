//! Retry, timeout and circuit-breaker discipline for actions against a
//! flaky, high-latency UI surface.
//!
//! - Exponential backoff with jitter (`backon` schedule, ±20% jitter)
//! - Per-operation policy overrides, e.g. a single attempt for submit
//! - One breaker shared by every operation of a session, or across sessions
//! - Per-attempt timeouts reported separately from action errors

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod executor;

pub use circuit_breaker::{Admission, BreakerMetrics, CircuitBreaker, CircuitState};
pub use config::{
    CircuitBreakerConfig, ResilienceConfig, RetryOverride, RetryPolicy, SUBMIT_OPERATION,
};
pub use error::{ActionError, InvocationState, PolicyError};
pub use executor::ResilientExecutor;
