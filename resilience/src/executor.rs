//! Resilient action executor
//!
//! Runs one UI operation under a per-attempt timeout, retries it with
//! exponential backoff and consults a shared circuit breaker before every
//! attempt. Outcomes are always returned to the caller; nothing here decides
//! to abort a run.

use crate::circuit_breaker::{Admission, CircuitBreaker};
use crate::config::{ResilienceConfig, RetryPolicy};
use crate::error::ActionError;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    config: ResilienceConfig,
    breaker: Arc<CircuitBreaker>,
    cancel: CancellationToken,
}

impl ResilientExecutor {
    /// Executor with its own breaker
    pub fn new(config: ResilienceConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        Self::with_breaker(config, breaker)
    }

    /// Executor sharing `breaker` with other sessions
    pub fn with_breaker(config: ResilienceConfig, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            config,
            breaker,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight attempts and backoff waits when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `action` until it succeeds, the policy is exhausted or the circuit
    /// opens.
    ///
    /// `policy` takes precedence over any configured override for
    /// `operation`, which in turn takes precedence over the global policy.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        mut action: F,
        timeout: Duration,
        policy: Option<RetryPolicy>,
    ) -> Result<T, ActionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let policy = policy.unwrap_or_else(|| self.config.policy_for(operation));
        let max_attempts = policy.max_attempts.max(1);
        let waits = policy.waits();
        let mut attempts: u32 = 0;
        let mut last_failure: Option<ActionError> = None;

        tracing::debug!(
            operation,
            max_attempts,
            timeout_ms = timeout.as_millis() as u64,
            "operation_start"
        );

        loop {
            let admission = match self.breaker.try_acquire() {
                Ok(admission) => admission,
                Err(retry_in) => {
                    tracing::warn!(
                        operation,
                        attempts,
                        retry_in_ms = retry_in.as_millis() as u64,
                        "circuit open, failing fast"
                    );
                    return Err(ActionError::CircuitOpen {
                        operation: operation.to_string(),
                        attempts,
                        last_failure: last_failure.map(Box::new),
                    });
                }
            };
            attempts += 1;
            if admission == Admission::Trial {
                tracing::info!(operation, "circuit half-open, trial attempt");
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(self.cancelled(operation, attempts));
                }
                outcome = tokio::time::timeout(timeout, action()) => outcome,
            };

            let failure = match outcome {
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    if attempts > 1 {
                        tracing::info!(operation, attempts, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => ActionError::Failed {
                    operation: operation.to_string(),
                    attempts,
                    last_error: e.to_string(),
                },
                Err(_) => {
                    tracing::warn!(
                        operation,
                        attempt = attempts,
                        timeout_ms = timeout.as_millis() as u64,
                        "operation_timeout"
                    );
                    ActionError::Timeout {
                        operation: operation.to_string(),
                        attempts,
                        timeout,
                    }
                }
            };
            self.breaker.record_failure();

            if attempts >= max_attempts {
                tracing::warn!(
                    operation,
                    attempts,
                    error = %failure,
                    "operation_failed_all_retries"
                );
                return Err(failure);
            }

            let wait = policy.wait_before(&waits, attempts as usize);
            tracing::info!(
                operation,
                attempt = attempts,
                wait_ms = wait.as_millis() as u64,
                error = %failure,
                "operation_retry"
            );
            last_failure = Some(failure);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(self.cancelled(operation, attempts));
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn cancelled(&self, operation: &str, attempts: u32) -> ActionError {
        tracing::info!(operation, attempts, "operation cancelled");
        ActionError::Cancelled {
            operation: operation.to_string(),
            attempts,
        }
    }
}
