//! Retry policy and circuit breaker configuration

use crate::error::PolicyError;
use backon::{BackoffBuilder, ExponentialBuilder};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Spread applied to each wait when jitter is on (±20%)
pub const JITTER_FACTOR: f64 = 0.2;

/// Operation name used by the navigator for the final submit click
pub const SUBMIT_OPERATION: &str = "submit_application";

/// Upper bound on any single wait between attempts
pub const WAIT_CEILING: Duration = Duration::from_secs(3600);

/// Retry policy for one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first; `1` means no retry
    pub max_attempts: u32,

    /// Wait before the second attempt, in seconds
    pub initial_wait: f64,

    /// Upper bound for any single wait, in seconds
    pub max_wait: f64,

    /// Growth factor between consecutive waits
    pub backoff_base: f64,

    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_wait: 1.0,
            max_wait: 10.0,
            backoff_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Apply an override; fields it leaves unset keep their value.
    pub fn merged(&self, over: &RetryOverride) -> Self {
        Self {
            max_attempts: over.max_attempts.unwrap_or(self.max_attempts),
            initial_wait: over.initial_wait.unwrap_or(self.initial_wait),
            max_wait: over.max_wait.unwrap_or(self.max_wait),
            backoff_base: over.backoff_base.unwrap_or(self.backoff_base),
            jitter: over.jitter.unwrap_or(self.jitter),
        }
    }

    /// Waits between attempts before jitter:
    /// `min(max_wait, initial_wait * backoff_base^(n-1))` for `n` in `1..max_attempts`.
    pub fn waits(&self) -> Vec<Duration> {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        if retries == 0 {
            return Vec::new();
        }
        ExponentialBuilder::default()
            .with_min_delay(wait_duration(self.initial_wait))
            .with_max_delay(wait_duration(self.max_wait))
            .with_factor(self.backoff_base as f32)
            .with_max_times(retries)
            .build()
            .collect()
    }

    /// Wait to apply before retry number `retry` (1-based), jittered if enabled
    pub fn wait_before(&self, waits: &[Duration], retry: usize) -> Duration {
        let base = waits
            .get(retry.saturating_sub(1))
            .or_else(|| waits.last())
            .copied()
            .unwrap_or_default();
        if self.jitter {
            apply_jitter(base, JITTER_FACTOR)
        } else {
            base
        }
    }

    pub fn validate(&self, scope: &str) -> Result<(), PolicyError> {
        let invalid = |reason: String| PolicyError::InvalidPolicy {
            scope: scope.to_string(),
            reason,
        };
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts must be at least 1".to_string()));
        }
        if !(self.initial_wait.is_finite() && self.initial_wait >= 0.0) {
            return Err(invalid(format!("initial_wait must be >= 0, got {}", self.initial_wait)));
        }
        if !(self.max_wait.is_finite() && self.max_wait >= self.initial_wait) {
            return Err(invalid(format!(
                "max_wait must be >= initial_wait, got {}",
                self.max_wait
            )));
        }
        if !(self.backoff_base.is_finite() && self.backoff_base >= 1.0) {
            return Err(invalid(format!("backoff_base must be >= 1, got {}", self.backoff_base)));
        }
        Ok(())
    }
}

/// Per-operation partial policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_wait: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_base: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed attempts that open the circuit
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a trial attempt is allowed
    pub recovery_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Global policy
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Operation name → partial policy layered over `retry`
    #[serde(default = "default_overrides")]
    pub overrides: BTreeMap<String, RetryOverride>,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

fn default_overrides() -> BTreeMap<String, RetryOverride> {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        SUBMIT_OPERATION.to_string(),
        RetryOverride {
            max_attempts: Some(1),
            ..RetryOverride::default()
        },
    );
    overrides
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            overrides: default_overrides(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ResilienceConfig {
    /// Effective policy for `operation`
    pub fn policy_for(&self, operation: &str) -> RetryPolicy {
        match self.overrides.get(operation) {
            Some(over) => self.retry.merged(over),
            None => self.retry.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        self.retry.validate("retry")?;
        for name in self.overrides.keys() {
            self.policy_for(name).validate(&format!("overrides.{name}"))?;
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(PolicyError::InvalidPolicy {
                scope: "circuit_breaker".to_string(),
                reason: "failure_threshold must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Randomize `duration` by up to ±`jitter_factor`
pub fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if duration.is_zero() || jitter_factor <= 0.0 {
        return duration;
    }
    let jitter = rand::rng().random_range(-jitter_factor..=jitter_factor);
    let jittered_ms = (duration.as_millis() as f64 * (1.0 + jitter)).max(0.0) as u64;
    Duration::from_millis(jittered_ms)
}

/// Seconds to a wait, clamped to `0..=WAIT_CEILING`; NaN counts as zero.
fn wait_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).map_or(WAIT_CEILING, |d| d.min(WAIT_CEILING))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_huge_or_infinite_waits_are_capped() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_wait: 1e20,
            max_wait: f64::INFINITY,
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.waits(), vec![WAIT_CEILING, WAIT_CEILING]);

        assert_eq!(wait_duration(f64::NAN), Duration::ZERO);
        assert_eq!(wait_duration(-3.0), Duration::ZERO);
        assert_eq!(wait_duration(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn test_default_waits() {
        let policy = RetryPolicy {
            max_attempts: 6,
            ..RetryPolicy::default()
        };
        let secs: Vec<u64> = policy.waits().iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 10]);
        assert!(RetryPolicy::no_retry().waits().is_empty());
    }

    #[test]
    fn test_wait_before_without_jitter() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        let waits = policy.waits();
        assert_eq!(policy.wait_before(&waits, 1), Duration::from_secs(1));
        assert_eq!(policy.wait_before(&waits, 2), Duration::from_secs(2));
    }

    #[test]
    fn test_jitter_range() {
        for _ in 0..100 {
            let ms = apply_jitter(Duration::from_millis(1000), JITTER_FACTOR).as_millis();
            assert!((800..=1200).contains(&ms), "jittered {ms}ms out of range");
        }
    }

    #[test]
    fn test_submit_override_by_default() {
        let config = ResilienceConfig::default();
        assert_eq!(config.policy_for(SUBMIT_OPERATION).max_attempts, 1);
        assert_eq!(config.policy_for("click_next").max_attempts, 3);
    }

    #[test]
    fn test_partial_override_keeps_global_fields() {
        let config: ResilienceConfig = serde_json::from_str(
            r#"{"retry": {"initial_wait": 0.5}, "overrides": {"fill": {"max_attempts": 5}}}"#,
        )
        .expect("parse");
        let fill = config.policy_for("fill");
        assert_eq!(fill.max_attempts, 5);
        assert_eq!(fill.initial_wait, 0.5);
        assert_eq!(fill.max_wait, 10.0);
        // An explicit overrides table replaces the defaults.
        assert_eq!(config.policy_for(SUBMIT_OPERATION).max_attempts, 3);
    }

    #[test]
    fn test_validate() {
        assert!(ResilienceConfig::default().validate().is_ok());

        let mut config = ResilienceConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = ResilienceConfig::default();
        config.overrides.insert(
            "slow".to_string(),
            RetryOverride {
                backoff_base: Some(0.5),
                ..RetryOverride::default()
            },
        );
        let err = config.validate().expect_err("invalid");
        assert!(err.to_string().contains("overrides.slow"));
    }
}
