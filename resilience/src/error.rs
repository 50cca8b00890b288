//! Resilience error types

use std::time::Duration;
use thiserror::Error;

/// Where an invocation ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Attempting,
    Succeeded,
    CircuitOpen,
    Failed,
}

/// Terminal failure of one [`crate::ResilientExecutor::execute`] call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    /// The last attempt exceeded its timeout
    #[error("{operation} timed out after {attempts} attempt(s) ({timeout:?} each)")]
    Timeout {
        operation: String,
        attempts: u32,
        timeout: Duration,
    },

    /// The last attempt returned an error
    #[error("{operation} failed after {attempts} attempt(s): {last_error}")]
    Failed {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// Rejected by the circuit breaker without attempting the action
    #[error("circuit open, {operation} not attempted ({attempts} attempt(s) made)")]
    CircuitOpen {
        operation: String,
        attempts: u32,
        /// Failure of this call's previous attempt, when the breaker tripped mid-retry
        #[source]
        last_failure: Option<Box<ActionError>>,
    },

    /// The executor was cancelled while waiting
    #[error("{operation} cancelled after {attempts} attempt(s)")]
    Cancelled { operation: String, attempts: u32 },
}

impl ActionError {
    pub fn state(&self) -> InvocationState {
        match self {
            Self::CircuitOpen { .. } => InvocationState::CircuitOpen,
            Self::Timeout { .. } | Self::Failed { .. } | Self::Cancelled { .. } => {
                InvocationState::Failed
            }
        }
    }

    pub fn operation(&self) -> &str {
        match self {
            Self::Timeout { operation, .. }
            | Self::Failed { operation, .. }
            | Self::CircuitOpen { operation, .. }
            | Self::Cancelled { operation, .. } => operation,
        }
    }

    /// Attempts actually made
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::CircuitOpen { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Invalid retry or breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid retry policy for {scope}: {reason}")]
    InvalidPolicy { scope: String, reason: String },
}
