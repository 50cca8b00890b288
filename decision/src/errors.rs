//! Decision engine error types
//!
//! Field-level errors are always recovered by the caller with a type default.
//! Nothing in this taxonomy is meant to abort a form-filling session.

use crate::signature::FieldType;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error category for structured logging and behavior mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed field context
    Signature,
    /// Malformed persisted rule, skipped at load
    RuleLoad,
    /// Rule store I/O or serialization failure
    Storage,
    /// Strategy kind not recognized or params malformed
    UnknownStrategy,
    /// Network, timeout or malformed reply from the reasoning service
    Reasoning,
    /// A learned rule failed validation
    ValidationRejected,
    /// Field type with no resolution behavior
    UnsupportedFieldType,
    /// Config file missing or invalid
    Config,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signature => "SIGNATURE",
            Self::RuleLoad => "RULE_LOAD",
            Self::Storage => "STORAGE",
            Self::UnknownStrategy => "UNKNOWN_STRATEGY",
            Self::Reasoning => "REASONING",
            Self::ValidationRejected => "VALIDATION_REJECTED",
            Self::UnsupportedFieldType => "UNSUPPORTED_FIELD_TYPE",
            Self::Config => "CONFIG",
        }
    }

    /// Whether the field can still be filled with its type default
    pub fn field_recoverable(&self) -> bool {
        !matches!(self, Self::Config)
    }
}

/// Top-level error for the decision crate
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("signature error: {0}")]
    Signature(String),

    #[error("unsupported field type: {0}")]
    UnsupportedFieldType(FieldType),

    #[error(transparent)]
    Store(#[from] RuleStoreError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    #[error("rule rejected: {0}")]
    ValidationRejected(#[from] Rejection),

    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DecisionError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Signature(_) => ErrorCategory::Signature,
            Self::UnsupportedFieldType(_) => ErrorCategory::UnsupportedFieldType,
            Self::Store(RuleStoreError::MalformedRule { .. }) => ErrorCategory::RuleLoad,
            Self::Store(_) => ErrorCategory::Storage,
            Self::Strategy(_) => ErrorCategory::UnknownStrategy,
            Self::Reasoning(_) => ErrorCategory::Reasoning,
            Self::ValidationRejected(_) => ErrorCategory::ValidationRejected,
            Self::Config { .. } => ErrorCategory::Config,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Rule store failures
#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("failed to read rule store {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write rule store {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule store {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize rule store: {0}")]
    Serialize(String),

    #[error("malformed rule at index {index}: {reason}")]
    MalformedRule { index: usize, reason: String },
}

/// Strategy creation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("unknown strategy kind: {0}")]
    Unknown(String),

    #[error("invalid params for strategy {kind}: {reason}")]
    InvalidParams { kind: String, reason: String },
}

/// Reasoning service failures; the engine degrades all of them to "no decision"
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("reasoning service not configured")]
    NotConfigured,

    #[error("reasoning request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("reasoning service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("reasoning call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed reasoning response: {0}")]
    MalformedResponse(String),
}

/// Why the learning pipeline dropped a suggestion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("no rule suggestion available")]
    NoSuggestion,

    #[error("pattern length {0} outside [3, 200]")]
    PatternLength(usize),

    #[error("pattern is not a valid regex: {0}")]
    InvalidRegex(String),

    #[error("pattern matches everything: {0}")]
    DegeneratePattern(String),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("confidence {confidence:.2} below threshold {threshold:.2}")]
    LowConfidence { confidence: f64, threshold: f64 },

    #[error("duplicate of rule {0}")]
    Duplicate(String),
}

/// Result type for decision operations
pub type Result<T> = std::result::Result<T, DecisionError>;
