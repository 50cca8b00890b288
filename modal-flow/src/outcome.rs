//! Navigator states and run results

use std::fmt;

/// Where the navigator is in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigatorState {
    Idle,
    /// Dialog located for this step
    StepActive { step: u32 },
    Filling { step: u32 },
    /// Navigation or submit click in flight
    Submitting { step: u32 },
    Terminal(FlowStatus),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStatus {
    /// No dialog left, or the submit step was reached
    Completed { submitted: bool },
    MaxStepsReached,
    /// The step kept re-rendering with errors and nothing was left to change
    ValidationBlocked { errors: Vec<String> },
    Failed { error: String },
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::MaxStepsReached => "max_steps_reached",
            Self::ValidationBlocked { .. } => "validation_blocked",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { submitted: true } => f.write_str("completed (submitted)"),
            Self::Completed { submitted: false } => f.write_str("completed"),
            Self::MaxStepsReached => f.write_str("max steps reached"),
            Self::ValidationBlocked { errors } => {
                write!(f, "blocked by validation: {}", errors.join("; "))
            }
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    pub status: FlowStatus,
    pub submitted: bool,
    pub steps_processed: u32,
    /// Error texts seen on the last step
    pub validation_errors: Vec<String>,
}

impl FlowOutcome {
    pub(crate) fn new(status: FlowStatus, steps_processed: u32) -> Self {
        let submitted = matches!(status, FlowStatus::Completed { submitted: true });
        let validation_errors = match &status {
            FlowStatus::ValidationBlocked { errors } => errors.clone(),
            FlowStatus::MaxStepsReached => vec!["Max steps reached".to_string()],
            FlowStatus::Failed { error } => vec![error.clone()],
            FlowStatus::Completed { .. } => Vec::new(),
        };
        Self {
            status,
            submitted,
            steps_processed,
            validation_errors,
        }
    }
}

/// Per-step tally of what the fill pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Mutating UI actions issued
    pub mutations: u32,
    /// Fields left alone because they were already in their target state
    pub skipped: u32,
    /// Fields whose action failed after retries
    pub failed: u32,
}

impl FillReport {
    pub(crate) fn absorb(&mut self, other: FillReport) {
        self.mutations += other.mutations;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}
