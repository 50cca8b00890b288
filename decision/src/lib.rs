//! Decision engine for filling dynamically rendered form fields.
//!
//! A field (question text, widget type, options) is reduced to a
//! [`FieldSignature`] and resolved through a cascade of rules, heuristics and
//! an optional remote reasoning service. Answers that did not come from a rule
//! can be turned into new rules by the [`LearningPipeline`].
//!
//! ```text
//! FieldContext ─▶ RuleResolver ─▶ HeuristicResolver ─▶ ReasoningResolver ─▶ None
//!                      │                 │                     │
//!                      ▼                 └──────── learning ◀──┘
//!                 RuleRepository ◀──────────────────┘
//! ```

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod heuristics;
pub mod learning;
pub mod normalizer;
pub mod profile;
pub mod reasoning;
pub mod rules;
pub mod signature;
pub mod strategy;

pub use config::{
    DecisionConfig, HeuristicsConfig, LearningConfig, NormalizerConfig, ReasoningConfig,
};
pub use context::{FieldContext, FieldValue, JobContext};
pub use engine::{DecisionEngine, DecisionSource, Resolved, Resolver, type_default};
pub use errors::{DecisionError, ErrorCategory, Rejection, Result};
pub use learning::{LearnOutcome, LearningPipeline};
pub use profile::CandidateProfile;
pub use reasoning::{HttpReasoningService, ReasoningDecision, ReasoningService, RuleSuggestion};
pub use rules::{Rule, RuleRepository};
pub use signature::{FieldSignature, FieldType, FormScope, fingerprint, normalize};
