//! Rule learning pipeline
//!
//! Turns an accepted heuristic or reasoning decision into a persisted rule.
//! Every stage may drop the candidate; a dropped candidate is logged and
//! otherwise ignored, never surfaced to the form-filling path.

use crate::config::LearningConfig;
use crate::context::{FieldContext, FieldValue};
use crate::errors::{Rejection, Result};
use crate::profile::CandidateProfile;
use crate::reasoning::{ReasoningService, RuleSuggestion};
use crate::rules::{
    Constraints, Rule, RuleMeta, RuleRepository, SignaturePattern, StrategySpec, compile_pattern,
};
use crate::signature::{FieldType, normalize};
use crate::strategy::{self, Strategy};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const MIN_PATTERN_CHARS: usize = 3;
const MAX_PATTERN_CHARS: usize = 200;

/// Unrelated text a meaningful question pattern should not match
const NONSENSE_PROBES: &[&str] = &["zq", "qzxv wkjy pbfm", "0000"];

/// Technologies recognized in numeric questions even when the profile does
/// not list them
const TECH_KEYWORDS: &[&str] = &[
    "python",
    "java",
    "javascript",
    "typescript",
    "golang",
    "go",
    "rust",
    "kotlin",
    "swift",
    "scala",
    "ruby",
    "php",
    "sql",
    "react",
    "node",
    "kubernetes",
    "docker",
    "aws",
    "linux",
];

/// Question phrases that name a contact detail, with the profile key holding it
const CONTACT_KEYS: &[(&str, &str)] = &[
    ("first name", "contact.first_name"),
    ("last name", "contact.last_name"),
    ("email", "contact.email"),
    ("e mail", "contact.email"),
    ("phone", "contact.phone"),
    ("mobile", "contact.phone"),
    ("city", "contact.city"),
    ("linkedin", "contact.linkedin"),
    ("github", "contact.github"),
];

/// Where a learned rule ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnOutcome {
    /// Appended to the live repository
    Committed { id: String, pattern: String },
    /// Appended to the review queue
    Queued { id: String, pattern: String },
}

pub struct LearningPipeline {
    config: LearningConfig,
    repository: Arc<RuleRepository>,
    pending: Option<Arc<RuleRepository>>,
    profile: Arc<CandidateProfile>,
    reasoning: Option<Arc<dyn ReasoningService>>,
    generation_timeout: Duration,
}

impl std::fmt::Debug for LearningPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearningPipeline")
            .field("config", &self.config)
            .field("repository", &self.repository)
            .field("pending", &self.pending)
            .field("reasoning", &self.reasoning.is_some())
            .finish()
    }
}

impl LearningPipeline {
    /// Build the pipeline; in review mode the pending store at
    /// `config.review_path` is opened as well.
    pub fn new(
        config: LearningConfig,
        repository: Arc<RuleRepository>,
        profile: Arc<CandidateProfile>,
    ) -> Result<Self> {
        let pending = if config.review_mode {
            Some(Arc::new(RuleRepository::from_file(&config.review_path)?))
        } else {
            None
        };
        Ok(Self {
            config,
            repository,
            pending,
            profile,
            reasoning: None,
            generation_timeout: Duration::from_secs(30),
        })
    }

    /// Enable dedicated rule generation calls, each bounded by `timeout`
    pub fn with_reasoning(mut self, service: Arc<dyn ReasoningService>, timeout: Duration) -> Self {
        self.reasoning = Some(service);
        self.generation_timeout = timeout;
        self
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Run the whole pipeline for one accepted decision
    pub async fn learn(
        &self,
        field: &FieldContext,
        selected: &FieldValue,
        embedded: Option<RuleSuggestion>,
    ) -> Result<LearnOutcome> {
        let suggestion = self.select_suggestion(field, selected, embedded).await?;
        let strategy = suggestion
            .strategy
            .clone()
            .unwrap_or_else(|| infer_strategy(field, selected, &self.profile));
        let pattern = suggestion.question_pattern.trim().to_string();

        self.validate(&pattern, &strategy, suggestion.confidence)?;
        if self.config.enable_duplicate_check {
            self.check_duplicate(field.field_type, &pattern)?;
        }

        let rule = Rule {
            id: format!("rls_{}", uuid::Uuid::new_v4().simple()),
            scope: field.scope().clone(),
            signature: SignaturePattern {
                field_type: field.field_type,
                question_regex: pattern.clone(),
                options_fingerprint: if field.field_type.is_choice() {
                    field.signature.options_fingerprint.clone()
                } else {
                    None
                },
            },
            strategy,
            constraints: Constraints::default(),
            meta: Some(RuleMeta {
                source: "learned".to_string(),
                confidence: Some(suggestion.confidence),
                created_at: Some(Utc::now()),
                hits: 0,
            }),
        };
        let id = rule.id.clone();

        match (&self.pending, self.config.review_mode) {
            (Some(pending), true) => {
                pending.add(rule)?;
                tracing::info!(id = %id, pattern = %pattern, "learned rule queued for review");
                Ok(LearnOutcome::Queued { id, pattern })
            }
            _ => {
                self.repository.add(rule)?;
                tracing::info!(id = %id, pattern = %pattern, "learned rule committed");
                Ok(LearnOutcome::Committed { id, pattern })
            }
        }
    }

    /// Dedicated generation first, then the embedded suggestion
    async fn select_suggestion(
        &self,
        field: &FieldContext,
        selected: &FieldValue,
        embedded: Option<RuleSuggestion>,
    ) -> std::result::Result<RuleSuggestion, Rejection> {
        if self.config.use_separate_rule_generation {
            if let Some(service) = &self.reasoning {
                let call = service.generate_rule(field, selected, &self.profile);
                match tokio::time::timeout(self.generation_timeout, call).await {
                    Ok(Ok(Some(suggestion))) => return Ok(suggestion),
                    Ok(Ok(None)) => tracing::debug!("rule generation declined"),
                    Ok(Err(e)) => tracing::warn!(error = %e, "rule generation failed"),
                    Err(_) => tracing::warn!(
                        timeout_ms = self.generation_timeout.as_millis() as u64,
                        "rule generation timed out"
                    ),
                }
            }
        }

        if self.config.rule_generation_fallback {
            if let Some(suggestion) = embedded {
                return Ok(suggestion);
            }
        }
        Err(Rejection::NoSuggestion)
    }

    /// Structural checks on a candidate rule
    pub fn validate(
        &self,
        pattern: &str,
        strategy: &StrategySpec,
        confidence: f64,
    ) -> std::result::Result<(), Rejection> {
        let chars = pattern.chars().count();
        if !(MIN_PATTERN_CHARS..=MAX_PATTERN_CHARS).contains(&chars) {
            return Err(Rejection::PatternLength(chars));
        }

        let re = compile_pattern(pattern).map_err(|e| Rejection::InvalidRegex(e.to_string()))?;
        if self.config.enable_pattern_validation {
            let degenerate =
                re.is_match("") || NONSENSE_PROBES.iter().all(|probe| re.is_match(probe));
            if degenerate {
                return Err(Rejection::DegeneratePattern(pattern.to_string()));
            }
        }

        if self.config.enable_strategy_validation {
            Strategy::create(&strategy.kind, &strategy.params)?;
        }

        if !(0.0..=1.0).contains(&confidence) {
            return Err(Rejection::ConfidenceOutOfRange(confidence));
        }
        if confidence < self.config.confidence_threshold {
            return Err(Rejection::LowConfidence {
                confidence,
                threshold: self.config.confidence_threshold,
            });
        }
        Ok(())
    }

    fn check_duplicate(
        &self,
        field_type: FieldType,
        pattern: &str,
    ) -> std::result::Result<(), Rejection> {
        let existing = self
            .repository
            .find_duplicate(field_type, pattern)
            .or_else(|| {
                self.pending
                    .as_ref()
                    .and_then(|p| p.find_duplicate(field_type, pattern))
            });
        match existing {
            Some(id) => Err(Rejection::Duplicate(id)),
            None => Ok(()),
        }
    }
}

/// Strategy for a suggestion that arrived without one
pub fn infer_strategy(
    field: &FieldContext,
    selected: &FieldValue,
    profile: &CandidateProfile,
) -> StrategySpec {
    let question = field.normalized_question();
    let padded = format!(" {question} ");
    let mentions = |term: &str| padded.contains(&format!(" {term} "));

    match field.field_type {
        FieldType::Checkbox => {
            StrategySpec::new(strategy::LITERAL, json!({ "value": selected.is_truthy() }))
        }
        t if t.is_choice() => StrategySpec::new(
            strategy::ONE_OF_OPTIONS,
            json!({ "preferred": [selected.to_string()] }),
        ),
        FieldType::Number => {
            let profile_skills = profile.skills();
            let keyword = profile_skills
                .iter()
                .map(|s| normalize(s.as_str()))
                .find(|s| !s.is_empty() && mentions(s.as_str()))
                .or_else(|| {
                    TECH_KEYWORDS
                        .iter()
                        .copied()
                        .find(|&k| mentions(k))
                        .map(str::to_string)
                });
            match keyword {
                Some(skill) => StrategySpec::new(
                    strategy::NUMERIC_FROM_PROFILE,
                    json!({ "key": format!("years_experience.{skill}") }),
                ),
                None => literal(selected),
            }
        }
        _ => {
            let contact = CONTACT_KEYS
                .iter()
                .copied()
                .find(|&(phrase, key)| mentions(phrase) && profile.lookup(key).is_some());
            match contact {
                Some((_, key)) => StrategySpec::new(strategy::PROFILE_KEY, json!({ "key": key })),
                None => literal(selected),
            }
        }
    }
}

fn literal(selected: &FieldValue) -> StrategySpec {
    StrategySpec::new(strategy::LITERAL, json!({ "value": selected.to_json() }))
}
