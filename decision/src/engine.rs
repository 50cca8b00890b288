//! Decision engine
//!
//! Resolves one field through an ordered cascade of [`Resolver`]s: rules,
//! then heuristics, then the reasoning service when one is configured. The
//! first resolver that produces a value wins. Decisions that did not come from
//! a rule are handed to the [`LearningPipeline`] on a background task.

use crate::config::DecisionConfig;
use crate::context::{FieldContext, FieldValue, JobContext};
use crate::errors::{DecisionError, ReasoningError, Result};
use crate::heuristics::Heuristics;
use crate::learning::LearningPipeline;
use crate::normalizer::Normalizer;
use crate::profile::CandidateProfile;
use crate::reasoning::{ReasoningService, RuleSuggestion};
use crate::rules::RuleRepository;
use crate::signature::{FieldType, FormScope};
use crate::strategy::Strategy;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;

/// Which stage of the cascade produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Rule,
    Heuristic,
    Reasoning,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Heuristic => "heuristic",
            Self::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value produced by one resolver
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: FieldValue,
    pub source: DecisionSource,
    /// Id of the rule that answered, for [`DecisionSource::Rule`]
    pub rule_id: Option<String>,
    /// Companion rule proposal that came back with a reasoning decision
    pub suggestion: Option<RuleSuggestion>,
}

impl Resolved {
    pub fn new(value: FieldValue, source: DecisionSource) -> Self {
        Self {
            value,
            source,
            rule_id: None,
            suggestion: None,
        }
    }
}

/// One stage of the decision cascade. `None` passes the field on.
#[async_trait]
pub trait Resolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, field: &FieldContext) -> Option<Resolved>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolvers
// ─────────────────────────────────────────────────────────────────────────────

/// First matching rule, executed through its strategy
pub struct RuleResolver {
    repository: Arc<RuleRepository>,
    profile: Arc<CandidateProfile>,
    normalizer: Normalizer,
}

impl RuleResolver {
    pub fn new(
        repository: Arc<RuleRepository>,
        profile: Arc<CandidateProfile>,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            repository,
            profile,
            normalizer,
        }
    }
}

#[async_trait]
impl Resolver for RuleResolver {
    fn name(&self) -> &'static str {
        "rule"
    }

    async fn resolve(&self, field: &FieldContext) -> Option<Resolved> {
        let matched = self.repository.find(&field.signature)?;
        let rule_id = matched.rule.id.clone();

        let strategy = match Strategy::from_spec(&matched.rule.strategy, &matched.captures) {
            Ok(strategy) => strategy,
            Err(e) => {
                tracing::warn!(
                    rule = %rule_id,
                    error = %e,
                    "rule strategy invalid, treating as miss"
                );
                return None;
            }
        };

        let Some(value) = strategy.resolve(&self.profile, field, &self.normalizer) else {
            tracing::debug!(
                rule = %rule_id,
                kind = strategy.kind(),
                "rule strategy returned nothing"
            );
            return None;
        };
        Some(Resolved {
            rule_id: Some(rule_id),
            ..Resolved::new(value, DecisionSource::Rule)
        })
    }
}

pub struct HeuristicResolver {
    heuristics: Heuristics,
    profile: Arc<CandidateProfile>,
}

impl HeuristicResolver {
    pub fn new(heuristics: Heuristics, profile: Arc<CandidateProfile>) -> Self {
        Self {
            heuristics,
            profile,
        }
    }
}

#[async_trait]
impl Resolver for HeuristicResolver {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn resolve(&self, field: &FieldContext) -> Option<Resolved> {
        self.heuristics
            .resolve(field, &self.profile)
            .map(|value| Resolved::new(value, DecisionSource::Heuristic))
    }
}

/// Remote reasoning fallback; every failure degrades to no decision
pub struct ReasoningResolver {
    service: Arc<dyn ReasoningService>,
    profile: Arc<CandidateProfile>,
    timeout: Duration,
}

impl ReasoningResolver {
    pub fn new(
        service: Arc<dyn ReasoningService>,
        profile: Arc<CandidateProfile>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            profile,
            timeout,
        }
    }
}

#[async_trait]
impl Resolver for ReasoningResolver {
    fn name(&self) -> &'static str {
        "reasoning"
    }

    async fn resolve(&self, field: &FieldContext) -> Option<Resolved> {
        let call = self.service.decide(field, &self.profile);
        let decision = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "reasoning service failed");
                return None;
            }
            Err(_) => {
                let e = ReasoningError::Timeout(self.timeout);
                tracing::warn!(error = %e, "reasoning service failed");
                return None;
            }
        };

        let Some(value) = decision.field_value(field) else {
            tracing::debug!(
                action = ?decision.decision,
                value = %decision.value,
                "reasoning service gave no usable value"
            );
            return None;
        };
        Some(Resolved {
            suggestion: decision.suggest_rule,
            ..Resolved::new(value, DecisionSource::Reasoning)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

pub struct DecisionEngine {
    resolvers: Vec<Box<dyn Resolver>>,
    repository: Arc<RuleRepository>,
    learning: Option<Arc<LearningPipeline>>,
    tasks: Mutex<JoinSet<()>>,
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("DecisionEngine")
            .field("resolvers", &names)
            .field("repository", &self.repository)
            .field("learning", &self.learning.is_some())
            .finish()
    }
}

/// Assembles the standard cascade from config
pub struct DecisionEngineBuilder {
    config: DecisionConfig,
    repository: Arc<RuleRepository>,
    profile: Arc<CandidateProfile>,
    reasoning: Option<Arc<dyn ReasoningService>>,
}

impl DecisionEngineBuilder {
    pub fn config(mut self, config: DecisionConfig) -> Self {
        self.config = config;
        self
    }

    /// Add the reasoning fallback; without one the cascade stops at heuristics.
    pub fn reasoning(mut self, service: Arc<dyn ReasoningService>) -> Self {
        self.reasoning = Some(service);
        self
    }

    pub fn build(self) -> Result<DecisionEngine> {
        self.config.validate()?;
        let normalizer = Normalizer::new(self.config.normalizer.clone());
        let timeout = self.config.reasoning.timeout();

        let mut resolvers: Vec<Box<dyn Resolver>> = vec![
            Box::new(RuleResolver::new(
                self.repository.clone(),
                self.profile.clone(),
                normalizer.clone(),
            )),
            Box::new(HeuristicResolver::new(
                Heuristics::new(self.config.heuristics.clone(), normalizer),
                self.profile.clone(),
            )),
        ];
        if let Some(service) = &self.reasoning {
            resolvers.push(Box::new(ReasoningResolver::new(
                service.clone(),
                self.profile.clone(),
                timeout,
            )));
        }

        let learning = if self.config.learning.learns() {
            let mut pipeline = LearningPipeline::new(
                self.config.learning.clone(),
                self.repository.clone(),
                self.profile.clone(),
            )?;
            if let Some(service) = self.reasoning {
                pipeline = pipeline.with_reasoning(service, timeout);
            }
            Some(Arc::new(pipeline))
        } else {
            None
        };

        Ok(DecisionEngine {
            resolvers,
            repository: self.repository,
            learning,
            tasks: Mutex::new(JoinSet::new()),
        })
    }
}

impl DecisionEngine {
    pub fn builder(
        repository: Arc<RuleRepository>,
        profile: Arc<CandidateProfile>,
    ) -> DecisionEngineBuilder {
        DecisionEngineBuilder {
            config: DecisionConfig::default(),
            repository,
            profile,
            reasoning: None,
        }
    }

    /// Engine over an explicit resolver list, without learning
    pub fn with_resolvers(
        repository: Arc<RuleRepository>,
        resolvers: Vec<Box<dyn Resolver>>,
    ) -> Self {
        Self {
            resolvers,
            repository,
            learning: None,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn repository(&self) -> &Arc<RuleRepository> {
        &self.repository
    }

    /// Decide a value for one field.
    ///
    /// `Ok(None)` means no resolver had an answer; the caller applies
    /// [`type_default`].
    pub async fn decide(
        &self,
        scope: &FormScope,
        question: &str,
        field_type: FieldType,
        options: &[String],
    ) -> Result<Option<FieldValue>> {
        let field = FieldContext::new(scope, question, field_type, options);
        self.decide_field(&field).await
    }

    /// [`DecisionEngine::decide`] with job context for the reasoning prompt
    pub async fn decide_for_job(
        &self,
        scope: &FormScope,
        question: &str,
        field_type: FieldType,
        options: &[String],
        job: Option<JobContext>,
    ) -> Result<Option<FieldValue>> {
        let field = FieldContext::new(scope, question, field_type, options).with_job(job);
        self.decide_field(&field).await
    }

    pub async fn decide_field(&self, field: &FieldContext) -> Result<Option<FieldValue>> {
        check_field(field)?;

        for resolver in &self.resolvers {
            tracing::debug!(
                resolver = resolver.name(),
                question = %field.normalized_question(),
                "trying resolver"
            );
            let Some(resolved) = resolver.resolve(field).await else {
                continue;
            };

            tracing::info!(
                source = %resolved.source,
                rule = resolved.rule_id.as_deref().unwrap_or("-"),
                question = %field.normalized_question(),
                value = %resolved.value,
                "field decided"
            );
            if resolved.source != DecisionSource::Rule {
                self.spawn_learning(field, &resolved);
            }
            return Ok(Some(resolved.value));
        }

        tracing::debug!(question = %field.normalized_question(), "no resolver had an answer");
        Ok(None)
    }

    fn spawn_learning(&self, field: &FieldContext, resolved: &Resolved) {
        let Some(pipeline) = self.learning.clone() else {
            return;
        };
        let field = field.clone();
        let value = resolved.value.clone();
        let suggestion = resolved.suggestion.clone();

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            match pipeline.learn(&field, &value, suggestion).await {
                Ok(_) => {}
                Err(DecisionError::ValidationRejected(reason)) => {
                    tracing::info!(
                        question = %field.normalized_question(),
                        reason = %reason,
                        "learned rule rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        category = e.category().as_str(),
                        error = %e,
                        "rule learning failed"
                    );
                }
            }
        });
    }

    /// Wait for every learning task spawned so far
    pub async fn flush_learning(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "learning task aborted");
            }
        }
    }
}

fn check_field(field: &FieldContext) -> Result<()> {
    if field.field_type == FieldType::Multiselect {
        return Err(DecisionError::UnsupportedFieldType(field.field_type));
    }
    if field.field_type.is_choice() && field.options.is_empty() {
        return Err(DecisionError::Signature(format!(
            "{} field without options",
            field.field_type
        )));
    }
    if field.normalized_question().is_empty() && field.options.is_empty() {
        return Err(DecisionError::Signature(
            "field has neither question nor options".to_string(),
        ));
    }
    Ok(())
}

/// Value a caller submits when the engine has no answer.
///
/// First option for choice fields, `0` for numbers, `N/A` for text and an
/// unchecked box for checkboxes. Multiselect has no default.
pub fn type_default(field_type: FieldType, options: &[String]) -> Option<FieldValue> {
    match field_type {
        FieldType::Radio | FieldType::Select | FieldType::Combobox => {
            options.first().map(|o| FieldValue::Text(o.clone()))
        }
        FieldType::Number => Some(FieldValue::Number(0)),
        FieldType::Text => Some(FieldValue::Text("N/A".to_string())),
        FieldType::Checkbox => Some(FieldValue::Bool(false)),
        FieldType::Multiselect => None,
    }
}
