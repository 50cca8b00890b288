//! Reasoning service fallback
//!
//! The reasoning service is slow, fallible and untrusted. Callers bound every
//! call with their own timeout and treat any error as "no decision".

use crate::config::ReasoningConfig;
use crate::context::{FieldContext, FieldValue};
use crate::errors::ReasoningError;
use crate::profile::CandidateProfile;
use crate::rules::StrategySpec;
use crate::signature::{FieldType, normalize};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ─────────────────────────────────────────────────────────────────────────────
// Decision types
// ─────────────────────────────────────────────────────────────────────────────

/// What the service wants done with the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Select,
    Text,
    Number,
    Check,
    Skip,
}

/// Candidate rule proposed by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSuggestion {
    #[serde(alias = "q_pattern")]
    pub question_pattern: String,

    /// Inferred from the field and value when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategySpec>,

    #[serde(default)]
    pub confidence: f64,
}

/// Decision returned by [`ReasoningService::decide`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningDecision {
    pub decision: DecisionAction,

    #[serde(default)]
    pub value: Value,

    #[serde(default)]
    pub confidence: f64,

    /// Legacy companion suggestion embedded in the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggest_rule: Option<RuleSuggestion>,
}

impl ReasoningDecision {
    pub fn skip() -> Self {
        Self {
            decision: DecisionAction::Skip,
            value: Value::Null,
            confidence: 0.0,
            suggest_rule: None,
        }
    }

    /// Parse a JSON reply; an embedded suggestion without its own confidence
    /// inherits the decision's.
    pub fn from_json_str(raw: &str) -> Result<Self, ReasoningError> {
        let mut decision: ReasoningDecision = serde_json::from_str(raw.trim())
            .map_err(|e| ReasoningError::MalformedResponse(e.to_string()))?;
        decision.confidence = decision.confidence.clamp(0.0, 1.0);
        if let Some(suggestion) = decision.suggest_rule.as_mut() {
            if suggestion.confidence <= 0.0 {
                suggestion.confidence = decision.confidence;
            }
        }
        Ok(decision)
    }

    /// The value to apply to `field`, or `None` when the service declined or
    /// picked something that is not one of the field's options.
    pub fn field_value(&self, field: &FieldContext) -> Option<FieldValue> {
        if self.decision == DecisionAction::Skip {
            return None;
        }
        let value = FieldValue::from_json(&self.value)?;

        match field.field_type {
            FieldType::Checkbox => Some(FieldValue::Bool(value.is_truthy())),
            t if t.is_choice() => {
                let wanted = normalize(&value.to_string());
                field
                    .options
                    .iter()
                    .find(|o| normalize(o) == wanted)
                    .map(|o| FieldValue::Text(o.clone()))
            }
            _ => Some(value),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service trait
// ─────────────────────────────────────────────────────────────────────────────

/// Remote decision maker consulted after rules and heuristics
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Decide a value for `field` given the candidate profile
    async fn decide(
        &self,
        field: &FieldContext,
        profile: &CandidateProfile,
    ) -> Result<ReasoningDecision, ReasoningError>;

    /// Propose a reusable rule for a decision already taken.
    ///
    /// Optional capability; services that cannot generate rules return `None`.
    async fn generate_rule(
        &self,
        _field: &FieldContext,
        _selected: &FieldValue,
        _profile: &CandidateProfile,
    ) -> Result<Option<RuleSuggestion>, ReasoningError> {
        Ok(None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompt builders
// ─────────────────────────────────────────────────────────────────────────────

const DECIDE_SYSTEM: &str = "You fill job application forms on behalf of a candidate. \
Answer only from the candidate profile. Reply with a single JSON object.";

const RULE_SYSTEM: &str = "You write reusable form-filling rules. \
Reply with a single JSON object.";

fn field_block(field: &FieldContext) -> String {
    let options = if field.options.is_empty() {
        "(none)".to_string()
    } else {
        field.options.join(" | ")
    };
    format!(
        "FIELD CONTEXT:\n- question: {}\n- normalized: {}\n- type: {}\n- options: {}",
        field.question,
        field.normalized_question(),
        field.field_type,
        options
    )
}

fn job_block(field: &FieldContext) -> String {
    match &field.job {
        Some(job) => format!(
            "JOB CONTEXT:\n- title: {}\n- company: {}\n- description: {}",
            job.title, job.company, job.description
        ),
        None => "JOB CONTEXT: (none)".to_string(),
    }
}

/// Prompt for [`ReasoningService::decide`]
pub fn build_decision_prompt(field: &FieldContext, profile: &CandidateProfile) -> String {
    format!(
        "{}\n\nCANDIDATE PROFILE:\n{}\n\n{}\n\nINSTRUCTION:\n\
         Return {{\"decision\": \"select|text|number|check|skip\", \"value\": ..., \
         \"confidence\": 0..1, \"suggest_rule\": {{\"q_pattern\": \"regex\", \
         \"strategy\": {{\"kind\": \"...\", \"params\": {{}}}}}} or null}}.\n\
         For select fields the value must be one of the options verbatim. \
         Use \"skip\" when the profile does not answer the question.",
        field_block(field),
        profile.as_value(),
        job_block(field)
    )
}

/// Prompt for [`ReasoningService::generate_rule`]
pub fn build_rule_prompt(
    field: &FieldContext,
    selected: &FieldValue,
    profile: &CandidateProfile,
) -> String {
    format!(
        "{}\n- selected value: {}\n\nCANDIDATE PROFILE:\n{}\n\n{}\n\nINSTRUCTION:\n\
         Propose a rule that would reproduce this answer for similar questions. \
         Return {{\"q_pattern\": \"regex over the normalized question\", \
         \"strategy\": {{\"kind\": \"literal|profile_key|numeric_from_profile|one_of_options|\
         one_of_options_from_profile|salary_by_currency\", \"params\": {{}}}}, \
         \"confidence\": 0..1}} or {{\"rule\": null}} when no rule generalizes.",
        field_block(field),
        selected,
        profile.as_value(),
        job_block(field)
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP client (OpenAI-compatible chat completions)
// ─────────────────────────────────────────────────────────────────────────────

/// Reasoning service backed by a chat-completions endpoint
#[derive(Debug, Clone)]
pub struct HttpReasoningService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpReasoningService {
    /// Build from config; the API key is read from `config.api_key_env`.
    pub fn from_config(config: &ReasoningConfig) -> Result<Self, ReasoningError> {
        if !config.enabled {
            return Err(ReasoningError::NotConfigured);
        }
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "reasoning API key not set, requests go out unauthenticated"
            );
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    async fn complete(&self, system: &str, prompt: String) -> Result<String, ReasoningError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReasoningError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ReasoningError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReasoningError::MalformedResponse("empty completion".to_string()))
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    async fn decide(
        &self,
        field: &FieldContext,
        profile: &CandidateProfile,
    ) -> Result<ReasoningDecision, ReasoningError> {
        let content = self
            .complete(DECIDE_SYSTEM, build_decision_prompt(field, profile))
            .await?;
        ReasoningDecision::from_json_str(&content)
    }

    async fn generate_rule(
        &self,
        field: &FieldContext,
        selected: &FieldValue,
        profile: &CandidateProfile,
    ) -> Result<Option<RuleSuggestion>, ReasoningError> {
        let content = self
            .complete(RULE_SYSTEM, build_rule_prompt(field, selected, profile))
            .await?;
        let raw: Value = serde_json::from_str(content.trim())
            .map_err(|e| ReasoningError::MalformedResponse(e.to_string()))?;
        if raw.get("rule").is_some_and(Value::is_null) {
            return Ok(None);
        }
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|e| ReasoningError::MalformedResponse(e.to_string()))
    }
}
