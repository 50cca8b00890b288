//! Decision engine configuration
//!
//! Every section deserializes with defaults so a partial file (or none at all)
//! yields a working engine. The application-level loader layers these
//! sections under `[learning]`, `[normalizer]`, `[heuristics]` and
//! `[reasoning]`.

use crate::errors::{DecisionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Aggregate of everything the decision crate reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default)]
    pub learning: LearningConfig,

    #[serde(default)]
    pub normalizer: NormalizerConfig,

    #[serde(default)]
    pub heuristics: HeuristicsConfig,

    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

impl DecisionConfig {
    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.learning.validate()?;
        self.reasoning.validate()?;
        Ok(())
    }
}

/// Rule learning switches. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Master switch for rule learning
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Learn automatically from heuristic and reasoning decisions
    #[serde(default = "default_true")]
    pub auto_learn: bool,

    /// Ask the reasoning service for a rule in a second, dedicated call
    #[serde(default = "default_true")]
    pub use_separate_rule_generation: bool,

    /// Fall back to the suggestion embedded in the decision
    #[serde(default = "default_true")]
    pub rule_generation_fallback: bool,

    /// Minimum suggestion confidence for a rule to be committed
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default = "default_true")]
    pub enable_duplicate_check: bool,

    #[serde(default = "default_true")]
    pub enable_pattern_validation: bool,

    #[serde(default = "default_true")]
    pub enable_strategy_validation: bool,

    /// Route validated rules to `review_path` instead of the live store
    #[serde(default)]
    pub review_mode: bool,

    #[serde(default = "default_review_path")]
    pub review_path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_confidence_threshold() -> f64 {
    0.70
}

fn default_review_path() -> PathBuf {
    PathBuf::from("config/pending_rules.yaml")
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_learn: true,
            use_separate_rule_generation: true,
            rule_generation_fallback: true,
            confidence_threshold: default_confidence_threshold(),
            enable_duplicate_check: true,
            enable_pattern_validation: true,
            enable_strategy_validation: true,
            review_mode: false,
            review_path: default_review_path(),
        }
    }
}

impl LearningConfig {
    /// Load from a YAML (`.yaml`/`.yml`) or TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DecisionError::config_with_source(
                format!("failed to read learning config at {}", path.display()),
                e,
            )
        })?;

        let cfg: LearningConfig = if is_yaml(path) {
            serde_yaml::from_str(&contents).map_err(|e| {
                DecisionError::config_with_source("failed to parse learning config", e)
            })?
        } else {
            toml::from_str(&contents).map_err(|e| {
                DecisionError::config_with_source("failed to parse learning config", e)
            })?
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Whether decisions should be handed to the learning pipeline at all
    pub fn learns(&self) -> bool {
        self.enabled && self.auto_learn
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DecisionError::config(format!(
                "learning.confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }

        if self.enabled && !self.use_separate_rule_generation && !self.rule_generation_fallback {
            tracing::warn!(
                "learning enabled but both rule sources are disabled, nothing will be learned"
            );
        }
        Ok(())
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Synonym tables used by normalization-aware heuristics and strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Canonical skill name → surface forms (`"js": ["javascript", "ecmascript"]`)
    #[serde(default)]
    pub skill_synonyms: BTreeMap<String, Vec<String>>,

    /// Currency code → surface forms; empty means the built-in table
    #[serde(default)]
    pub currency_synonyms: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_currency() -> String {
    "nis".to_string()
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            skill_synonyms: BTreeMap::new(),
            currency_synonyms: BTreeMap::new(),
            default_currency: default_currency(),
        }
    }
}

/// Built-in heuristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicsConfig {
    /// Profile key template for salary questions
    #[serde(default = "default_salary_key_template")]
    pub salary_key_template: String,

    /// Answer free-text questions with the profile bio
    #[serde(default)]
    pub text_bio_enabled: bool,

    #[serde(default = "default_bio_max_chars")]
    pub bio_max_chars: usize,
}

fn default_salary_key_template() -> String {
    "salary_expectation.monthly_net_{currency}".to_string()
}

fn default_bio_max_chars() -> usize {
    200
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            salary_key_template: default_salary_key_template(),
            text_bio_enabled: false,
            bio_max_chars: default_bio_max_chars(),
        }
    }
}

/// Reasoning service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Chat-completions endpoint base (e.g. `https://api.openai.com/v1`)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound for a single reasoning call
    #[serde(default = "default_reasoning_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_reasoning_timeout_secs() -> u64 {
    30
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_reasoning_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.timeout_secs == 0 {
            return Err(DecisionError::config(
                "reasoning.timeout_secs must be positive when reasoning is enabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_learning_defaults() {
        let cfg = LearningConfig::default();
        assert!(cfg.learns());
        assert_eq!(cfg.confidence_threshold, 0.70);
        assert!(!cfg.review_mode);
        assert_eq!(cfg.review_path, PathBuf::from("config/pending_rules.yaml"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("learning.yaml");
        std::fs::write(&path, "auto_learn: false\nconfidence_threshold: 0.9\n").expect("write");

        let cfg = LearningConfig::load(&path).expect("load");
        assert!(cfg.enabled);
        assert!(!cfg.auto_learn);
        assert!(!cfg.learns());
        assert_eq!(cfg.confidence_threshold, 0.9);
    }

    #[test]
    fn test_toml_threshold_out_of_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("learning.toml");
        std::fs::write(&path, "confidence_threshold = 1.5\n").expect("write");

        let err = LearningConfig::load(&path).expect_err("should reject");
        assert!(err.to_string().contains("confidence_threshold"));
    }

    #[test]
    fn test_reasoning_disabled_by_default() {
        let cfg = DecisionConfig::default();
        assert!(!cfg.reasoning.enabled);
        assert_eq!(cfg.reasoning.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.normalizer.default_currency, "nis");
        cfg.validate().expect("defaults validate");
    }
}
