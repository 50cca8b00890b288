use crate::config::error::{ConfigError, Result};
use config::{Config, Environment, File};
use formpilot_decision::{
    DecisionConfig, HeuristicsConfig, LearningConfig, NormalizerConfig, ReasoningConfig,
};
use formpilot_modal_flow::NavigatorConfig;
use formpilot_resilience::ResilienceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "FORMPILOT";

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Rule learning switches
    #[serde(default)]
    pub learning: LearningConfig,

    /// Live rule store
    #[serde(default)]
    pub rules: RuleStoreSource,

    /// Candidate profile document
    #[serde(default)]
    pub profile: ProfileSource,

    #[serde(default)]
    pub normalizer: NormalizerConfig,

    #[serde(default)]
    pub heuristics: HeuristicsConfig,

    /// Remote reasoning service (disabled unless configured)
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Retry, timeout and circuit breaker settings for UI actions
    #[serde(default)]
    pub resilience: ResilienceConfig,

    #[serde(default)]
    pub navigator: NavigatorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStoreSource {
    /// YAML for `.yaml`/`.yml`, JSON otherwise
    #[serde(default = "default_rules_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSource {
    #[serde(default = "default_profile_path")]
    pub path: PathBuf,
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("config/rules.yaml")
}

fn default_profile_path() -> PathBuf {
    PathBuf::from("config/profile.yaml")
}

impl Default for RuleStoreSource {
    fn default() -> Self {
        Self {
            path: default_rules_path(),
        }
    }
}

impl Default for ProfileSource {
    fn default() -> Self {
        Self {
            path: default_profile_path(),
        }
    }
}

impl AppConfig {
    /// The sections the decision engine reads
    pub fn decision(&self) -> DecisionConfig {
        DecisionConfig {
            learning: self.learning.clone(),
            normalizer: self.normalizer.clone(),
            heuristics: self.heuristics.clone(),
            reasoning: self.reasoning.clone(),
        }
    }

    /// Reject out-of-range values across every section
    pub fn validate(&self) -> Result<()> {
        self.decision()
            .validate()
            .map_err(|e| ConfigError::invalid("decision", e))?;
        self.resilience
            .validate()
            .map_err(|e| ConfigError::invalid("resilience", e))?;
        self.navigator
            .validate()
            .map_err(|e| ConfigError::invalid("navigator", e))?;
        Ok(())
    }
}

/// Configuration loader with layered precedence
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Use an explicit config file; its format follows the extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load and validate.
    ///
    /// # Errors
    ///
    /// `FileNotFound` when an explicit file is missing, `Layer` when a
    /// layer cannot be parsed, `Invalid` for out-of-range values.
    pub fn load(&self) -> Result<AppConfig> {
        let mut builder = Config::builder();

        // Layer 1: defaults
        let defaults_json = serde_json::to_string(&AppConfig::default())?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // Layer 2: config file
        if let Some(ref path) = self.config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_ref()));
        }

        // Layer 3: environment (FORMPILOT_SECTION__KEY)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            file = ?self.config_path,
            rules = %config.rules.path.display(),
            profile = %config.profile.path.display(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Locate a config file in the default locations.
    ///
    /// 1. `./formpilot.toml`
    /// 2. `<config_dir>/formpilot/config.toml`
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from("./formpilot.toml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("formpilot").join("config.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load from the default locations, or defaults plus environment when no
    /// file exists.
    pub fn load_default() -> Result<AppConfig> {
        let loader = match Self::find_config_file() {
            Some(config_path) => ConfigLoader::new().with_file(config_path),
            None => ConfigLoader::new(),
        };
        loader.load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_resilience::SUBMIT_OPERATION;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::env;

    #[test]
    fn default_config_matches_documented_values() {
        let config = AppConfig::default();
        assert!(config.learning.enabled);
        assert_eq!(config.learning.confidence_threshold, 0.70);
        assert_eq!(config.rules.path, PathBuf::from("config/rules.yaml"));
        assert_eq!(config.profile.path, PathBuf::from("config/profile.yaml"));
        assert_eq!(config.normalizer.default_currency, "nis");
        assert!(!config.reasoning.enabled);
        assert_eq!(config.reasoning.timeout_secs, 30);
        assert_eq!(config.resilience.retry.max_attempts, 3);
        assert_eq!(config.resilience.policy_for(SUBMIT_OPERATION).max_attempts, 1);
        assert_eq!(config.resilience.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.navigator.max_steps, 8);
        assert!(config.navigator.should_submit);
    }

    #[test]
    #[serial]
    fn defaults_only_round_trip_through_the_config_layers() {
        let config = ConfigLoader::new().load().expect("load defaults");
        assert_eq!(config.navigator.max_steps, 8);
        assert_eq!(config.resilience.policy_for(SUBMIT_OPERATION).max_attempts, 1);
        assert_eq!(config.resilience.retry.backoff_base, 2.0);
    }

    #[test]
    #[serial]
    fn environment_overrides_nested_keys() {
        unsafe {
            env::set_var("FORMPILOT_NAVIGATOR__MAX_STEPS", "3");
            env::set_var("FORMPILOT_NAVIGATOR__SHOULD_SUBMIT", "false");
            env::set_var("FORMPILOT_RESILIENCE__RETRY__MAX_ATTEMPTS", "5");
        }

        let loaded = ConfigLoader::new().load();

        unsafe {
            env::remove_var("FORMPILOT_NAVIGATOR__MAX_STEPS");
            env::remove_var("FORMPILOT_NAVIGATOR__SHOULD_SUBMIT");
            env::remove_var("FORMPILOT_RESILIENCE__RETRY__MAX_ATTEMPTS");
        }

        let config = loaded.expect("load with env");
        assert_eq!(config.navigator.max_steps, 3);
        assert!(!config.navigator.should_submit);
        assert_eq!(config.resilience.retry.max_attempts, 5);
    }

    #[test]
    #[serial]
    fn toml_file_overrides_defaults() {
        let toml_content = r#"
[rules]
path = "/srv/formpilot/rules.json"

[learning]
review_mode = true
confidence_threshold = 0.9

[resilience.retry]
max_attempts = 4
initial_wait = 0.5

[resilience.overrides.click_next]
max_attempts = 2

[navigator.documents]
resume_path = "/srv/formpilot/cv.pdf"
"#;
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config_path = temp_dir.path().join("formpilot.toml");
        std::fs::write(&config_path, toml_content).expect("write config");

        let config = ConfigLoader::new()
            .with_file(&config_path)
            .load()
            .expect("load file");

        assert_eq!(config.rules.path, PathBuf::from("/srv/formpilot/rules.json"));
        assert!(config.learning.review_mode);
        assert_eq!(config.learning.confidence_threshold, 0.9);
        assert!(config.learning.auto_learn);
        assert_eq!(config.resilience.retry.max_attempts, 4);
        assert_eq!(config.resilience.policy_for("click_next").max_attempts, 2);
        assert_eq!(config.resilience.policy_for("click_next").initial_wait, 0.5);
        assert_eq!(
            config.navigator.documents.resume_path,
            Some(PathBuf::from("/srv/formpilot/cv.pdf"))
        );
        assert_eq!(config.navigator.max_steps, 8);
    }

    #[test]
    #[serial]
    fn missing_explicit_file_is_reported() {
        let result = ConfigLoader::new()
            .with_file("/nonexistent/formpilot.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    #[serial]
    fn out_of_range_values_fail_validation() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config_path = temp_dir.path().join("bad.toml");
        std::fs::write(&config_path, "[learning]\nconfidence_threshold = 1.5\n")
            .expect("write config");

        let result = ConfigLoader::new().with_file(&config_path).load();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                section: "decision",
                ..
            })
        ));

        std::fs::write(&config_path, "[resilience.retry]\nmax_attempts = 0\n")
            .expect("write config");
        let err = ConfigLoader::new()
            .with_file(&config_path)
            .load()
            .expect_err("invalid");
        assert!(err.to_string().starts_with("invalid [resilience] setting"), "{err}");
    }

    #[test]
    fn decision_section_carries_every_engine_setting() {
        let mut config = AppConfig::default();
        config.learning.auto_learn = false;
        config.heuristics.bio_max_chars = 80;
        config.reasoning.model = "local-model".to_string();

        let decision = config.decision();
        assert!(!decision.learning.auto_learn);
        assert_eq!(decision.heuristics.bio_max_chars, 80);
        assert_eq!(decision.reasoning.model, "local-model");
    }
}
