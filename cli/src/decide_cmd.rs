//! `formpilot decide` and `formpilot fingerprint`
//!
//! Offline counterparts of what the navigator does per field: the cascade
//! runs over rules and heuristics only, and nothing is learned.

use crate::EXIT_OK;
use crate::config::AppConfig;
use anyhow::Context;
use clap::Parser;
use formpilot_decision::{
    CandidateProfile, DecisionEngine, FieldType, FieldValue, FormScope, RuleRepository,
    fingerprint, normalize, type_default,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
pub struct DecideArgs {
    /// Question text as rendered on the page
    #[arg(long)]
    pub question: String,

    /// Field type: radio, checkbox, select, combobox, number, text
    #[arg(long = "type", value_name = "TYPE", default_value = "text")]
    pub field_type: String,

    /// Offered option (repeat for each option)
    #[arg(long = "option", value_name = "OPTION")]
    pub options: Vec<String>,

    /// Candidate profile (overrides profile.path)
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Rule store (overrides rules.path)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    #[arg(long, default_value = "*")]
    pub site: String,

    #[arg(long, default_value = "*")]
    pub form_kind: String,

    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct FingerprintArgs {
    /// Options in any order
    #[arg(value_name = "OPTION", required = true)]
    pub options: Vec<String>,
}

/// What `decide` settled on
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub normalized_question: String,
    pub value: Option<FieldValue>,
    /// `true` when no resolver answered and the type default was used
    pub defaulted: bool,
    /// Set when the engine rejected the field outright
    pub error: Option<String>,
}

pub async fn run_decide(
    args: DecideArgs,
    config: &AppConfig,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let decision = decide(&args, config).await?;

    if args.json {
        let output = serde_json::json!({
            "question": decision.normalized_question,
            "type": args.field_type,
            "value": decision.value.as_ref().map(FieldValue::to_json),
            "defaulted": decision.defaulted,
            "error": decision.error,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    } else {
        writeln!(out, "question: {}", decision.normalized_question)?;
        if let Some(error) = &decision.error {
            writeln!(out, "error: {error}")?;
        }
        match (&decision.value, decision.defaulted) {
            (Some(value), false) => writeln!(out, "decision: {value}")?,
            (Some(value), true) => writeln!(out, "default: {value}")?,
            (None, _) => writeln!(out, "no value")?,
        }
    }
    Ok(EXIT_OK)
}

/// Run the offline cascade for one field.
///
/// Field-level engine errors fall back to the type default like the
/// navigator does; only unreadable profile or rule files are errors.
pub async fn decide(args: &DecideArgs, config: &AppConfig) -> anyhow::Result<Decision> {
    let field_type: FieldType = args.field_type.parse()?;
    let rules_path = args.rules.as_ref().unwrap_or(&config.rules.path);
    let profile_path = args.profile.as_ref().unwrap_or(&config.profile.path);

    let repository = Arc::new(
        RuleRepository::from_file(rules_path)
            .with_context(|| format!("failed to open rule store {}", rules_path.display()))?,
    );
    let profile = if profile_path.exists() {
        CandidateProfile::load(profile_path)?
    } else {
        tracing::warn!(path = %profile_path.display(), "profile not found, deciding without one");
        CandidateProfile::default()
    };

    let mut decision_config = config.decision();
    decision_config.learning.enabled = false;
    let engine = DecisionEngine::builder(repository, Arc::new(profile))
        .config(decision_config)
        .build()?;

    let scope = FormScope::new(&args.site, &args.form_kind);
    let decided = engine
        .decide(&scope, &args.question, field_type, &args.options)
        .await;

    let mut decision = Decision {
        normalized_question: normalize(&args.question),
        value: None,
        defaulted: false,
        error: None,
    };
    match decided {
        Ok(Some(value)) => decision.value = Some(value),
        Ok(None) => {
            decision.value = type_default(field_type, &args.options);
            decision.defaulted = true;
        }
        Err(e) => {
            tracing::warn!(category = e.category().as_str(), error = %e, "field rejected");
            decision.value = type_default(field_type, &args.options);
            decision.defaulted = true;
            decision.error = Some(e.to_string());
        }
    }
    Ok(decision)
}

pub fn run_fingerprint(args: FingerprintArgs, out: &mut dyn Write) -> anyhow::Result<i32> {
    writeln!(out, "{}", fingerprint(&args.options))?;
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const RULES: &str = r#"
rules:
  - id: years
    signature:
      field_type: number
      q_pattern: "years of (?P<skill>\\w+) experience"
    strategy:
      kind: numeric_from_profile
      params: { key: "years_experience.{skill}" }
  - id: relocate
    signature: { field_type: radio, q_pattern: "relocate" }
    strategy: { kind: one_of_options, params: { preferred: ["Yes"] } }
"#;

    const PROFILE: &str = r#"
years_experience:
  python: 6
salary_expectation:
  monthly_net_nis: 31000
"#;

    fn args(dir: &Path, question: &str, field_type: &str, options: &[&str]) -> DecideArgs {
        DecideArgs {
            question: question.to_string(),
            field_type: field_type.to_string(),
            options: options.iter().map(|s| (*s).to_string()).collect(),
            profile: Some(dir.join("profile.yaml")),
            rules: Some(dir.join("rules.yaml")),
            site: "*".to_string(),
            form_kind: "*".to_string(),
            json: false,
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("rules.yaml"), RULES).expect("write rules");
        std::fs::write(dir.path().join("profile.yaml"), PROFILE).expect("write profile");
        dir
    }

    #[tokio::test]
    async fn rule_answers_with_captured_key() {
        let dir = fixture();
        let decision = decide(
            &args(dir.path(), "How many years of Python experience?", "number", &[]),
            &AppConfig::default(),
        )
        .await
        .expect("decide");
        assert_eq!(decision.value, Some(FieldValue::Number(6)));
        assert!(!decision.defaulted);
    }

    #[tokio::test]
    async fn heuristic_answers_salary_question() {
        let dir = fixture();
        let decision = decide(
            &args(dir.path(), "Expected monthly salary (₪)", "number", &[]),
            &AppConfig::default(),
        )
        .await
        .expect("decide");
        assert_eq!(decision.value, Some(FieldValue::Number(31000)));
    }

    #[tokio::test]
    async fn unanswered_field_gets_type_default() {
        let dir = fixture();
        let decision = decide(
            &args(dir.path(), "Favourite colour", "select", &["Blue", "Red"]),
            &AppConfig::default(),
        )
        .await
        .expect("decide");
        assert_eq!(decision.value, Some(FieldValue::from("Blue")));
        assert!(decision.defaulted);
        assert_eq!(decision.error, None);
    }

    #[tokio::test]
    async fn rejected_field_reports_error_and_default() {
        let dir = fixture();
        let decision = decide(
            &args(dir.path(), "Pick one", "radio", &[]),
            &AppConfig::default(),
        )
        .await
        .expect("decide");
        assert!(decision.error.is_some());
        assert!(decision.defaulted);
    }

    #[tokio::test]
    async fn unknown_field_type_is_an_error() {
        let dir = fixture();
        let result = decide(
            &args(dir.path(), "Anything", "slider", &[]),
            &AppConfig::default(),
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn fingerprint_ignores_option_order() {
        let mut first = Vec::new();
        let mut second = Vec::new();
        run_fingerprint(
            FingerprintArgs {
                options: vec!["Yes".to_string(), "No".to_string()],
            },
            &mut first,
        )
        .expect("fingerprint");
        run_fingerprint(
            FingerprintArgs {
                options: vec!["no".to_string(), "YES ".to_string()],
            },
            &mut second,
        )
        .expect("fingerprint");
        assert_eq!(first, second);
        assert!(String::from_utf8(first).expect("utf8").starts_with("sha1:"));
    }
}
