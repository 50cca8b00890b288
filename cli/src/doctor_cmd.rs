//! `formpilot doctor` - verify that a session could start
//!
//! Checks that the config loads and validates, that the rule store parses
//! cleanly, that the candidate profile is readable, and that the optional
//! reasoning service and document uploads are wired up.

use crate::check_rules_cmd::check_rules;
use crate::config::{AppConfig, ConfigLoader};
use crate::{EXIT_FAILURE, EXIT_OK, EXIT_WARNINGS, load_config};
use clap::Parser;
use formpilot_decision::CandidateProfile;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Parser)]
pub struct DoctorArgs {
    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

/// Doctor check result
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
        }
    }
}

impl CheckResult {
    fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            message: message.into(),
            fix: None,
        }
    }

    fn warn(name: &'static str, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Warn,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }

    fn fail(name: &'static str, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }
}

pub fn run(
    args: DoctorArgs,
    config_path: Option<&Path>,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let results = diagnose(config_path);

    if args.json {
        write_json_results(&results, out)?;
    } else {
        write_human_results(&results, out)?;
    }
    Ok(exit_code(&results))
}

/// Run every check; later checks use the defaults when the config is broken.
pub fn diagnose(config_path: Option<&Path>) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let config = match load_config(config_path) {
        Ok(config) => {
            let source = config_path
                .map(Path::to_path_buf)
                .or_else(ConfigLoader::find_config_file)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "defaults".to_string());
            results.push(CheckResult::pass("config", format!("loaded from {source}")));
            config
        }
        Err(e) => {
            results.push(CheckResult::fail(
                "config",
                e.to_string(),
                "Fix the config file or FORMPILOT_* environment variables",
            ));
            AppConfig::default()
        }
    };

    results.push(check_rule_store(&config));
    results.push(check_profile(&config));
    results.push(check_reasoning(&config));
    results.push(check_documents(&config));
    results
}

fn check_rule_store(config: &AppConfig) -> CheckResult {
    let path = &config.rules.path;
    if !path.exists() {
        return CheckResult::warn(
            "rules",
            format!("{} not found, sessions start with an empty store", path.display()),
            "Create the rule store or set rules.path",
        );
    }

    let check = check_rules(path);
    if let Some(error) = check.error {
        return CheckResult::fail(
            "rules",
            error,
            format!("formpilot check-rules {}", path.display()),
        );
    }
    let problems = check.skipped.len() + check.strategy_errors.len();
    if problems > 0 {
        return CheckResult::warn(
            "rules",
            format!("{} rules loaded, {problems} unusable", check.loaded),
            format!("formpilot check-rules {}", path.display()),
        );
    }
    CheckResult::pass("rules", format!("{} rules loaded", check.loaded))
}

fn check_profile(config: &AppConfig) -> CheckResult {
    let path = &config.profile.path;
    if !path.exists() {
        return CheckResult::fail(
            "profile",
            format!("{} not found", path.display()),
            "Create the candidate profile or set profile.path",
        );
    }
    match CandidateProfile::load(path) {
        Ok(profile) if profile.as_value().is_object() => {
            CheckResult::pass("profile", format!("loaded from {}", path.display()))
        }
        Ok(_) => CheckResult::fail(
            "profile",
            format!("{} is not a mapping", path.display()),
            "The profile must be a YAML/JSON object at the top level",
        ),
        Err(e) => CheckResult::fail("profile", e.to_string(), "Fix the profile syntax"),
    }
}

fn check_reasoning(config: &AppConfig) -> CheckResult {
    let reasoning = &config.reasoning;
    if !reasoning.enabled {
        return CheckResult::pass("reasoning", "disabled, rules and heuristics only");
    }
    if std::env::var(&reasoning.api_key_env).is_err() {
        return CheckResult::warn(
            "reasoning",
            format!("{} is not set", reasoning.api_key_env),
            format!("export {}=...", reasoning.api_key_env),
        );
    }
    CheckResult::pass(
        "reasoning",
        format!("{} via {}", reasoning.model, reasoning.endpoint),
    )
}

fn check_documents(config: &AppConfig) -> CheckResult {
    let documents = &config.navigator.documents;
    let configured = [
        ("resume", documents.resume_path.as_deref()),
        ("cover letter", documents.cover_letter_path.as_deref()),
    ];

    let missing: Vec<String> = configured
        .iter()
        .filter_map(|(kind, path)| {
            path.filter(|p| !p.is_file())
                .map(|p| format!("{kind} {}", p.display()))
        })
        .collect();
    if !missing.is_empty() {
        return CheckResult::warn(
            "documents",
            format!("missing: {}", missing.join(", ")),
            "Fix navigator.documents paths; upload slots will be skipped",
        );
    }

    let count = configured.iter().filter(|(_, p)| p.is_some()).count();
    CheckResult::pass("documents", format!("{count} configured"))
}

fn exit_code(results: &[CheckResult]) -> i32 {
    let has_fail = results.iter().any(|r| r.status == CheckStatus::Fail);
    let has_warn = results.iter().any(|r| r.status == CheckStatus::Warn);

    if has_fail {
        EXIT_FAILURE
    } else if has_warn {
        EXIT_WARNINGS
    } else {
        EXIT_OK
    }
}

fn write_human_results(results: &[CheckResult], out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "\n formpilot doctor\n")?;

    for result in results {
        let icon = match result.status {
            CheckStatus::Pass => "\x1b[32m[PASS]\x1b[0m",
            CheckStatus::Warn => "\x1b[33m[WARN]\x1b[0m",
            CheckStatus::Fail => "\x1b[31m[FAIL]\x1b[0m",
        };
        writeln!(out, "{icon} {}: {}", result.name, result.message)?;
        if let Some(ref fix) = result.fix {
            writeln!(out, "       Fix: {fix}")?;
        }
    }
    writeln!(out)?;

    let pass_count = results.iter().filter(|r| r.status == CheckStatus::Pass).count();
    let warn_count = results.iter().filter(|r| r.status == CheckStatus::Warn).count();
    let fail_count = results.iter().filter(|r| r.status == CheckStatus::Fail).count();
    if fail_count > 0 {
        writeln!(
            out,
            "Result: {pass_count}/{} checks passed, {warn_count} warnings, {fail_count} failures",
            results.len()
        )
    } else if warn_count > 0 {
        writeln!(
            out,
            "Result: {pass_count}/{} checks passed with {warn_count} warnings",
            results.len()
        )
    } else {
        writeln!(out, "Result: All {} checks passed", results.len())
    }
}

fn write_json_results(results: &[CheckResult], out: &mut dyn Write) -> anyhow::Result<()> {
    let checks: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "name": r.name,
                "status": r.status.as_str(),
                "message": r.message,
                "fix": r.fix,
            })
        })
        .collect();

    let overall = match exit_code(results) {
        EXIT_FAILURE => "fail",
        EXIT_WARNINGS => "warn",
        _ => "pass",
    };
    let output = serde_json::json!({
        "checks": checks,
        "overall": overall,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
        let rules = dir.join("rules.yaml");
        let profile = dir.join("profile.yaml");
        std::fs::write(
            &rules,
            concat!(
                "rules:\n",
                "  - id: city\n",
                "    signature: { field_type: text, q_pattern: city }\n",
                "    strategy: { kind: profile_key, params: { key: contact.city } }\n",
            ),
        )
        .expect("write rules");
        std::fs::write(&profile, "contact:\n  city: Haifa\n").expect("write profile");

        let config = dir.join("formpilot.toml");
        std::fs::write(
            &config,
            format!(
                "[rules]\npath = {:?}\n\n[profile]\npath = {:?}\n{extra}",
                rules.display().to_string(),
                profile.display().to_string()
            ),
        )
        .expect("write config");
        config
    }

    fn status_of(results: &[CheckResult], name: &str) -> CheckStatus {
        results
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.status)
            .expect("check present")
    }

    #[test]
    #[serial]
    fn healthy_setup_passes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = write_config(dir.path(), "");

        let results = diagnose(Some(&config));
        assert!(results.iter().all(|r| r.status == CheckStatus::Pass), "{results:?}");
        assert_eq!(exit_code(&results), EXIT_OK);
    }

    #[test]
    #[serial]
    fn missing_profile_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = write_config(dir.path(), "");
        std::fs::remove_file(dir.path().join("profile.yaml")).expect("remove profile");

        let results = diagnose(Some(&config));
        assert_eq!(status_of(&results, "profile"), CheckStatus::Fail);
        assert_eq!(exit_code(&results), EXIT_FAILURE);
    }

    #[test]
    #[serial]
    fn missing_document_warns() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = write_config(
            dir.path(),
            "\n[navigator.documents]\nresume_path = \"/nonexistent/cv.pdf\"\n",
        );

        let results = diagnose(Some(&config));
        assert_eq!(status_of(&results, "documents"), CheckStatus::Warn);
        assert_eq!(exit_code(&results), EXIT_WARNINGS);
    }

    #[test]
    #[serial]
    fn invalid_config_fails_but_other_checks_still_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = dir.path().join("formpilot.toml");
        std::fs::write(&config, "[navigator]\nmax_steps = 0\n").expect("write config");

        let results = diagnose(Some(&config));
        assert_eq!(status_of(&results, "config"), CheckStatus::Fail);
        assert_eq!(results.len(), 5);
    }

    #[test]
    #[serial]
    fn json_output_carries_overall_status() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = write_config(dir.path(), "");

        let mut out = Vec::new();
        let code = run(DoctorArgs { json: true }, Some(&config), &mut out).expect("run");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(code, EXIT_OK);
        assert_eq!(value["overall"], "pass");
        assert_eq!(value["checks"].as_array().map(Vec::len), Some(5));
    }
}
