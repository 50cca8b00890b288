//! Command dispatch through the parsed command line

#![allow(clippy::expect_used, clippy::unwrap_used)]

use clap::Parser;
use formpilot_cli::{Cli, EXIT_OK, EXIT_WARNINGS};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::path::Path;

const RULES: &str = r#"
rules:
  - id: notice
    signature: { field_type: text, q_pattern: "notice period" }
    strategy: { kind: profile_key, params: { key: notice_period } }
  - id: broken
    signature: { field_type: text, q_pattern: "((" }
    strategy: { kind: literal, params: { value: x } }
"#;

fn setup(dir: &Path) -> std::path::PathBuf {
    let rules = dir.join("rules.yaml");
    let profile = dir.join("profile.json");
    std::fs::write(&rules, RULES).expect("write rules");
    std::fs::write(&profile, r#"{"notice_period": "one month"}"#).expect("write profile");

    let config = dir.join("formpilot.toml");
    std::fs::write(
        &config,
        format!(
            "[rules]\npath = {:?}\n\n[profile]\npath = {:?}\n",
            rules.display().to_string(),
            profile.display().to_string()
        ),
    )
    .expect("write config");
    config
}

async fn run(args: &[&str]) -> (i32, String) {
    let cli = Cli::try_parse_from(args).expect("parse args");
    let mut out = Vec::new();
    let code = cli.run(&mut out).await.expect("run command");
    (code, String::from_utf8(out).expect("utf8"))
}

#[tokio::test]
#[serial]
async fn decide_uses_rule_store_from_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = setup(dir.path());
    let config = config.to_str().expect("utf8 path");

    let (code, output) = run(&[
        "formpilot",
        "--config",
        config,
        "decide",
        "--question",
        "What is your notice period?",
    ])
    .await;
    assert_eq!(code, EXIT_OK);
    assert!(output.contains("decision: one month"), "{output}");
}

#[tokio::test]
#[serial]
async fn decide_prints_type_default_as_json() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = setup(dir.path());
    let config = config.to_str().expect("utf8 path");

    let (_, output) = run(&[
        "formpilot",
        "decide",
        "--config",
        config,
        "--question",
        "Preferred shift",
        "--type",
        "radio",
        "--option",
        "Morning",
        "--option",
        "Evening",
        "--json",
    ])
    .await;
    let value: serde_json::Value = serde_json::from_str(&output).expect("json");
    assert_eq!(value["value"], "Morning");
    assert_eq!(value["defaulted"], true);
}

#[tokio::test]
async fn check_rules_warns_on_skipped_records() {
    let dir = tempfile::tempdir().expect("temp dir");
    setup(dir.path());
    let rules = dir.path().join("rules.yaml");

    let (code, output) = run(&["formpilot", "check-rules", rules.to_str().expect("utf8")]).await;
    assert_eq!(code, EXIT_WARNINGS);
    assert!(output.contains("loaded: 1, skipped: 1, invalid regexes: 1"), "{output}");
}

#[tokio::test]
async fn fingerprint_prints_sha1() {
    let (code, output) = run(&["formpilot", "fingerprint", "Yes", "No"]).await;
    assert_eq!(code, EXIT_OK);
    assert!(output.trim().starts_with("sha1:"));
}

#[test]
fn fingerprint_requires_options() {
    assert!(Cli::try_parse_from(["formpilot", "fingerprint"]).is_err());
}
