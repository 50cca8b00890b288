//! `formpilot check-rules` - validate a rule store without touching it

use crate::{EXIT_FAILURE, EXIT_OK, EXIT_WARNINGS};
use clap::Parser;
use formpilot_decision::errors::RuleStoreError;
use formpilot_decision::rules::{FileRuleStorage, RuleRepository};
use formpilot_decision::strategy::Strategy;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
pub struct CheckRulesArgs {
    /// Rule store to check (YAML for .yaml/.yml, JSON otherwise)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

/// One record that will not be served
#[derive(Debug, Clone, PartialEq)]
pub struct RuleProblem {
    /// Position in the store; `None` for loaded rules found unusable later
    pub index: Option<usize>,
    pub rule_id: Option<String>,
    pub reason: String,
    pub invalid_regex: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleCheck {
    pub path: PathBuf,
    pub loaded: usize,
    /// Records dropped at load time
    pub skipped: Vec<RuleProblem>,
    /// Loaded rules whose strategy cannot be built
    pub strategy_errors: Vec<RuleProblem>,
    /// The store itself could not be read
    pub error: Option<String>,
}

impl RuleCheck {
    pub fn invalid_regexes(&self) -> usize {
        self.skipped.iter().filter(|p| p.invalid_regex).count()
    }

    pub fn exit_code(&self) -> i32 {
        if self.error.is_some() {
            EXIT_FAILURE
        } else if !self.skipped.is_empty() || !self.strategy_errors.is_empty() {
            EXIT_WARNINGS
        } else {
            EXIT_OK
        }
    }
}

pub fn run(args: CheckRulesArgs, out: &mut dyn Write) -> anyhow::Result<i32> {
    let check = check_rules(&args.file);
    if args.json {
        write_json(&check, out)?;
    } else {
        write_human(&check, out)?;
    }
    Ok(check.exit_code())
}

/// Load `path` the way the engine would and collect every problem.
///
/// A missing file is an error here, unlike at engine startup where it means
/// an empty store.
pub fn check_rules(path: &Path) -> RuleCheck {
    let mut check = RuleCheck {
        path: path.to_path_buf(),
        loaded: 0,
        skipped: Vec::new(),
        strategy_errors: Vec::new(),
        error: None,
    };
    if !path.is_file() {
        check.error = Some(format!("rule store not found: {}", path.display()));
        return check;
    }

    let (repository, report) =
        match RuleRepository::open_with_report(Arc::new(FileRuleStorage::new(path))) {
            Ok(opened) => opened,
            Err(e) => {
                check.error = Some(e.to_string());
                return check;
            }
        };

    check.loaded = report.loaded;
    check.skipped = report.skipped.into_iter().map(skipped_problem).collect();
    check.strategy_errors = repository
        .rules()
        .into_iter()
        .filter_map(|rule| {
            Strategy::create(&rule.strategy.kind, &rule.strategy.params)
                .err()
                .map(|e| RuleProblem {
                    index: None,
                    rule_id: Some(rule.id.clone()),
                    reason: e.to_string(),
                    invalid_regex: false,
                })
        })
        .collect();
    check
}

fn skipped_problem(err: RuleStoreError) -> RuleProblem {
    match err {
        RuleStoreError::MalformedRule { index, reason } => RuleProblem {
            index: Some(index),
            rule_id: None,
            invalid_regex: reason.starts_with("invalid q_pattern"),
            reason,
        },
        other => RuleProblem {
            index: None,
            rule_id: None,
            reason: other.to_string(),
            invalid_regex: false,
        },
    }
}

fn write_human(check: &RuleCheck, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Rule store: {}", check.path.display())?;
    if let Some(error) = &check.error {
        writeln!(out, "[FAIL] {error}")?;
        return Ok(());
    }

    writeln!(
        out,
        "loaded: {}, skipped: {}, invalid regexes: {}",
        check.loaded,
        check.skipped.len(),
        check.invalid_regexes()
    )?;
    for problem in &check.skipped {
        match problem.index {
            Some(index) => writeln!(out, "[WARN] rule #{index}: {}", problem.reason)?,
            None => writeln!(out, "[WARN] {}", problem.reason)?,
        }
    }
    for problem in &check.strategy_errors {
        let id = problem.rule_id.as_deref().unwrap_or("-");
        writeln!(out, "[WARN] rule {id}: {}", problem.reason)?;
    }
    Ok(())
}

fn write_json(check: &RuleCheck, out: &mut dyn Write) -> anyhow::Result<()> {
    let problem_json = |p: &RuleProblem| {
        serde_json::json!({
            "index": p.index,
            "id": p.rule_id,
            "reason": p.reason,
            "invalid_regex": p.invalid_regex,
        })
    };
    let output = serde_json::json!({
        "path": check.path.display().to_string(),
        "loaded": check.loaded,
        "skipped": check.skipped.iter().map(problem_json).collect::<Vec<_>>(),
        "strategy_errors": check.strategy_errors.iter().map(problem_json).collect::<Vec<_>>(),
        "invalid_regexes": check.invalid_regexes(),
        "error": check.error,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}
