//! `formpilot` command line
//!
//! Loads the layered application config and exposes offline tooling over the
//! decision engine: rule store checks, single-field decisions, option
//! fingerprints and a setup doctor. Commands write to the handed-in output
//! and return a process exit code.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod check_rules_cmd;
pub mod config;
pub mod decide_cmd;
pub mod doctor_cmd;

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Checks passed with warnings
pub const EXIT_WARNINGS: i32 = 2;

/// Decision engine tooling for dynamic application forms
#[derive(Debug, Parser)]
#[command(name = "formpilot", version)]
pub struct Cli {
    /// Config file (default: ./formpilot.toml, then the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a rule store: loaded/skipped counts and invalid patterns
    CheckRules(check_rules_cmd::CheckRulesArgs),

    /// Decide one field offline with rules and heuristics
    Decide(decide_cmd::DecideArgs),

    /// Print the order-independent fingerprint of an option list
    Fingerprint(decide_cmd::FingerprintArgs),

    /// Verify config, rule store, profile and documents
    Doctor(doctor_cmd::DoctorArgs),
}

impl Cli {
    pub async fn run(self, out: &mut dyn Write) -> anyhow::Result<i32> {
        match self.command {
            Command::CheckRules(args) => check_rules_cmd::run(args, out),
            Command::Decide(args) => {
                let config = load_config(self.config.as_deref())?;
                decide_cmd::run_decide(args, &config, out).await
            }
            Command::Fingerprint(args) => decide_cmd::run_fingerprint(args, out),
            Command::Doctor(args) => doctor_cmd::run(args, self.config.as_deref(), out),
        }
    }
}

/// Explicit file when given, otherwise the default locations
pub fn load_config(path: Option<&Path>) -> config::Result<config::AppConfig> {
    match path {
        Some(path) => config::ConfigLoader::new().with_file(path).load(),
        None => config::ConfigLoader::load_default(),
    }
}
