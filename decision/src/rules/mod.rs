//! Rules and the rule repository
//!
//! A rule maps a field signature pattern to a value-resolution strategy. The
//! persisted form is a human-editable YAML or JSON document:
//!
//! ```yaml
//! schema_version: "1.0"
//! rules:
//!   - id: work_auth_us
//!     scope: { site: "*", form_kind: job_apply, locale: [en] }
//!     signature:
//!       field_type: radio
//!       q_pattern: "authorized to work"
//!     strategy:
//!       kind: one_of_options_from_profile
//!       params: { key: work_authorization.US, synonyms: { "Yes": [yes, authorized], "No": [no] } }
//! ```
//!
//! Store order is significant: the first matching rule wins.

mod repository;
mod storage;

pub use repository::{LoadReport, RuleMatch, RuleRepository, compile_pattern};
pub use storage::{FileRuleStorage, InMemoryRuleStorage, RuleDocument, RuleStorage};

use crate::signature::{FieldType, FormScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SCHEMA_VERSION: &str = "1.0";

/// Persisted mapping from a signature pattern to a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,

    #[serde(default)]
    pub scope: FormScope,

    #[serde(alias = "signature_pattern")]
    pub signature: SignaturePattern,

    pub strategy: StrategySpec,

    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RuleMeta>,
}

/// Which fields a rule applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignaturePattern {
    pub field_type: FieldType,

    /// Searched case-insensitively in the normalized question; empty matches all
    #[serde(default, rename = "q_pattern", alias = "question_regex")]
    pub question_regex: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_fingerprint: Option<String>,
}

/// Strategy kind plus its untyped parameters, validated on use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub kind: String,

    #[serde(default)]
    pub params: Map<String, Value>,
}

impl StrategySpec {
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self {
            kind: kind.into(),
            params: match params {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.required.is_none()
    }
}

/// Provenance of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMeta {
    /// `manual` for hand-written rules, `learned` for committed suggestions
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub hits: u64,
}
