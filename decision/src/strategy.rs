//! Value-resolution strategies
//!
//! Each strategy is a pure function of the candidate profile and the field
//! under evaluation. `None` is a miss, never an error: the decision cascade
//! simply moves on to the next resolver.

use crate::context::{FieldContext, FieldValue};
use crate::errors::StrategyError;
use crate::normalizer::Normalizer;
use crate::profile::{CandidateProfile, as_number};
use crate::rules::StrategySpec;
use crate::signature::normalize;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const LITERAL: &str = "literal";
pub const PROFILE_KEY: &str = "profile_key";
pub const NUMERIC_FROM_PROFILE: &str = "numeric_from_profile";
pub const ONE_OF_OPTIONS: &str = "one_of_options";
pub const ONE_OF_OPTIONS_FROM_PROFILE: &str = "one_of_options_from_profile";
pub const SALARY_BY_CURRENCY: &str = "salary_by_currency";

/// Minimum token-set similarity for the fuzzy option tier
const FUZZY_THRESHOLD: f64 = 0.85;

pub const KNOWN_KINDS: &[&str] = &[
    LITERAL,
    PROFILE_KEY,
    NUMERIC_FROM_PROFILE,
    ONE_OF_OPTIONS,
    ONE_OF_OPTIONS_FROM_PROFILE,
    SALARY_BY_CURRENCY,
];

/// Canonical answer → accepted surface forms, in declaration order
pub type SynonymTable = Vec<(String, Vec<String>)>;

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Literal {
        value: Value,
    },
    ProfileKey {
        key: String,
    },
    NumericFromProfile {
        key: String,
    },
    OneOfOptions {
        preferred: Vec<String>,
        synonyms: SynonymTable,
    },
    OneOfOptionsFromProfile {
        key: String,
        synonyms: SynonymTable,
    },
    SalaryByCurrency {
        base_key_template: String,
        default_currency: String,
    },
}

#[derive(Deserialize)]
struct LiteralParams {
    value: Value,
}

#[derive(Deserialize)]
struct KeyParams {
    key: String,
}

#[derive(Deserialize)]
struct OneOfOptionsParams {
    #[serde(default)]
    preferred: Vec<String>,
    #[serde(default)]
    synonyms: Map<String, Value>,
}

#[derive(Deserialize)]
struct FromProfileParams {
    key: String,
    #[serde(default)]
    synonyms: Map<String, Value>,
}

#[derive(Deserialize)]
struct SalaryParams {
    base_key_template: String,
    #[serde(default = "default_currency")]
    default_currency: String,
}

fn default_currency() -> String {
    "nis".to_string()
}

impl Strategy {
    /// Build a strategy from its kind and untyped params.
    pub fn create(kind: &str, params: &Map<String, Value>) -> Result<Self, StrategyError> {
        match kind {
            LITERAL => {
                let p: LiteralParams = parse_params(kind, params)?;
                Ok(Self::Literal { value: p.value })
            }
            PROFILE_KEY => {
                let p: KeyParams = parse_params(kind, params)?;
                Ok(Self::ProfileKey {
                    key: non_empty(kind, "key", p.key)?,
                })
            }
            NUMERIC_FROM_PROFILE => {
                let p: KeyParams = parse_params(kind, params)?;
                Ok(Self::NumericFromProfile {
                    key: non_empty(kind, "key", p.key)?,
                })
            }
            ONE_OF_OPTIONS => {
                let p: OneOfOptionsParams = parse_params(kind, params)?;
                let synonyms = parse_synonyms(kind, p.synonyms)?;
                if p.preferred.is_empty() && synonyms.is_empty() {
                    return Err(invalid(kind, "needs `preferred` or `synonyms`"));
                }
                Ok(Self::OneOfOptions {
                    preferred: p.preferred,
                    synonyms,
                })
            }
            ONE_OF_OPTIONS_FROM_PROFILE => {
                let p: FromProfileParams = parse_params(kind, params)?;
                Ok(Self::OneOfOptionsFromProfile {
                    key: non_empty(kind, "key", p.key)?,
                    synonyms: parse_synonyms(kind, p.synonyms)?,
                })
            }
            SALARY_BY_CURRENCY => {
                let p: SalaryParams = parse_params(kind, params)?;
                Ok(Self::SalaryByCurrency {
                    base_key_template: non_empty(kind, "base_key_template", p.base_key_template)?,
                    default_currency: non_empty(kind, "default_currency", p.default_currency)?,
                })
            }
            other => Err(StrategyError::Unknown(other.to_string())),
        }
    }

    /// Build from a rule's spec after filling `{placeholder}`s from question captures.
    pub fn from_spec(
        spec: &StrategySpec,
        captures: &BTreeMap<String, String>,
    ) -> Result<Self, StrategyError> {
        if captures.is_empty() {
            return Self::create(&spec.kind, &spec.params);
        }
        let params = spec
            .params
            .iter()
            .map(|(k, v)| (k.clone(), substitute(v, captures)))
            .collect();
        Self::create(&spec.kind, &params)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Literal { .. } => LITERAL,
            Self::ProfileKey { .. } => PROFILE_KEY,
            Self::NumericFromProfile { .. } => NUMERIC_FROM_PROFILE,
            Self::OneOfOptions { .. } => ONE_OF_OPTIONS,
            Self::OneOfOptionsFromProfile { .. } => ONE_OF_OPTIONS_FROM_PROFILE,
            Self::SalaryByCurrency { .. } => SALARY_BY_CURRENCY,
        }
    }

    pub fn resolve(
        &self,
        profile: &CandidateProfile,
        field: &FieldContext,
        normalizer: &Normalizer,
    ) -> Option<FieldValue> {
        match self {
            Self::Literal { value } => FieldValue::from_json(value),
            Self::ProfileKey { key } => profile.lookup(key).and_then(FieldValue::from_json),
            Self::NumericFromProfile { key } => {
                let n = as_number(profile.lookup(key)?)?;
                n.is_finite().then_some(FieldValue::Number(n.trunc() as i64))
            }
            Self::OneOfOptions {
                preferred,
                synonyms,
            } => pick_preferred(preferred, &field.options)
                .or_else(|| pick_by_synonyms(synonyms, &field.options))
                .or_else(|| {
                    preferred
                        .iter()
                        .map(String::as_str)
                        .chain(synonyms.iter().map(|(canonical, _)| canonical.as_str()))
                        .find_map(|target| fuzzy_pick(target, &field.options))
                })
                .map(FieldValue::Text),
            Self::OneOfOptionsFromProfile { key, synonyms } => {
                pick_from_profile(profile.lookup(key)?, synonyms, &field.options)
                    .map(FieldValue::Text)
            }
            Self::SalaryByCurrency {
                base_key_template,
                default_currency,
            } => {
                let currency = normalizer
                    .detect_currency(&field.question, field.normalized_question())
                    .unwrap_or_else(|| default_currency.clone());
                let key = base_key_template.replace("{currency}", &currency);
                profile.lookup(&key).and_then(FieldValue::from_json)
            }
        }
    }
}

fn parse_params<T: DeserializeOwned>(
    kind: &str,
    params: &Map<String, Value>,
) -> Result<T, StrategyError> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| invalid(kind, &e.to_string()))
}

fn invalid(kind: &str, reason: &str) -> StrategyError {
    StrategyError::InvalidParams {
        kind: kind.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(kind: &str, name: &str, value: String) -> Result<String, StrategyError> {
    if value.trim().is_empty() {
        Err(invalid(kind, &format!("`{name}` must not be empty")))
    } else {
        Ok(value)
    }
}

/// Accepts `{canonical: [forms...]}` or `{canonical: form}`
fn parse_synonyms(kind: &str, raw: Map<String, Value>) -> Result<SynonymTable, StrategyError> {
    raw.into_iter()
        .map(|(canonical, forms)| {
            let forms = match forms {
                Value::String(s) => vec![s],
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s),
                        other => Err(invalid(
                            kind,
                            &format!("synonym for `{canonical}` is not a string: {other}"),
                        )),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => {
                    return Err(invalid(
                        kind,
                        &format!("synonyms for `{canonical}` must be a list, got {other}"),
                    ));
                }
            };
            Ok((canonical, forms))
        })
        .collect()
}

fn substitute(value: &Value, captures: &BTreeMap<String, String>) -> Value {
    match value {
        Value::String(s) if s.contains('{') => {
            let mut out = s.clone();
            for (name, captured) in captures {
                out = out.replace(&format!("{{{name}}}"), captured);
            }
            Value::String(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| substitute(v, captures)).collect())
        }
        other => other.clone(),
    }
}

fn pick_preferred(preferred: &[String], options: &[String]) -> Option<String> {
    let normalized: Vec<String> = options.iter().map(|o| normalize(o)).collect();

    for pref in preferred {
        let want = normalize(pref);
        if let Some(i) = normalized.iter().position(|o| *o == want) {
            return Some(options[i].clone());
        }
    }
    for pref in preferred {
        let want = normalize(pref);
        if want.chars().count() < 2 {
            continue;
        }
        if let Some(i) = normalized.iter().position(|o| o.contains(&want)) {
            return Some(options[i].clone());
        }
    }
    None
}

/// First canonical (in declaration order) that any option spells out wins.
fn pick_by_synonyms(synonyms: &SynonymTable, options: &[String]) -> Option<String> {
    synonyms
        .iter()
        .find_map(|(canonical, forms)| pick_by_forms(canonical, forms, options))
}

fn pick_by_forms(canonical: &str, forms: &[String], options: &[String]) -> Option<String> {
    let targets: Vec<String> = std::iter::once(canonical)
        .chain(forms.iter().map(String::as_str))
        .map(normalize)
        .filter(|t| !t.is_empty())
        .collect();
    options
        .iter()
        .find(|o| targets.contains(&normalize(o)))
        .cloned()
}

/// Closest option to `target` by token-set similarity, if any clears the
/// threshold. Ties keep the earlier option.
fn fuzzy_pick(target: &str, options: &[String]) -> Option<String> {
    let target = normalize(target);
    if target.is_empty() {
        return None;
    }
    let mut best: Option<(f64, &String)> = None;
    for option in options {
        let score = token_set_similarity(&target, &normalize(option));
        if score < FUZZY_THRESHOLD {
            continue;
        }
        if best.is_none_or(|(top, _)| score > top) {
            best = Some((score, option));
        }
    }
    best.map(|(_, option)| option.clone())
}

/// Word order and repeated words do not count; a side whose words are all
/// shared scores against the shared part alone.
fn token_set_similarity(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    let join = |words: Vec<&str>| words.join(" ");

    let common = join(left.intersection(&right).copied().collect());
    let with_rest = |only: Vec<&str>| {
        let rest = join(only);
        match (common.is_empty(), rest.is_empty()) {
            (true, _) => rest,
            (false, true) => common.clone(),
            (false, false) => format!("{common} {rest}"),
        }
    };
    let full_left = with_rest(left.difference(&right).copied().collect());
    let full_right = with_rest(right.difference(&left).copied().collect());

    let mut score = strsim::normalized_levenshtein(&full_left, &full_right);
    if !common.is_empty() {
        score = score
            .max(strsim::normalized_levenshtein(&common, &full_left))
            .max(strsim::normalized_levenshtein(&common, &full_right));
    }
    score
}

fn pick_from_profile(
    value: &Value,
    synonyms: &SynonymTable,
    options: &[String],
) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "yes".to_string(),
        Value::Bool(false) => "no".to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let wanted = normalize(&raw);

    let entry = synonyms.iter().find(|(canonical, forms)| {
        normalize(canonical) == wanted || forms.iter().any(|f| normalize(f) == wanted)
    });
    if let Some((canonical, forms)) = entry {
        if let Some(option) = pick_by_forms(canonical, forms, options) {
            return Some(option);
        }
    }

    options.iter().find(|o| normalize(o) == wanted).cloned()
}
