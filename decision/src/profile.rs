//! Candidate profile
//!
//! A read-only nested document (YAML or JSON) loaded once per session.
//! Values are addressed by dotted paths with optional list indices:
//! `contact.phone`, `years_experience.python`, `languages[0].level`.

use crate::config::is_yaml;
use crate::errors::{DecisionError, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateProfile {
    root: Value,
}

impl CandidateProfile {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Load from YAML (`.yaml`/`.yml`) or JSON
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DecisionError::config_with_source(
                format!("failed to read profile at {}", path.display()),
                e,
            )
        })?;

        let root: Value = if is_yaml(path) {
            serde_yaml::from_str(&contents)
                .map_err(|e| DecisionError::config_with_source("failed to parse profile", e))?
        } else {
            serde_json::from_str(&contents)
                .map_err(|e| DecisionError::config_with_source("failed to parse profile", e))?
        };

        tracing::info!(path = %path.display(), "candidate profile loaded");
        Ok(Self { root })
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Resolve a dotted/indexed path; `None` when any segment is absent.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }

        let mut current = &self.root;
        for segment in path.split('.') {
            let (key, indices) = split_indices(segment)?;
            if !key.is_empty() {
                current = current.as_object()?.get(key)?;
            }
            for index in indices {
                current = current.as_array()?.get(index)?;
            }
        }

        (!current.is_null()).then_some(current)
    }

    /// Path lookup rendered as a plain string. Objects and arrays do not render.
    pub fn lookup_str(&self, path: &str) -> Option<String> {
        match self.lookup(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Skills with positive years of experience, plus any listed under `skills`.
    pub fn skills(&self) -> BTreeSet<String> {
        let mut skills = BTreeSet::new();
        if let Some(years) = self.root.get("years_experience").and_then(Value::as_object) {
            for (skill, value) in years {
                if as_number(value).is_some_and(|n| n > 0.0) {
                    skills.insert(skill.to_lowercase());
                }
            }
        }
        if let Some(listed) = self.root.get("skills").and_then(Value::as_array) {
            skills.extend(listed.iter().filter_map(Value::as_str).map(str::to_lowercase));
        }
        skills
    }
}

/// Numeric view of a profile value; numeric strings count.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `languages[0][1]` → (`languages`, [0, 1])
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };

    let key = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let close = stripped.find(']')?;
        indices.push(stripped[..close].trim().parse().ok()?);
        rest = &stripped[close + 1..];
    }
    rest.is_empty().then_some((key, indices))
}
