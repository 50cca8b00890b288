//! What a resolver sees for one field, and what it hands back

use crate::signature::{FieldSignature, FieldType, FormScope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Optional description of the job being applied to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobContext {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub company: String,

    #[serde(default)]
    pub description: String,
}

/// One field under evaluation
#[derive(Debug, Clone)]
pub struct FieldContext {
    /// Question text as rendered
    pub question: String,
    pub field_type: FieldType,
    pub options: Vec<String>,
    pub signature: FieldSignature,
    pub job: Option<JobContext>,
}

impl FieldContext {
    pub fn new(
        scope: &FormScope,
        question: &str,
        field_type: FieldType,
        options: &[String],
    ) -> Self {
        Self {
            question: question.to_string(),
            field_type,
            options: options.to_vec(),
            signature: FieldSignature::new(scope, question, field_type, options),
            job: None,
        }
    }

    pub fn with_job(mut self, job: Option<JobContext>) -> Self {
        self.job = job;
        self
    }

    pub fn normalized_question(&self) -> &str {
        &self.signature.normalized_question
    }

    pub fn scope(&self) -> &FormScope {
        &self.signature.scope
    }
}

/// A concrete value to put into a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON scalar. Null, arrays and objects carry no field value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(
                n.as_i64()
                    .map(Self::Number)
                    .unwrap_or_else(|| Self::Text(n.to_string())),
            ),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Whether a checkbox should end up checked for this value
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0,
            Self::Text(s) => {
                let s = s.trim().to_lowercase();
                !s.is_empty() && !matches!(s.as_str(), "false" | "no" | "0" | "off" | "нет")
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}
