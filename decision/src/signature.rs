//! Field signatures
//!
//! A signature is the comparable identity of a form field: its type, its
//! normalized question text, an order-independent fingerprint of its options
//! and the scope (site, form kind, locales) it was observed in. Signatures are
//! built fresh for every field evaluation and never persisted on their own.

use crate::errors::DecisionError;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Scope value that matches any site or form kind.
pub const WILDCARD: &str = "*";

/// Separator used when hashing option lists; never produced by `normalize_option`.
const OPTION_SEPARATOR: char = '\u{1f}';

/// Kind of widget a field is rendered as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Radio,
    Checkbox,
    Select,
    Combobox,
    Number,
    Text,
    Multiselect,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Select => "select",
            Self::Combobox => "combobox",
            Self::Number => "number",
            Self::Text => "text",
            Self::Multiselect => "multiselect",
        }
    }

    /// Whether fields of this type pick one value out of a discrete option list
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Radio | Self::Select | Self::Combobox)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "radio" => Ok(Self::Radio),
            "checkbox" => Ok(Self::Checkbox),
            "select" => Ok(Self::Select),
            "combobox" => Ok(Self::Combobox),
            "number" => Ok(Self::Number),
            "text" => Ok(Self::Text),
            "multiselect" => Ok(Self::Multiselect),
            other => Err(DecisionError::Signature(format!(
                "unknown field type: {other}"
            ))),
        }
    }
}

/// Where a form lives. Shared by every field of one application session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormScope {
    #[serde(default = "default_wildcard")]
    pub site: String,

    #[serde(default = "default_wildcard")]
    pub form_kind: String,

    #[serde(default)]
    pub locale: BTreeSet<String>,
}

fn default_wildcard() -> String {
    WILDCARD.to_string()
}

impl Default for FormScope {
    fn default() -> Self {
        Self {
            site: default_wildcard(),
            form_kind: default_wildcard(),
            locale: BTreeSet::new(),
        }
    }
}

impl FormScope {
    pub fn new(site: impl Into<String>, form_kind: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            form_kind: form_kind.into(),
            locale: BTreeSet::new(),
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale.insert(locale.into());
        self
    }

    /// Whether a rule scoped to `self` applies to a field observed in `observed`.
    ///
    /// `*` on the rule side matches anything. An empty locale set on either
    /// side means "unknown" and passes; otherwise the sets must intersect.
    pub fn admits(&self, observed: &FormScope) -> bool {
        let component = |rule: &str, seen: &str| {
            rule == WILDCARD || rule.is_empty() || rule.eq_ignore_ascii_case(seen)
        };
        component(&self.site, &observed.site)
            && component(&self.form_kind, &observed.form_kind)
            && (self.locale.is_empty()
                || observed.locale.is_empty()
                || !self.locale.is_disjoint(&observed.locale))
    }
}

/// Normalized identity of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSignature {
    pub field_type: FieldType,
    pub normalized_question: String,
    pub options_fingerprint: Option<String>,
    pub scope: FormScope,
}

impl FieldSignature {
    /// Build a signature; the fingerprint is present iff `options` is non-empty.
    pub fn new(
        scope: &FormScope,
        question: &str,
        field_type: FieldType,
        options: &[String],
    ) -> Self {
        let fingerprint = fingerprint(options);
        Self {
            field_type,
            normalized_question: normalize(question),
            options_fingerprint: (!fingerprint.is_empty()).then_some(fingerprint),
            scope: scope.clone(),
        }
    }
}

/// Normalize question text for matching.
///
/// Drops inline markup, lowercases, turns punctuation into spaces, collapses
/// whitespace and then collapses self-duplicated text (`"x yx y"`, `"a b a b"`)
/// until nothing more collapses.
pub fn normalize(question: &str) -> String {
    let mut cleaned = String::with_capacity(question.len());
    let mut in_tag = false;
    for c in question.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                cleaned.push(' ');
            }
            _ if in_tag => {}
            c if c.is_alphanumeric() || c == '_' => cleaned.extend(c.to_lowercase()),
            _ => cleaned.push(' '),
        }
    }

    let mut text = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    while let Some(half) = duplicated_half(&text) {
        text = half;
    }
    text
}

fn duplicated_half(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text.split(' ').collect();
    if tokens.len() >= 2 && tokens.len() % 2 == 0 {
        let (left, right) = tokens.split_at(tokens.len() / 2);
        if left == right {
            return Some(left.join(" "));
        }
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() >= 2 && chars.len() % 2 == 0 {
        let (left, right) = chars.split_at(chars.len() / 2);
        if left == right {
            return Some(left.iter().collect());
        }
    }
    None
}

/// Trim, case-fold and collapse internal whitespace of one option label.
pub fn normalize_option(option: &str) -> String {
    option
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Order-independent fingerprint of an option list, e.g. `sha1:3f786850...`.
///
/// Returns an empty string for an empty list.
pub fn fingerprint(options: &[String]) -> String {
    if options.is_empty() {
        return String::new();
    }

    let mut normalized: Vec<String> = options
        .iter()
        .map(|o| normalize_option(o.as_str()))
        .collect();
    normalized.sort();
    let joined = normalized.join(&OPTION_SEPARATOR.to_string());

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha1:{hex}")
}
