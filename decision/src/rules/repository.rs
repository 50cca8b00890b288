use super::storage::{FileRuleStorage, InMemoryRuleStorage, RuleDocument, RuleStorage};
use super::Rule;
use crate::errors::RuleStoreError;
use crate::signature::{FieldSignature, FieldType};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// A rule that matched, plus the question captures its params may reference
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule: Rule,
    /// Named groups by name, positional groups by number (`"1"`, `"2"`, ...)
    pub captures: BTreeMap<String, String>,
}

/// Outcome of indexing a store
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<RuleStoreError>,
}

#[derive(Debug)]
struct IndexedRule {
    rule: Rule,
    /// `None` for an empty pattern, which matches every question
    pattern: Option<Regex>,
}

/// Ordered rule collection over an injected storage backend.
///
/// Lookups are first-match in store order. Appends go through the backend and
/// then re-index from what the backend reports as persisted.
pub struct RuleRepository {
    storage: Arc<dyn RuleStorage>,
    index: RwLock<Vec<IndexedRule>>,
}

impl std::fmt::Debug for RuleRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRepository")
            .field("storage", &self.storage.describe())
            .field("rules", &self.len())
            .finish()
    }
}

impl RuleRepository {
    /// Load from a backend; malformed records are skipped with a warning.
    pub fn open(storage: Arc<dyn RuleStorage>) -> Result<Self, RuleStoreError> {
        Self::open_with_report(storage).map(|(repo, _)| repo)
    }

    /// [`RuleRepository::open`], also returning what was loaded and skipped
    pub fn open_with_report(
        storage: Arc<dyn RuleStorage>,
    ) -> Result<(Self, LoadReport), RuleStoreError> {
        let repo = Self {
            storage,
            index: RwLock::new(Vec::new()),
        };
        let report = repo.reload()?;
        Ok((repo, report))
    }

    pub fn from_file(path: &Path) -> Result<Self, RuleStoreError> {
        Self::open(Arc::new(FileRuleStorage::new(path)))
    }

    /// Repository over an in-memory backend seeded with `rules`
    pub fn in_memory(rules: Vec<Rule>) -> Result<Self, RuleStoreError> {
        let records = rules
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RuleStoreError::Serialize(e.to_string()))?;
        Self::open(Arc::new(InMemoryRuleStorage::new(records)))
    }

    /// Re-read the backend
    pub fn reload(&self) -> Result<LoadReport, RuleStoreError> {
        let doc = self.storage.load()?;
        let (indexed, report) = index_document(&doc);
        tracing::info!(
            store = %self.storage.describe(),
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "rules loaded"
        );
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = indexed;
        Ok(report)
    }

    pub fn len(&self) -> usize {
        self.index.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the valid rules in store order
    pub fn rules(&self) -> Vec<Rule> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.rule.clone())
            .collect()
    }

    /// First rule in store order matching `signature`
    pub fn find(&self, signature: &FieldSignature) -> Option<RuleMatch> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.iter().find_map(|indexed| {
            let rule = &indexed.rule;
            if rule.signature.field_type != signature.field_type
                || !rule.scope.admits(&signature.scope)
            {
                return None;
            }
            if let Some(expected) = &rule.signature.options_fingerprint {
                if signature.options_fingerprint.as_ref() != Some(expected) {
                    return None;
                }
            }

            let captures = match &indexed.pattern {
                None => BTreeMap::new(),
                Some(re) => capture_map(re, &signature.normalized_question)?,
            };
            Some(RuleMatch {
                rule: rule.clone(),
                captures,
            })
        })
    }

    /// Id of an existing rule with the same field type and pattern (ignoring case)
    pub fn find_duplicate(&self, field_type: FieldType, pattern: &str) -> Option<String> {
        let pattern = pattern.trim().to_lowercase();
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| {
                r.rule.signature.field_type == field_type
                    && r.rule.signature.question_regex.trim().to_lowercase() == pattern
            })
            .map(|r| r.rule.id.clone())
    }

    /// Append durably, then refresh the index from the persisted document
    pub fn add(&self, rule: Rule) -> Result<(), RuleStoreError> {
        let id = rule.id.clone();
        let record =
            serde_json::to_value(&rule).map_err(|e| RuleStoreError::Serialize(e.to_string()))?;
        let doc = self.storage.append(record)?;
        let (indexed, _) = index_document(&doc);
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = indexed;
        tracing::info!(id = %id, store = %self.storage.describe(), "rule appended");
        Ok(())
    }
}

fn index_document(doc: &RuleDocument) -> (Vec<IndexedRule>, LoadReport) {
    let mut indexed = Vec::with_capacity(doc.rules.len());
    let mut report = LoadReport::default();

    for (index, record) in doc.rules.iter().enumerate() {
        match index_record(index, record) {
            Ok(rule) => indexed.push(rule),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed rule");
                report.skipped.push(err);
            }
        }
    }
    report.loaded = indexed.len();
    (indexed, report)
}

fn index_record(index: usize, record: &serde_json::Value) -> Result<IndexedRule, RuleStoreError> {
    let rule: Rule = serde_json::from_value(record.clone()).map_err(|e| {
        RuleStoreError::MalformedRule {
            index,
            reason: e.to_string(),
        }
    })?;

    let pattern = rule.signature.question_regex.trim();
    let pattern = if pattern.is_empty() {
        None
    } else {
        Some(compile_pattern(pattern).map_err(|e| RuleStoreError::MalformedRule {
            index,
            reason: format!("invalid q_pattern: {e}"),
        })?)
    };

    Ok(IndexedRule { rule, pattern })
}

/// Compile a question pattern the way rules are matched: case-insensitive search.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn capture_map(re: &Regex, text: &str) -> Option<BTreeMap<String, String>> {
    let caps = re.captures(text)?;
    let mut map = BTreeMap::new();
    for (i, name) in re.capture_names().enumerate().skip(1) {
        let Some(m) = caps.get(i) else { continue };
        map.insert(i.to_string(), m.as_str().to_string());
        if let Some(name) = name {
            map.insert(name.to_string(), m.as_str().to_string());
        }
    }
    Some(map)
}
