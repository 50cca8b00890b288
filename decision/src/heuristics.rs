//! Built-in heuristics consulted when no rule matches

use crate::config::HeuristicsConfig;
use crate::context::{FieldContext, FieldValue};
use crate::normalizer::Normalizer;
use crate::profile::CandidateProfile;
use crate::signature::FieldType;
use crate::strategy::Strategy;

const SALARY_MARKERS: &[&str] = &["salary", "compensation", "зарплат"];
const BIO_MARKERS: &[&str] = &[
    "about you",
    "about yourself",
    "tell us",
    "summary",
    "bio",
    "о себе",
];

/// Field-type-specific fallbacks that need no rule
#[derive(Debug, Clone)]
pub struct Heuristics {
    config: HeuristicsConfig,
    normalizer: Normalizer,
}

impl Heuristics {
    pub fn new(config: HeuristicsConfig, normalizer: Normalizer) -> Self {
        Self { config, normalizer }
    }

    pub fn resolve(&self, field: &FieldContext, profile: &CandidateProfile) -> Option<FieldValue> {
        match field.field_type {
            FieldType::Checkbox => self.checkbox_skill(field, profile),
            FieldType::Number | FieldType::Text => self
                .salary(field, profile)
                .or_else(|| self.bio(field, profile)),
            _ => None,
        }
    }

    /// Checked when the question names a skill the candidate has
    fn checkbox_skill(
        &self,
        field: &FieldContext,
        profile: &CandidateProfile,
    ) -> Option<FieldValue> {
        let skills = profile.skills();
        if skills.is_empty() {
            return None;
        }

        let question = field.normalized_question();
        let tokens: Vec<&str> = question.split(' ').filter(|t| !t.is_empty()).collect();
        let bigrams = tokens.windows(2).map(|w| w.join(" "));
        let candidates = std::iter::once(question.to_string())
            .chain(bigrams)
            .chain(tokens.iter().map(|t| (*t).to_string()));

        for candidate in candidates {
            let canonical = self.normalizer.canonical_skill(&candidate);
            if skills.contains(&canonical) {
                tracing::debug!(skill = %canonical, "checkbox matched candidate skill");
                return Some(FieldValue::Bool(true));
            }
        }
        None
    }

    fn salary(&self, field: &FieldContext, profile: &CandidateProfile) -> Option<FieldValue> {
        let question = field.normalized_question();
        if !SALARY_MARKERS.iter().any(|m| question.contains(m)) {
            return None;
        }
        let strategy = Strategy::SalaryByCurrency {
            base_key_template: self.config.salary_key_template.clone(),
            default_currency: self.normalizer.default_currency().to_string(),
        };
        strategy.resolve(profile, field, &self.normalizer)
    }

    fn bio(&self, field: &FieldContext, profile: &CandidateProfile) -> Option<FieldValue> {
        if !self.config.text_bio_enabled || field.field_type != FieldType::Text {
            return None;
        }
        let question = field.normalized_question();
        let padded = format!(" {question} ");
        if !BIO_MARKERS.iter().any(|m| padded.contains(&format!(" {m} "))) {
            return None;
        }

        let cyrillic = question.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c));
        let key = if cyrillic { "short_bio_ru" } else { "short_bio_en" };
        let bio = profile.lookup_str(key).or_else(|| profile.lookup_str("short_bio_en"))?;
        let truncated: String = bio.chars().take(self.config.bio_max_chars).collect();
        Some(FieldValue::Text(truncated.trim_end().to_string()))
    }
}
