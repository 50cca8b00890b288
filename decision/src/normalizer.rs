//! Synonym-aware lookups on top of [`crate::signature::normalize`]

use crate::config::NormalizerConfig;
use crate::signature::normalize;

const BUILTIN_CURRENCIES: &[(&str, &[&str])] = &[
    ("usd", &["usd", "dollar", "dollars", "доллар", "долларов"]),
    ("eur", &["eur", "euro", "euros", "евро"]),
    ("nis", &["nis", "ils", "shekel", "shekels", "шекель", "шекелей"]),
];

/// Resolves skills and currencies mentioned in question text
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn default_currency(&self) -> &str {
        &self.config.default_currency
    }

    /// Map a term to its canonical skill name; unknown terms map to themselves.
    pub fn canonical_skill(&self, term: &str) -> String {
        let term = normalize(term);
        for (canonical, forms) in &self.config.skill_synonyms {
            if normalize(canonical) == term || forms.iter().any(|f| normalize(f) == term) {
                return canonical.clone();
            }
        }
        term
    }

    /// Detect a currency code from the raw and normalized question text.
    ///
    /// Symbols are checked on the raw text since normalization strips them.
    pub fn detect_currency(&self, raw: &str, normalized: &str) -> Option<String> {
        if raw.contains('$') {
            return Some("usd".to_string());
        }
        if raw.contains('€') {
            return Some("eur".to_string());
        }
        if raw.contains('₪') {
            return Some("nis".to_string());
        }

        let padded = format!(" {normalized} ");
        let mentions = |form: &str| {
            let form = normalize(form);
            !form.is_empty() && padded.contains(&format!(" {form} "))
        };

        if self.config.currency_synonyms.is_empty() {
            BUILTIN_CURRENCIES
                .iter()
                .find(|(code, forms)| mentions(code) || forms.iter().any(|f| mentions(f)))
                .map(|(code, _)| (*code).to_string())
        } else {
            self.config
                .currency_synonyms
                .iter()
                .find(|(code, forms)| mentions(code) || forms.iter().any(|f| mentions(f)))
                .map(|(code, _)| code.clone())
        }
    }
}
