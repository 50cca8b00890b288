//! Label classification for buttons, error banners and upload slots

use formpilot_decision::FieldValue;
use formpilot_decision::signature::normalize_option;
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

const NEXT_PATTERN: &str = r"(next|continue|review|proceed|далее|продолжить|обзор|проверить)";
const SUBMIT_PATTERN: &str = r"(submit|send|finish|отправить|подтвердить)";
const VALIDATION_ERROR_PATTERN: &str = r"(error|invalid|required|неверный|ошибка|обязательное)";
const COVER_LETTER_PATTERN: &str = r"(cover|soprovoditel|motivation|сопровод|мотивац)";
const RESUME_PATTERN: &str = r"(resume|résumé|\bcv\b|резюме)";

/// Role of a navigation button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonRole {
    Next,
    Submit,
}

/// Which configured document an upload slot wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::CoverLetter => "cover_letter",
        }
    }
}

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| RegexBuilder::new(pattern).case_insensitive(true).build().ok())
        .as_ref()
}

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> bool {
    cached(cell, pattern).is_some_and(|re| re.is_match(text))
}

/// Submit wins over next when a label matches both.
pub fn classify_button(label: &str) -> Option<ButtonRole> {
    static SUBMIT: OnceLock<Option<Regex>> = OnceLock::new();
    static NEXT: OnceLock<Option<Regex>> = OnceLock::new();

    let label = label.trim();
    if matches(&SUBMIT, SUBMIT_PATTERN, label) {
        Some(ButtonRole::Submit)
    } else if matches(&NEXT, NEXT_PATTERN, label) {
        Some(ButtonRole::Next)
    } else {
        None
    }
}

pub fn is_validation_error(text: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    matches(&RE, VALIDATION_ERROR_PATTERN, text)
}

pub fn classify_document(label: &str) -> Option<DocumentKind> {
    static COVER: OnceLock<Option<Regex>> = OnceLock::new();
    static RESUME: OnceLock<Option<Regex>> = OnceLock::new();

    if matches(&COVER, COVER_LETTER_PATTERN, label) {
        Some(DocumentKind::CoverLetter)
    } else if matches(&RESUME, RESUME_PATTERN, label) {
        Some(DocumentKind::Resume)
    } else {
        None
    }
}

/// `"<legend>. <label>"`, or whichever part is present.
pub fn checkbox_question(legend: Option<&str>, label: &str) -> String {
    let legend = legend.map(str::trim).unwrap_or_default();
    let label = label.trim();
    match (legend.is_empty(), label.is_empty()) {
        (false, false) => format!("{legend}. {label}"),
        (false, true) => legend.to_string(),
        _ => label.to_string(),
    }
}

pub fn is_numeric_input_mode(mode: Option<&str>) -> bool {
    mode.map(|m| m.trim().to_ascii_lowercase())
        .is_some_and(|m| m == "numeric" || m == "decimal")
}

/// Option whose normalized label equals `target`'s
pub fn match_option<'a>(target: &str, options: &'a [String]) -> Option<&'a String> {
    let wanted = normalize_option(target);
    options.iter().find(|o| normalize_option(o) == wanted)
}

/// Typeahead match: exact, then prefix, then substring, else the first option.
pub fn best_match<'a>(search: &str, options: &'a [String]) -> Option<&'a String> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return options.first();
    }
    let lowered: Vec<String> = options.iter().map(|o| o.trim().to_lowercase()).collect();

    let position = lowered
        .iter()
        .position(|o| *o == needle)
        .or_else(|| lowered.iter().position(|o| o.starts_with(&needle)))
        .or_else(|| lowered.iter().position(|o| o.contains(&needle)))
        .unwrap_or(0);
    options.get(position)
}

/// Integer text for a number input; anything non-numeric becomes `0`.
pub fn integer_string(value: &FieldValue) -> String {
    let n = match value {
        FieldValue::Number(n) => *n,
        FieldValue::Bool(b) => i64::from(*b),
        FieldValue::Text(s) => s
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
            .unwrap_or(0),
    };
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_classify_button() {
        assert_eq!(classify_button("Next"), Some(ButtonRole::Next));
        assert_eq!(classify_button("Review your application"), Some(ButtonRole::Next));
        assert_eq!(classify_button("Submit application"), Some(ButtonRole::Submit));
        assert_eq!(classify_button("Отправить"), Some(ButtonRole::Submit));
        assert_eq!(classify_button("Далее"), Some(ButtonRole::Next));
        assert_eq!(classify_button("Dismiss"), None);
    }

    #[test]
    fn test_classify_document() {
        assert_eq!(classify_document("Upload cover letter"), Some(DocumentKind::CoverLetter));
        assert_eq!(classify_document("Сопроводительное письмо"), Some(DocumentKind::CoverLetter));
        assert_eq!(classify_document("Upload resume"), Some(DocumentKind::Resume));
        assert_eq!(classify_document("CV (pdf)"), Some(DocumentKind::Resume));
        assert_eq!(classify_document("Portfolio"), None);
    }

    #[test]
    fn test_checkbox_question() {
        assert_eq!(
            checkbox_question(Some("Which do you know?"), "Rust"),
            "Which do you know?. Rust"
        );
        assert_eq!(checkbox_question(None, "I agree"), "I agree");
        assert_eq!(checkbox_question(Some("Terms"), " "), "Terms");
    }

    #[test]
    fn test_best_match_order() {
        let opts = options(&["Tel Aviv-Yafo, Israel", "Tel Aviv District", "Haifa"]);
        assert_eq!(best_match("haifa", &opts).map(String::as_str), Some("Haifa"));
        assert_eq!(
            best_match("Tel Aviv", &opts).map(String::as_str),
            Some("Tel Aviv-Yafo, Israel")
        );
        assert_eq!(best_match("District", &opts).map(String::as_str), Some("Tel Aviv District"));
        assert_eq!(best_match("Paris", &opts).map(String::as_str), Some("Tel Aviv-Yafo, Israel"));
        assert_eq!(best_match("x", &[]), None);
    }

    #[test]
    fn test_integer_string() {
        assert_eq!(integer_string(&FieldValue::Number(7)), "7");
        assert_eq!(integer_string(&FieldValue::from("4.8")), "4");
        assert_eq!(integer_string(&FieldValue::from("12,000")), "12000");
        assert_eq!(integer_string(&FieldValue::from("a few")), "0");
    }

    #[test]
    fn test_match_option_ignores_case_and_spacing() {
        let opts = options(&["Yes", "No"]);
        assert_eq!(match_option("  yes ", &opts).map(String::as_str), Some("Yes"));
        assert_eq!(match_option("Maybe", &opts), None);
    }
}
