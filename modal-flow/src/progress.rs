//! Dialog progress indicator
//!
//! Multi-step dialogs render a completion percentage ("44%"). An unchanged
//! percentage after a navigation click means the step re-rendered in place,
//! usually because validation failed.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DialogProgress {
    /// 1-based position of the step in the navigator loop
    pub step_index: u32,
    /// Completion in 0..=100, when the dialog shows one
    pub percent: Option<u8>,
}

impl DialogProgress {
    /// First percentage in `text`; values above 100 are ignored.
    pub fn parse(step_index: u32, text: &str) -> Self {
        let percent = percent_regex()
            .and_then(|re| re.captures(text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u16>().ok())
            .filter(|p| *p <= 100)
            .and_then(|p| u8::try_from(p).ok());
        Self {
            step_index,
            percent,
        }
    }

    /// Both percentages exist and agree; step indices are not compared.
    pub fn same_as(&self, previous: &DialogProgress) -> bool {
        match (self.percent, previous.percent) {
            (Some(now), Some(before)) => now == before,
            _ => false,
        }
    }
}

fn percent_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,3})%").ok()).as_ref()
}
