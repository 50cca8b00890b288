//! Navigator settings, loaded as the `[navigator]` section of the app config

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Documents offered to upload slots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// Steps processed before giving up
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// `false` fills every step but stops short of the final submit
    #[serde(default = "default_should_submit")]
    pub should_submit: bool,

    /// Per-attempt timeout for one UI action
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,

    #[serde(default)]
    pub documents: DocumentPaths,
}

fn default_max_steps() -> u32 {
    8
}

fn default_should_submit() -> bool {
    true
}

fn default_action_timeout_ms() -> u64 {
    5_000
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            should_submit: default_should_submit(),
            action_timeout_ms: default_action_timeout_ms(),
            documents: DocumentPaths::default(),
        }
    }
}

impl NavigatorConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_steps == 0 {
            return Err("navigator.max_steps must be at least 1".to_string());
        }
        if self.action_timeout_ms == 0 {
            return Err("navigator.action_timeout_ms must be positive".to_string());
        }
        Ok(())
    }
}
