use std::path::PathBuf;
use thiserror::Error;

/// Why `formpilot.toml` plus its overrides did not yield a usable config
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `--config` named a file that is not there
    #[error("config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// A file or `FORMPILOT_*` layer failed to parse or deserialize
    #[error("config layer rejected: {0}")]
    Layer(#[from] config::ConfigError),

    #[error("built-in defaults could not be serialized: {0}")]
    Defaults(#[from] serde_json::Error),

    /// A value parsed but is out of range for its section
    #[error("invalid [{section}] setting: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(section: &'static str, message: impl ToString) -> Self {
        Self::Invalid {
            section,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
