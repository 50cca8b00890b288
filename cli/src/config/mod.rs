//! Layered application configuration
//!
//! Precedence, lowest first:
//! 1. Built-in defaults
//! 2. Config file (`./formpilot.toml` or `<config_dir>/formpilot/config.toml`)
//! 3. Environment variables (`FORMPILOT_NAVIGATOR__MAX_STEPS=3`)

pub mod error;
pub mod loader;

pub use error::{ConfigError, Result};
pub use loader::{AppConfig, ConfigLoader, ProfileSource, RuleStoreSource};
