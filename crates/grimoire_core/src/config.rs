//! Runtime configuration loaded from environment variables.
//!
//! # Invariants
//! - Missing variables fall back to documented defaults.
//! - Present but malformed variables are rejected, never silently ignored.
//! - `max_write_attempts` is at least 1.

use crate::logging::default_log_level;
use crate::service::translation_service::DEFAULT_MAX_WRITE_ATTEMPTS;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "GRIMOIRE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "GRIMOIRE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "GRIMOIRE_LOG_DIR";
pub const ENV_MAX_WRITE_ATTEMPTS: &str = "GRIMOIRE_MAX_WRITE_ATTEMPTS";

const DEFAULT_DB_FILE_NAME: &str = "grimoire.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Core runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub max_write_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

impl CoreConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = non_blank(lookup(ENV_DB_PATH)) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }

        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            let path = PathBuf::from(&dir);
            if !path.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_LOG_DIR,
                    value: dir,
                    reason: "must be an absolute path",
                });
            }
            config.log_dir = Some(path);
        }

        if let Some(raw) = non_blank(lookup(ENV_MAX_WRITE_ATTEMPTS)) {
            config.max_write_attempts = match raw.parse::<u32>() {
                Ok(value) if value >= 1 => value,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_MAX_WRITE_ATTEMPTS,
                        value: raw,
                        reason: "must be an integer >= 1",
                    });
                }
            };
        }

        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}
