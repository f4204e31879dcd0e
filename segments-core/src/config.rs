//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};

/// When a draft page receives its own experience branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftPolicy {
    /// Only while an experiment drives the new experience
    ExperimentOnly,
    /// Whenever the page has a draft
    Always,
}

impl DraftPolicy {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "experiment_only" | "experiment-only" => Some(DraftPolicy::ExperimentOnly),
            "always" => Some(DraftPolicy::Always),
            _ => None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "segments_propagation=info,segments_storage=info,warn".to_string(),
            json: false,
        }
    }
}

/// Settings for experience content propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Prefix of experience-keyed entries in editable values documents
    pub experience_key_prefix: String,
    /// Key holding the fallback value of an editable field
    pub default_value_key: String,
    pub draft_policy: DraftPolicy,
    /// Locale keying the name of newly created experiences
    pub default_locale: String,
    /// Message returned at the action boundary for any failure
    pub unexpected_error_message: String,
    pub log: LogConfig,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            experience_key_prefix: "experience-".to_string(),
            default_value_key: "defaultValue".to_string(),
            draft_policy: DraftPolicy::ExperimentOnly,
            default_locale: "en_US".to_string(),
            unexpected_error_message: "an-unexpected-error-occurred".to_string(),
            log: LogConfig::default(),
        }
    }
}

impl PropagationConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SEGMENTS_EXPERIENCE_KEY_PREFIX` (default: `experience-`)
    /// - `SEGMENTS_DEFAULT_VALUE_KEY` (default: `defaultValue`)
    /// - `SEGMENTS_DRAFT_POLICY`: `experiment_only` or `always`
    /// - `SEGMENTS_DEFAULT_LOCALE` (default: `en_US`)
    /// - `SEGMENTS_UNEXPECTED_ERROR_MESSAGE`
    /// - `SEGMENTS_LOG_FILTER`, `SEGMENTS_LOG_JSON`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            experience_key_prefix: std::env::var("SEGMENTS_EXPERIENCE_KEY_PREFIX")
                .unwrap_or(defaults.experience_key_prefix),
            default_value_key: std::env::var("SEGMENTS_DEFAULT_VALUE_KEY")
                .unwrap_or(defaults.default_value_key),
            draft_policy: std::env::var("SEGMENTS_DRAFT_POLICY")
                .ok()
                .and_then(|s| DraftPolicy::from_db_str(&s))
                .unwrap_or(defaults.draft_policy),
            default_locale: std::env::var("SEGMENTS_DEFAULT_LOCALE")
                .unwrap_or(defaults.default_locale),
            unexpected_error_message: std::env::var("SEGMENTS_UNEXPECTED_ERROR_MESSAGE")
                .unwrap_or(defaults.unexpected_error_message),
            log: LogConfig {
                filter: std::env::var("SEGMENTS_LOG_FILTER").unwrap_or(defaults.log.filter),
                json: std::env::var("SEGMENTS_LOG_JSON")
                    .map(|s| s == "true" || s == "1")
                    .unwrap_or(defaults.log.json),
            },
        }
    }

    /// Parse a TOML document; missing fields take their defaults.
    pub fn from_toml_str(raw: &str) -> SegmentsResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| {
            SegmentsError::Config(ConfigError::InvalidValue {
                field: "toml".to_string(),
                value: String::new(),
                reason: e.to_string(),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(SegmentsError::Config) if invalid.
    pub fn validate(&self) -> SegmentsResult<()> {
        if self.experience_key_prefix.is_empty() {
            return Err(SegmentsError::Config(ConfigError::InvalidValue {
                field: "experience_key_prefix".to_string(),
                value: self.experience_key_prefix.clone(),
                reason: "experience_key_prefix must not be empty".to_string(),
            }));
        }

        if self.default_value_key.is_empty() {
            return Err(SegmentsError::Config(ConfigError::InvalidValue {
                field: "default_value_key".to_string(),
                value: self.default_value_key.clone(),
                reason: "default_value_key must not be empty".to_string(),
            }));
        }

        // The fallback key would otherwise be read as an experience entry
        if self.default_value_key.starts_with(&self.experience_key_prefix) {
            return Err(SegmentsError::Config(ConfigError::InvalidValue {
                field: "default_value_key".to_string(),
                value: self.default_value_key.clone(),
                reason: "default_value_key must not start with experience_key_prefix".to_string(),
            }));
        }

        if self.default_locale.trim().is_empty() {
            return Err(SegmentsError::Config(ConfigError::MissingRequired {
                field: "default_locale".to_string(),
            }));
        }

        Ok(())
    }

    /// Key under which an experience's value is stored.
    pub fn experience_key(&self, experience: ExperienceId) -> String {
        format!("{}{}", self.experience_key_prefix, experience)
    }

    /// True for `<prefix><experienceId>`; a non-numeric suffix is a field name.
    pub fn is_experience_key(&self, key: &str) -> bool {
        key.strip_prefix(self.experience_key_prefix.as_str())
            .is_some_and(|suffix| !suffix.is_empty() && suffix.parse::<i64>().is_ok())
    }
}

// =============================================================================
// TESTS
// =============================================================================
