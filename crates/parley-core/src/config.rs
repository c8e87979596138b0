//! Configuration system for Parley.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::session::{DEFAULT_AFTER_PRUNE_THRESHOLD, DEFAULT_PRUNE_TRIGGER};

/// Main configuration struct for Parley.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Session budget and storage
    pub session: SessionConfig,
    /// Backend call policy
    pub backend: BackendConfig,
    /// Provider configurations
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default model to use
    pub model: String,
    /// Sampling temperature for conversational turns
    pub temperature: f32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Token count that forces compaction
    pub prune_trigger: usize,
    /// Token count to get back under after compaction
    pub after_prune_threshold: usize,
    /// Directory holding session records (defaults to `.parley/sessions`)
    pub storage_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prune_trigger: DEFAULT_PRUNE_TRIGGER,
            after_prune_threshold: DEFAULT_AFTER_PRUNE_THRESHOLD,
            storage_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Minimum spacing between consecutive backend calls (milliseconds)
    pub min_call_interval_ms: u64,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            min_call_interval_ms: 1000,
            timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenAI configuration
    pub openai: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (can be set directly or via environment)
    pub api_key: Option<String>,
    /// Environment variable name for API key
    pub api_key_env: Option<String>,
    /// Base URL (optional, for compatible endpoints)
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key from either direct value or environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        if let Some(ref env_var) = self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return Some(key);
            }
        }
        None
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Get only error-level issues.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Error).collect()
    }

    /// Get only warning-level issues.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Warning).collect()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue
    pub severity: IssueSeverity,
    /// Field path (e.g., "session.prune_trigger")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(None).extract()
    }

    /// Load configuration with an extra file layered above the project files.
    pub fn load_with_file(path: &Path) -> Result<Self, figment::Error> {
        Self::figment(Some(path)).extract()
    }

    fn figment(extra: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            // User config
            .merge(Toml::file(Self::config_dir().join("config.toml")))
            // Project config
            .merge(Toml::file(".parley/config.toml"))
            // Project local config (gitignored)
            .merge(Toml::file(".parley/config.local.toml"));

        if let Some(path) = extra {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("PARLEY_").split("__"))
    }

    /// Load and validate configuration.
    pub fn load_validated(extra: Option<&Path>) -> Result<Self, Error> {
        let config = match extra {
            Some(path) => Self::load_with_file(path),
            None => Self::load(),
        }
        .map_err(|e| Error::Config(e.to_string()))?;

        let result = config.validate();
        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Config(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.general.model.is_empty() {
            result.add_error("general.model", "Model name cannot be empty");
        }

        if !(0.0..=2.0).contains(&self.general.temperature) {
            result.add_error("general.temperature", "temperature must be between 0 and 2");
        }

        if self.session.prune_trigger == 0 {
            result.add_error("session.prune_trigger", "prune_trigger must be greater than 0");
        }

        if self.session.after_prune_threshold == 0 {
            result.add_error(
                "session.after_prune_threshold",
                "after_prune_threshold must be greater than 0",
            );
        }

        if self.session.after_prune_threshold >= self.session.prune_trigger {
            result.add_warning(
                "session.after_prune_threshold",
                "after_prune_threshold is not below prune_trigger; compaction will reclaim little",
            );
        }

        if self.backend.timeout_secs == 0 {
            result.add_error("backend.timeout_secs", "timeout_secs must be greater than 0");
        }

        if let Some(ref openai) = self.providers.openai {
            if openai.api_key.as_ref().map(|k| k.is_empty()).unwrap_or(false) {
                result.add_warning("providers.openai.api_key", "API key is empty string");
            }
            if let Some(ref base_url) = openai.base_url {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    result.add_error(
                        "providers.openai.base_url",
                        "base_url must start with http:// or https://",
                    );
                }
            }
        }

        result
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Directory holding session records.
    pub fn session_dir(&self) -> PathBuf {
        self.session
            .storage_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".parley").join("sessions"))
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("parley"))
            .unwrap_or_else(|| PathBuf::from("~/.config/parley"))
    }

    /// Get the data directory (for REPL history).
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|p| p.join("parley"))
            .unwrap_or_else(|| PathBuf::from("~/.local/share/parley"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_ok(), "Default config should be valid: {:?}", result.issues);
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn test_zero_prune_trigger_is_error() {
        let mut config = Config::default();
        config.session.prune_trigger = 0;
        let result = config.validate();
        assert!(!result.is_ok());
        assert!(result.errors().iter().any(|e| e.field == "session.prune_trigger"));
    }

    #[test]
    fn test_threshold_above_trigger_is_warning() {
        let mut config = Config::default();
        config.session.after_prune_threshold = 5000;
        let result = config.validate();
        assert!(result.is_ok());
        assert!(result
            .warnings()
            .iter()
            .any(|e| e.field == "session.after_prune_threshold"));
    }

    #[test]
    fn test_invalid_temperature() {
        let mut config = Config::default();
        config.general.temperature = 3.5;
        assert!(!config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.providers.openai = Some(ProviderConfig {
            base_url: Some("api.example.com".to_string()),
            ..Default::default()
        });
        let result = config.validate();
        assert!(result
            .errors()
            .iter()
            .any(|e| e.field == "providers.openai.base_url"));
    }

    #[test]
    fn test_session_dir_default_and_override() {
        let mut config = Config::default();
        assert_eq!(config.session_dir(), PathBuf::from(".parley/sessions"));
        config.session.storage_dir = Some(PathBuf::from("/tmp/parley"));
        assert_eq!(config.session_dir(), PathBuf::from("/tmp/parley"));
    }

    #[test]
    fn test_to_toml_contains_sections() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[general]"));
        assert!(rendered.contains("prune_trigger = 3500"));
    }
}
