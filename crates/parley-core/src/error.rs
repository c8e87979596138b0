//! Error types for Parley.
//!
//! Every failure is reported to the user as a short line; the recovery
//! suggestion (if any) is appended by [`format_error_with_suggestion`].

use thiserror::Error;

/// Result type alias using the Parley error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Parley.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend (network/provider) failure during generation
    #[error("Backend error: {0}")]
    Backend(String),

    /// Provider error with structured details
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Model has no registered tokenizer
    #[error("Unsupported model: '{0}' has no registered tokenizer")]
    UnsupportedModel(String),

    /// Tokenizer could not be constructed
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Session record could not be written or read
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Pop on an empty message store
    #[error("Message store is empty")]
    EmptyStore,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Config(_) => Some("Check your config file at ~/.config/parley/config.toml"),
            Error::Provider(e) => e.recovery_suggestion(),
            Error::Backend(_) => Some("Check your connection and API key, then try again"),
            Error::UnsupportedModel(_) => Some("Use '/model' to see available models"),
            Error::Persistence(_) | Error::Io(_) => {
                Some("Check that the session directory is writable")
            }
            Error::NotFound(_) => Some("Use '/load' to see saved sessions"),
            _ => None,
        }
    }

    /// Create a provider-not-configured error.
    pub fn provider_not_configured(provider: &str) -> Self {
        Error::Provider(ProviderError::NotConfigured {
            provider: provider.to_string(),
            env_var: match provider {
                "openai" => Some("OPENAI_API_KEY".to_string()),
                _ => None,
            },
        })
    }
}

/// Provider-specific errors with detailed context.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Provider not configured
    #[error("Provider '{provider}' is not configured")]
    NotConfigured {
        provider: String,
        env_var: Option<String>,
    },

    /// API request failed
    #[error("API request to {provider} failed: {status} - {message}")]
    ApiError {
        provider: String,
        status: u16,
        message: String,
    },

    /// Response did not contain any text
    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },

    /// Timeout
    #[error("Request to {provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// Network error
    #[error("Network error connecting to {provider}: {message}")]
    NetworkError { provider: String, message: String },
}

impl ProviderError {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ProviderError::NotConfigured {
                env_var: Some(_), ..
            } => Some("Set the API key environment variable"),
            ProviderError::NotConfigured { .. } => {
                Some("Configure the provider in ~/.config/parley/config.toml")
            }
            ProviderError::ApiError { status: 401, .. } => {
                Some("Check that your API key is valid and not expired")
            }
            ProviderError::ApiError { status: 429, .. } => {
                Some("You've hit rate limits. Wait a moment and try again")
            }
            ProviderError::ApiError {
                status: 500..=599, ..
            } => Some("The API service is having issues. Try again later"),
            ProviderError::Timeout { .. } => {
                Some("Try a simpler request or check your network connection")
            }
            ProviderError::NetworkError { .. } => Some("Check your internet connection"),
            _ => None,
        }
    }

    /// Create an API error from status code and message.
    pub fn api_error(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ProviderError::ApiError {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }
}

/// Format an error with its recovery suggestion.
pub fn format_error_with_suggestion(error: &Error) -> String {
    let mut output = error.to_string();
    if let Some(suggestion) = error.recovery_suggestion() {
        output.push_str(&format!("\n  Suggestion: {}", suggestion));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_configured() {
        let err = Error::provider_not_configured("openai");
        assert!(err.to_string().contains("openai"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_api_error() {
        let err = ProviderError::api_error("openai", 429, "Rate limited");
        assert!(err.to_string().contains("429"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_unsupported_model_names_model() {
        let err = Error::UnsupportedModel("mystery-9".to_string());
        let formatted = format_error_with_suggestion(&err);
        assert!(formatted.contains("mystery-9"));
        assert!(formatted.contains("Suggestion"));
    }

    #[test]
    fn test_empty_store_has_no_suggestion() {
        assert!(Error::EmptyStore.recovery_suggestion().is_none());
    }
}
