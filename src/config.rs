//! Application configuration.
//!
//! Built once at process start from the environment and passed into
//! every component that needs it. Business logic never reads the
//! environment directly — a missing value is either a fail-fast
//! configuration error (checked here, before any network activity) or a
//! disabled optional source.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default model for the briefing flow.
const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

/// Everything the application needs, resolved up front.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Narrative backend selection.
    pub llm_backend: LlmBackend,
    /// API key for the selected backend, when present.
    pub llm_api_key: Option<SecretString>,
    /// Model identifier.
    pub llm_model: String,
    /// Google OAuth token file (authorized-user format).
    pub google_token_path: PathBuf,
    /// Todoist API token, when present. Absent disables the task source.
    pub todoist_api_key: Option<SecretString>,
    /// Forwarding address for the todo workflow (the Todoist inbox email).
    pub todo_forward_address: Option<String>,
    /// Per-HTTP-request timeout.
    pub http_timeout: Duration,
    /// Per-pipeline-stage wall-clock budget.
    pub stage_timeout: Duration,
}

impl AppConfig {
    /// Read configuration from the environment. The only place in the
    /// crate that touches `std::env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_backend = match std::env::var("DAILY_BRIEFER_LLM_BACKEND").ok().as_deref() {
            None | Some("gemini") => LlmBackend::Gemini,
            Some("anthropic") => LlmBackend::Anthropic,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "DAILY_BRIEFER_LLM_BACKEND".into(),
                    message: format!("unknown backend '{other}' (expected gemini or anthropic)"),
                });
            }
        };

        let key_var = match llm_backend {
            LlmBackend::Gemini => "GOOGLE_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        };
        let llm_api_key = std::env::var(key_var).ok().map(SecretString::from);

        let llm_model =
            std::env::var("DAILY_BRIEFER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let google_token_path = std::env::var("DAILY_BRIEFER_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("tokens/gmail_api_token.json"));

        let todoist_api_key = std::env::var("TODOIST_API_KEY").ok().map(SecretString::from);
        let todo_forward_address = std::env::var("TODOIST_INBOX_EMAIL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            llm_backend,
            llm_api_key,
            llm_model,
            google_token_path,
            todoist_api_key,
            todo_forward_address,
            http_timeout: Duration::from_secs(30),
            stage_timeout: Duration::from_secs(120),
        })
    }

    /// LLM configuration, or a fail-fast error when the key is missing.
    /// Only the briefing flow needs this; labeling is rule-based.
    pub fn llm_config(&self) -> Result<LlmConfig, ConfigError> {
        let key_var = match self.llm_backend {
            LlmBackend::Gemini => "GOOGLE_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        };
        let api_key = self
            .llm_api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired {
                key: key_var.into(),
                hint: "The briefing flow needs an LLM API key.".into(),
            })?;
        Ok(LlmConfig {
            backend: self.llm_backend,
            api_key,
            model: self.llm_model.clone(),
        })
    }

    /// Forward address for the todo workflow, or a fail-fast error.
    pub fn forward_address(&self) -> Result<&str, ConfigError> {
        self.todo_forward_address
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "TODOIST_INBOX_EMAIL".into(),
                hint: "Set it to your Todoist inbox forwarding address.".into(),
            })
    }

    /// A token store path check that runs before any network activity.
    pub fn check_token_file(&self) -> Result<(), ConfigError> {
        if !self.google_token_path.exists() {
            return Err(ConfigError::CredentialsNotFound {
                path: self.google_token_path.display().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            llm_backend: LlmBackend::Gemini,
            llm_api_key: None,
            llm_model: DEFAULT_MODEL.to_string(),
            google_token_path: PathBuf::from("/nonexistent/token.json"),
            todoist_api_key: None,
            todo_forward_address: None,
            http_timeout: Duration::from_secs(30),
            stage_timeout: Duration::from_secs(120),
        }
    }

    #[test]
    fn llm_config_requires_key() {
        let config = test_config();
        let err = config.llm_config().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { key, .. } if key == "GOOGLE_API_KEY"));
    }

    #[test]
    fn llm_config_with_key() {
        let mut config = test_config();
        config.llm_api_key = Some(SecretString::from("test"));
        let llm = config.llm_config().unwrap();
        assert_eq!(llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn forward_address_requires_value() {
        let config = test_config();
        assert!(matches!(
            config.forward_address().unwrap_err(),
            ConfigError::MissingRequired { key, .. } if key == "TODOIST_INBOX_EMAIL"
        ));

        let mut with_addr = test_config();
        with_addr.todo_forward_address = Some("inbox@todoist.net".into());
        assert_eq!(with_addr.forward_address().unwrap(), "inbox@todoist.net");
    }

    #[test]
    fn missing_token_file_is_config_error() {
        let config = test_config();
        assert!(matches!(
            config.check_token_file().unwrap_err(),
            ConfigError::CredentialsNotFound { .. }
        ));
    }
}
