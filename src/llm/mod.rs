pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// A text-completion backend. The only place generation touches the network.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends `prompt` to the model and returns its raw text response.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

/// Instantiates the backend named by `config.backend`.
///
/// Fails when the backend is unknown or a required credential is missing, so
/// callers can treat this as a startup check.
pub fn build_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, LlmError> {
    let model: Arc<dyn LanguageModel> = match config.backend.as_str() {
        "remote" => Arc::new(providers::remote::RemoteLlmProvider::new(config)?),
        "ollama" => Arc::new(providers::ollama::OllamaProvider::new(config)?),
        _ => {
            return Err(LlmError::ConfigError(format!(
                "Unsupported LLM backend: {}",
                config.backend
            )))
        }
    };

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn remote_backend_requires_api_key() {
        let mut config = AppConfig::default().llm;
        config.backend = "remote".to_string();
        config.api_key = None;

        let err = build_model(&config).err().expect("missing key must fail");
        assert!(matches!(err, LlmError::ConfigError(_)));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = AppConfig::default().llm;
        config.backend = "carrier-pigeon".to_string();

        let err = build_model(&config).err().expect("unknown backend must fail");
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn ollama_backend_needs_no_credential() {
        let mut config = AppConfig::default().llm;
        config.backend = "ollama".to_string();
        config.api_key = None;
        config.model = "sqlcoder".to_string();

        let model = build_model(&config).expect("ollama should build");
        assert_eq!(model.model_name(), "sqlcoder");
    }
}
