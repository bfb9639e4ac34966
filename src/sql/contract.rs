use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::llm::{LanguageModel, LlmError};
use crate::sql::GenerationError;
use crate::sql::dialect::{DialectRegistry, DialectRule};
use crate::sql::extract::extract_sql;
use crate::sql::models::{QueryInput, SqlOutput, Violation};
use crate::sql::prompt::build_prompt;

/// Everything the contract depends on besides the model itself.
#[derive(Debug, Clone)]
pub struct ContractConfig {
    pub registry: Arc<DialectRegistry>,
    /// Extra model calls allowed after a response fails validation.
    pub max_retries: u32,
    /// Upper bound on a single model call.
    pub attempt_timeout: Option<Duration>,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            registry: Arc::new(DialectRegistry::standard().clone()),
            max_retries: 1,
            attempt_timeout: None,
        }
    }
}

impl ContractConfig {
    pub fn from_llm_config(config: &LlmConfig) -> Self {
        Self {
            registry: Arc::new(DialectRegistry::standard().clone()),
            max_retries: config.max_retries,
            attempt_timeout: Some(Duration::from_secs(config.timeout_secs)),
        }
    }
}

/// Turns a [`QueryInput`] into validated SQL.
///
/// Runs three stages: [`validate_input`](Self::validate_input),
/// [`invoke`](Self::invoke) and [`validate_output`](Self::validate_output).
/// When the output stage rejects a response the model is asked again with
/// the same prompt, at most `max_retries` times.
pub struct SqlContract {
    model: Arc<dyn LanguageModel>,
    config: ContractConfig,
}

impl SqlContract {
    pub fn new(model: Arc<dyn LanguageModel>, config: ContractConfig) -> Self {
        Self { model, config }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Pre-conditions. Nothing leaves the process if this fails.
    pub fn validate_input(&self, input: &QueryInput) -> Result<&DialectRule, GenerationError> {
        if input.query().trim().is_empty() {
            return Err(GenerationError::InvalidInput(
                "natural language query must not be empty".to_string(),
            ));
        }

        Ok(self.config.registry.rule(input.dialect()))
    }

    /// One model call, bounded by the configured timeout.
    pub async fn invoke(&self, prompt: &str) -> Result<String, GenerationError> {
        let call = self.model.complete(prompt);

        let raw = match self.config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| LlmError::Timeout(limit))??,
            None => call.await?,
        };

        debug!("Raw model response: {}", raw);
        Ok(raw)
    }

    /// Post-conditions on a raw response.
    pub fn validate_output(
        &self,
        raw: &str,
        input: &QueryInput,
        rule: &DialectRule,
    ) -> Result<SqlOutput, Violation> {
        let candidate = extract_sql(raw, rule);

        if candidate.is_empty() {
            return Err(Violation::Empty);
        }

        if echoes_request(&candidate, input.query()) {
            return Err(Violation::EchoedRequest);
        }

        if !rule.starts_with_verb(&candidate) {
            return Err(Violation::NotSql);
        }

        Ok(SqlOutput::new(candidate))
    }

    pub async fn generate(&self, input: &QueryInput) -> Result<SqlOutput, GenerationError> {
        let rule = self.validate_input(input)?;

        if input.table_schema().trim().is_empty() {
            warn!("No table schema supplied; generated SQL will use guessed names");
        }

        let prompt = build_prompt(input.query(), input.table_schema(), rule);
        let max_attempts = self.config.max_retries + 1;
        let mut attempts = 0;

        info!(
            "Generating {} SQL with model {} for: {}",
            rule.name,
            self.model_name(),
            input.query()
        );

        loop {
            attempts += 1;
            let raw = self.invoke(&prompt).await?;

            match self.validate_output(&raw, input, rule) {
                Ok(output) => {
                    info!("Generated SQL on attempt {}: {}", attempts, output.sql());
                    return Ok(output);
                }
                Err(violation) => {
                    warn!("Attempt {}/{} rejected: {}", attempts, max_attempts, violation);
                    if attempts >= max_attempts {
                        return Err(GenerationError::GenerationFailure {
                            violation,
                            last_response: raw,
                            attempts,
                        });
                    }
                }
            }
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// Single-word requests are skipped: "users" legitimately appears in "SELECT * FROM users".
fn echoes_request(candidate: &str, request: &str) -> bool {
    let request = normalize(request);
    if request.split(' ').count() < 2 {
        return false;
    }

    normalize(candidate).contains(&request)
}
