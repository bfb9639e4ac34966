//! Dialect-aware SQL generation: registry, prompt builder, output extraction
//! and the validate -> invoke -> validate contract around the model call.

pub mod contract;
pub mod dialect;
pub mod extract;
pub mod models;
pub mod prompt;

use thiserror::Error;

use crate::llm::LlmError;
pub use contract::{ContractConfig, SqlContract};
pub use dialect::Dialect;
pub use models::{QueryInput, Violation};

/// Failure modes of SQL generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Rejected before any model call; fixable by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The model kept producing unusable output until the retry bound ran out.
    #[error("generation failed after {attempts} attempt(s): {violation}")]
    GenerationFailure {
        violation: Violation,
        last_response: String,
        attempts: u32,
    },

    /// The model call itself failed.
    #[error(transparent)]
    Upstream(#[from] LlmError),
}

impl GenerationError {
    /// Stable, machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::InvalidInput(_) => "invalid_input",
            GenerationError::GenerationFailure { .. } => "generation_failure",
            GenerationError::Upstream(_) => "upstream_service_error",
        }
    }
}
