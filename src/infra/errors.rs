// src/infra/errors.rs — Error types for StepChef

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StepChefError {
    // Answering service errors
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // User errors
    #[error("No API key configured. Set OPENAI_API_KEY or [answering] api_key in config.toml.")]
    NoApiKey,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StepChefError {
    /// Transient failures. The turn controller never retries these, it only
    /// reports them, but an outer caller may.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            StepChefError::Provider {
                retriable: true,
                ..
            } | StepChefError::RateLimited { .. }
        )
    }
}
