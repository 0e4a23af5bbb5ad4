//! External text generation seam

use std::time::Duration;

/// Generation service failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Service-side timeout
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// Service rejected or failed the request
    #[error("generation failed: {0}")]
    Failed(String),

    /// No service is configured
    #[error("generation service unavailable")]
    Unavailable,
}

/// Produces proposed text for a content fragment
///
/// Calls are bounded by the enhancer's timeout; implementations need not
/// enforce their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate text for `context` following `instruction`
    async fn generate(&self, context: &str, instruction: &str) -> Result<String, GenerationError>;
}

/// Service used when none is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGeneration;

#[async_trait::async_trait]
impl GenerationService for UnavailableGeneration {
    async fn generate(&self, _context: &str, _instruction: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable)
    }
}
