//! Notification of applied recommendations to their producer

use crate::error::SinkError;
use crate::ids::ValidationId;
use async_trait::async_trait;
use esp_document::RecommendationId;

/// Receives the ids a successful apply consumed
#[async_trait]
pub trait RecommendationSink: Send + Sync {
    /// Best effort; failures are logged, never surfaced to the apply caller
    async fn mark_applied(&self, validation_id: &ValidationId, ids: &[RecommendationId]) -> Result<(), SinkError>;
}

/// Sink that drops notifications
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl RecommendationSink for NoopSink {
    async fn mark_applied(&self, _validation_id: &ValidationId, _ids: &[RecommendationId]) -> Result<(), SinkError> {
        Ok(())
    }
}
