//! Blocking pre-enhancement failures

use esp_document::RecommendationId;

/// Reasons the whole enhancement run is refused before any edit
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreCheckError {
    /// Two recommendations target overlapping spans with different intents
    #[error("recommendations {first} and {second} conflict: {detail}")]
    ConflictingRecommendations {
        first: RecommendationId,
        second: RecommendationId,
        detail: String,
    },

    /// Empty, oversized or otherwise unreadable document
    #[error("unreadable document: {0}")]
    UnreadableDocument(String),

    /// Broken front matter or markdown
    #[error("malformed structure: {0}")]
    MalformedStructure(String),
}

impl PreCheckError {
    /// Create conflict error
    #[must_use]
    pub fn conflict(first: &RecommendationId, second: &RecommendationId, detail: impl Into<String>) -> Self {
        Self::ConflictingRecommendations {
            first: first.clone(),
            second: second.clone(),
            detail: detail.into(),
        }
    }

    /// Create malformed structure error
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedStructure(message.into())
    }

    /// Whether the caller could fix the input and retry
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConflictingRecommendations { .. })
    }
}
