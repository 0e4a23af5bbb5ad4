//! Approved recommendations consumed by the enhancement pipeline
//!
//! Recommendations are produced upstream and are never mutated here.

use crate::context::TargetLocator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream recommendation identifier (opaque)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendationId(String);

impl RecommendationId {
    /// Create identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecommendationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecommendationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kind of edit a recommendation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    /// Add a reference or mention that is missing from the target
    InsertMissingReference,
    /// Replace a factually wrong statement
    ReplaceIncorrectClaim,
    /// Repair headings, lists or other structure; proposed text required
    StructuralFix,
    /// Expand thin content via the generation service
    ExpandContent,
    /// Set a front matter field value
    UpdateFrontMatter,
}

impl RecommendationCategory {
    /// Stable name used in logs and instructions
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InsertMissingReference => "insert_missing_reference",
            Self::ReplaceIncorrectClaim => "replace_incorrect_claim",
            Self::StructuralFix => "structural_fix",
            Self::ExpandContent => "expand_content",
            Self::UpdateFrontMatter => "update_front_matter",
        }
    }
}

impl fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-classified, approved edit instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub category: RecommendationCategory,
    /// Where the edit applies; resolved against the document at apply time
    pub target: TargetLocator,
    /// Replacement or insertion text; `None` asks for synthesis
    pub proposed_text: Option<String>,
    /// Upstream confidence (0.0 - 1.0)
    pub confidence: f64,
    pub rationale: String,
}

impl Recommendation {
    /// Create recommendation with full confidence and no proposed text
    #[must_use]
    pub fn new(
        id: impl Into<RecommendationId>,
        category: RecommendationCategory,
        target: TargetLocator,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            target,
            proposed_text: None,
            confidence: 1.0,
            rationale: String::new(),
        }
    }

    /// With proposed text
    #[must_use]
    pub fn with_proposed_text(mut self, text: impl Into<String>) -> Self {
        self.proposed_text = Some(text.into());
        self
    }

    /// With confidence (clamped to 0.0 - 1.0)
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// With rationale
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}
