//! Enhancement results: applied edits and skip reasons

use esp_document::{Document, RecommendationCategory, RecommendationId};
use esp_safety::{EditValidationResult, Violation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a recommendation did not apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Target missing from the working document
    TargetNotFound,
    /// Generation exceeded its time bound
    GenerationTimeout,
    GenerationFailed { message: String },
    /// Candidate edit failed per-edit validation
    EditRejected { violations: Vec<Violation> },
    LowConfidence { confidence: f64, threshold: f64 },
    /// Category needs proposed text and none was given
    MissingProposedText,
    /// Category cannot act on this locator kind
    UnsupportedLocator,
    /// Same id appeared earlier in the set
    DuplicateRecommendation,
    /// Edit would leave the target unchanged
    NoChange,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetNotFound => f.write_str("target not found"),
            Self::GenerationTimeout => f.write_str("generation timed out"),
            Self::GenerationFailed { message } => write!(f, "generation failed: {message}"),
            Self::EditRejected { violations } => {
                f.write_str("edit rejected: ")?;
                for (i, v) in violations.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            Self::LowConfidence { confidence, threshold } => {
                write!(f, "confidence {confidence:.2} below {threshold:.2}")
            }
            Self::MissingProposedText => f.write_str("proposed text required"),
            Self::UnsupportedLocator => f.write_str("locator not supported for category"),
            Self::DuplicateRecommendation => f.write_str("duplicate recommendation id"),
            Self::NoChange => f.write_str("edit makes no change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecommendation {
    pub id: RecommendationId,
    pub reason: SkipReason,
}

/// An edit folded into the candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedEdit {
    pub id: RecommendationId,
    pub category: RecommendationCategory,
    /// Span text before the edit
    pub original_text: String,
    pub replacement_text: String,
    pub validation: EditValidationResult,
}

/// Result of one enhancement run
#[derive(Debug, Clone)]
pub struct EnhancementOutcome {
    pub candidate: Document,
    /// Input order
    pub applied: Vec<AppliedEdit>,
    /// Input order
    pub skipped: Vec<SkippedRecommendation>,
}

impl EnhancementOutcome {
    /// Ids of applied recommendations
    #[must_use]
    pub fn applied_ids(&self) -> Vec<RecommendationId> {
        self.applied.iter().map(|a| a.id.clone()).collect()
    }

    /// Skip reason for a recommendation, if it was skipped
    #[must_use]
    pub fn skip_reason(&self, id: &RecommendationId) -> Option<&SkipReason> {
        self.skipped.iter().find(|s| &s.id == id).map(|s| &s.reason)
    }
}
