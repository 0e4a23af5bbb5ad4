//! Preview model and lifecycle state machine
//!
//! ```text
//! pending -> approved -> applied
//!    |          |
//!    |          +-> expired
//!    +-> rejected
//!    +-> expired
//! ```
//!
//! `applied`, `rejected` and `expired` are terminal.

use crate::error::PreviewError;
use crate::ids::{PreviewId, ValidationId};
use chrono::{DateTime, Utc};
use esp_diff::{DiffStats, DocumentDiff};
use esp_document::{ContentHash, DocumentRef, RecommendationId};
use esp_enhancer::SkippedRecommendation;
use esp_safety::SafetyScore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preview lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
    Expired,
}

impl PreviewStatus {
    /// No transition leaves a terminal status
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Applied | Self::Expired)
    }

    /// Subject to the expiry deadline
    #[inline]
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl fmt::Display for PreviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Applied => "applied",
            Self::Expired => "expired",
        })
    }
}

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: PreviewStatus) -> Vec<PreviewStatus> {
    use PreviewStatus::*;
    match from {
        Pending => vec![Approved, Rejected, Expired],
        Approved => vec![Applied, Expired],
        Rejected | Applied | Expired => vec![],
    }
}

/// Validate a status transition
///
/// # Errors
/// Returns [`PreviewError::InvalidTransition`] when `to` is not reachable from `from`
pub fn validate_transition(from: PreviewStatus, to: PreviewStatus) -> Result<(), PreviewError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PreviewError::InvalidTransition { from, to })
    }
}

/// A proposed enhancement awaiting review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub id: PreviewId,
    pub validation_id: ValidationId,
    pub document_ref: DocumentRef,
    pub original_content: String,
    pub enhanced_content: String,
    pub original_hash: ContentHash,
    pub enhanced_hash: ContentHash,
    pub diff: DocumentDiff,
    pub stats: DiffStats,
    /// Input order
    pub applied_recommendations: Vec<RecommendationId>,
    pub skipped_recommendations: Vec<SkippedRecommendation>,
    pub safety_score: SafetyScore,
    /// Soft warnings from the post-enhancement check
    #[serde(default)]
    pub warnings: Vec<String>,
    pub status: PreviewStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
    /// When the preview reached a terminal status
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Preview {
    /// Expiry is inclusive: a preview is expired at exactly `expires_at`
    #[inline]
    #[must_use]
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    #[inline]
    #[must_use]
    pub fn is_safe_to_apply(&self) -> bool {
        self.safety_score.is_safe_to_apply()
    }

    /// Move to `to`, stamping the matching timestamp
    ///
    /// # Errors
    /// Returns [`PreviewError::InvalidTransition`] for a disallowed move
    pub(crate) fn transition(&mut self, to: PreviewStatus, now: DateTime<Utc>) -> Result<(), PreviewError> {
        validate_transition(self.status, to)?;
        self.status = to;
        match to {
            PreviewStatus::Approved => self.approved_at = Some(now),
            PreviewStatus::Rejected => self.rejected_at = Some(now),
            PreviewStatus::Applied => self.applied_at = Some(now),
            PreviewStatus::Pending | PreviewStatus::Expired => {}
        }
        if to.is_terminal() {
            self.closed_at = Some(now);
        }
        Ok(())
    }
}

/// Preview listing filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewFilter {
    pub validation_id: Option<ValidationId>,
    pub status: Option<PreviewStatus>,
    pub document_ref: Option<DocumentRef>,
}

impl PreviewFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_validation_id(mut self, id: impl Into<ValidationId>) -> Self {
        self.validation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: PreviewStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_document_ref(mut self, document_ref: impl Into<DocumentRef>) -> Self {
        self.document_ref = Some(document_ref.into());
        self
    }

    #[must_use]
    pub fn matches(&self, preview: &Preview) -> bool {
        self.validation_id.as_ref().map_or(true, |v| *v == preview.validation_id)
            && self.status.map_or(true, |s| s == preview.status)
            && self.document_ref.as_ref().map_or(true, |d| *d == preview.document_ref)
    }
}
