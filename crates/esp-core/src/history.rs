//! Enhancement audit trail and rollback snapshots

use crate::ids::{BackupId, EnhancementId, PreviewId, ValidationId};
use chrono::{DateTime, Utc};
use esp_document::{ContentHash, DocumentRef, RecommendationId};
use esp_safety::SafetyScore;
use serde::{Deserialize, Serialize};

/// Score fields kept on the permanent record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyScoreSummary {
    pub overall: f64,
    pub critical_violations: usize,
    pub total_violations: usize,
    pub is_safe: bool,
}

impl From<&SafetyScore> for SafetyScoreSummary {
    fn from(score: &SafetyScore) -> Self {
        Self {
            overall: score.overall,
            critical_violations: score.critical_count(),
            total_violations: score.violations.len(),
            is_safe: score.is_safe_to_apply(),
        }
    }
}

/// Append-only audit entry written at apply time
///
/// Only rollback mutates a record, and only its rollback fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementRecord {
    pub enhancement_id: EnhancementId,
    pub validation_id: ValidationId,
    pub document_ref: DocumentRef,
    pub preview_id: PreviewId,
    pub original_hash: ContentHash,
    pub enhanced_hash: ContentHash,
    pub recommendations_applied: Vec<RecommendationId>,
    pub safety_score_summary: SafetyScoreSummary,
    pub applied_by: String,
    pub applied_at: DateTime<Utc>,
    /// A rollback point still exists for this record
    pub rollback_available: bool,
    pub rolled_back: bool,
    #[serde(default)]
    pub rolled_back_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rolled_back_by: Option<String>,
}

impl EnhancementRecord {
    pub(crate) fn mark_rolled_back(&mut self, actor: &str, at: DateTime<Utc>) {
        self.rolled_back = true;
        self.rolled_back_at = Some(at);
        self.rolled_back_by = Some(actor.to_string());
        self.rollback_available = false;
    }
}

/// Pre-apply content snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackPoint {
    pub enhancement_id: EnhancementId,
    pub document_ref: DocumentRef,
    pub content_snapshot: String,
    pub created_at: DateTime<Utc>,
    pub retention_expires_at: DateTime<Utc>,
}

impl RollbackPoint {
    /// Retention is exclusive of its deadline
    #[inline]
    #[must_use]
    pub fn is_retained(&self, now: DateTime<Utc>) -> bool {
        now < self.retention_expires_at
    }
}

/// Content present at rollback time, saved before restoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackBackup {
    pub id: BackupId,
    pub enhancement_id: EnhancementId,
    pub document_ref: DocumentRef,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// History listing filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub document_ref: Option<DocumentRef>,
    pub validation_id: Option<ValidationId>,
    pub rolled_back: Option<bool>,
}

impl HistoryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document_ref(mut self, document_ref: impl Into<DocumentRef>) -> Self {
        self.document_ref = Some(document_ref.into());
        self
    }

    #[must_use]
    pub fn with_validation_id(mut self, id: impl Into<ValidationId>) -> Self {
        self.validation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_rolled_back(mut self, rolled_back: bool) -> Self {
        self.rolled_back = Some(rolled_back);
        self
    }

    #[must_use]
    pub fn matches(&self, record: &EnhancementRecord) -> bool {
        self.document_ref.as_ref().map_or(true, |d| *d == record.document_ref)
            && self.validation_id.as_ref().map_or(true, |v| *v == record.validation_id)
            && self.rolled_back.map_or(true, |r| r == record.rolled_back)
    }
}
