//! Error types for ESP Core
//!
//! - Storage failures (document and record backends)
//! - Preview lifecycle rejections
//! - Rollback failures
//! - Upstream notification failures
//! - Configuration errors

use crate::ids::{EnhancementId, PreviewId, ValidationId};
use crate::preview::PreviewStatus;
use esp_document::{DocumentError, DocumentRef};
use esp_enhancer::EnhanceError;
use std::path::PathBuf;
use std::time::Duration;

/// Storage backend errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Key or document does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem failure
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation exceeded its time bound
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// Reference escapes the storage root or is otherwise unusable
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Read-back after a write did not match what was written
    #[error("write verification failed for {0}")]
    WriteMismatch(String),

    /// Stored bytes are not a readable document
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl StorageError {
    /// Create IO error
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create serialization error
    #[inline]
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io { .. })
    }
}

/// Preview lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("preview not found: {0}")]
    NotFound(PreviewId),

    /// Apply requires `approved`
    #[error("preview {id} is {status}, not approved")]
    NotApproved { id: PreviewId, status: PreviewStatus },

    #[error("preview {0} has expired")]
    Expired(PreviewId),

    /// Safety gate refused the candidate
    #[error("preview {id} is not safe to apply (overall {overall:.3}, {critical} critical violations)")]
    Unsafe {
        id: PreviewId,
        overall: f64,
        critical: usize,
    },

    #[error("explicit confirmation required to apply preview {0}")]
    ConfirmationRequired(PreviewId),

    #[error("invalid preview transition {from} -> {to}")]
    InvalidTransition { from: PreviewStatus, to: PreviewStatus },

    /// Stored document no longer matches the preview's original
    #[error("document {document} changed since preview {id} was created")]
    StaleDocument { id: PreviewId, document: DocumentRef },

    #[error("preview {0} is already being applied")]
    ApplyInProgress(PreviewId),

    #[error("timed out waiting for lock on {0}")]
    LockTimeout(DocumentRef),

    /// Blocking enhancement failure; no preview was created
    #[error(transparent)]
    Enhance(#[from] EnhanceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PreviewError {
    /// Typed lifecycle rejection (caller state, not infrastructure)
    #[inline]
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::NotApproved { .. }
                | Self::Expired(_)
                | Self::InvalidTransition { .. }
                | Self::ConfirmationRequired(_)
                | Self::StaleDocument { .. }
        )
    }

    /// Pre-enhancement failure that blocked preview creation
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Enhance(e) if e.is_blocking())
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            Self::LockTimeout(_) | Self::ApplyInProgress(_) => true,
            _ => false,
        }
    }
}

/// Rollback errors
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("enhancement not found: {0}")]
    NotFound(EnhancementId),

    /// Snapshot expired, consumed or never taken
    #[error("rollback unavailable for {id}: {reason}")]
    RollbackUnavailable { id: EnhancementId, reason: String },

    #[error("timed out waiting for lock on {0}")]
    LockTimeout(DocumentRef),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RollbackError {
    /// Create unavailable error
    #[inline]
    pub fn unavailable(id: EnhancementId, reason: impl Into<String>) -> Self {
        Self::RollbackUnavailable {
            id,
            reason: reason.into(),
        }
    }
}

/// Recommendation source notification errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("recommendation source unavailable: {0}")]
    Unavailable(String),

    /// Source refused the update, e.g. unknown validation run
    #[error("recommendation source rejected {validation_id}: {reason}")]
    Rejected { validation_id: ValidationId, reason: String },
}

impl SinkError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}
