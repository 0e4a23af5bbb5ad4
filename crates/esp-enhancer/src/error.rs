//! Error types for the enhancer

use esp_safety::PreCheckError;

/// Whole-run failures
///
/// Per-recommendation problems are never errors; they are reported as
/// [`crate::SkipReason`] values in the outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnhanceError {
    /// Document or recommendation set failed the pre-enhancement check
    #[error(transparent)]
    PreCheck(#[from] PreCheckError),
}

impl EnhanceError {
    /// Whether nothing was attempted
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::PreCheck(_))
    }

    /// Underlying pre-check failure
    #[must_use]
    pub fn as_pre_check(&self) -> Option<&PreCheckError> {
        match self {
            Self::PreCheck(e) => Some(e),
        }
    }
}
