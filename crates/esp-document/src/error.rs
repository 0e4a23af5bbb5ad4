//! Error types for the document layer

use crate::context::TargetLocator;
use std::ops::Range;

/// Errors when constructing or editing documents
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Bytes are not valid UTF-8 text
    #[error("unreadable document: {0}")]
    Unreadable(String),

    /// Edit span is outside the document or splits a UTF-8 sequence
    #[error("invalid span {start}..{end} for document of {len} bytes")]
    InvalidSpan { start: usize, end: usize, len: usize },
}

impl DocumentError {
    /// Create invalid span error
    #[must_use]
    pub fn invalid_span(span: &Range<usize>, len: usize) -> Self {
        Self::InvalidSpan {
            start: span.start,
            end: span.end,
            len,
        }
    }
}

/// Errors while resolving a target locator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContextError {
    /// No region matches the locator (it may have been removed by an earlier edit)
    #[error("target not found: {0}")]
    TargetNotFound(TargetLocator),
}

/// Errors when parsing content hashes
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Wrong digest length
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex decode failure
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
