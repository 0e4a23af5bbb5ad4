//! Immutable document snapshots
//!
//! Edits never mutate a [`Document`]; [`Document::splice`] returns a new
//! snapshot with a freshly computed hash, so every step of an enhancement
//! run can be inspected on its own.

use crate::error::DocumentError;
use crate::hash::ContentHash;
use crate::structure::DocumentStructure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Storage location of a document (path or key, interpreted by storage)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(String);

impl DocumentRef {
    /// Create reference
    #[inline]
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Reference as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Content snapshot with derived hash
///
/// # Invariants
/// - `hash == ContentHash::of_str(content)`
/// - Immutable after construction; clones share the content buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    content: Arc<str>,
    hash: ContentHash,
}

impl Document {
    /// Create document from text
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        let content: Arc<str> = Arc::from(content.into());
        let hash = ContentHash::of_str(&content);
        Self { content, hash }
    }

    /// Create document from raw storage bytes
    ///
    /// # Errors
    /// Returns [`DocumentError::Unreadable`] if the bytes are not UTF-8
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DocumentError> {
        String::from_utf8(bytes)
            .map(Self::new)
            .map_err(|e| DocumentError::Unreadable(e.to_string()))
    }

    /// Text content
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Content hash
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether content is empty or whitespace only
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Length in characters
    #[inline]
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Analyze front matter and markdown structure
    #[must_use]
    pub fn structure(&self) -> DocumentStructure {
        DocumentStructure::analyze(&self.content)
    }

    /// Text of a byte span
    ///
    /// # Errors
    /// Returns error if the span is out of bounds or not on char boundaries
    pub fn slice(&self, span: &Range<usize>) -> Result<&str, DocumentError> {
        self.content
            .get(span.clone())
            .ok_or_else(|| DocumentError::invalid_span(span, self.len()))
    }

    /// New snapshot with `span` replaced by `replacement`
    ///
    /// # Errors
    /// Returns error if the span is out of bounds or not on char boundaries
    pub fn splice(&self, span: Range<usize>, replacement: &str) -> Result<Self, DocumentError> {
        self.slice(&span)?;
        let mut next = String::with_capacity(self.len() - span.len() + replacement.len());
        next.push_str(&self.content[..span.start]);
        next.push_str(replacement);
        next.push_str(&self.content[span.end..]);
        Ok(Self::new(next))
    }

    /// Recompute and compare the hash
    #[inline]
    #[must_use]
    pub fn verify(&self) -> bool {
        self.hash == ContentHash::of_str(&self.content)
    }

    /// Content as owned bytes for storage
    #[inline]
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.content.as_bytes().to_vec()
    }
}
