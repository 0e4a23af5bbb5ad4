//! Context extraction for recommendation targets
//!
//! A [`TargetLocator`] describes *what* a recommendation is about, not a
//! byte offset: the document may have shifted between recommendation
//! creation and enhancement. [`ContextExtractor`] resolves a locator to the
//! minimal contiguous span at the moment it is needed.

use crate::document::Document;
use crate::error::ContextError;
use crate::structure::{DocumentStructure, FrontMatter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Textual description of an edit target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetLocator {
    /// Heading line through the end of its section
    Section { heading: String },
    /// First paragraph containing the snippet (case-insensitive)
    Paragraph { containing: String },
    /// Exact phrase, n-th occurrence (0 based)
    Phrase {
        text: String,
        #[serde(default)]
        occurrence: usize,
    },
    /// A top-level front matter field line
    FrontMatterField { key: String },
}

impl TargetLocator {
    /// Section locator
    #[must_use]
    pub fn section(heading: impl Into<String>) -> Self {
        Self::Section {
            heading: heading.into(),
        }
    }

    /// Paragraph locator
    #[must_use]
    pub fn paragraph(containing: impl Into<String>) -> Self {
        Self::Paragraph {
            containing: containing.into(),
        }
    }

    /// First-occurrence phrase locator
    #[must_use]
    pub fn phrase(text: impl Into<String>) -> Self {
        Self::Phrase {
            text: text.into(),
            occurrence: 0,
        }
    }

    /// Front matter field locator
    #[must_use]
    pub fn front_matter_field(key: impl Into<String>) -> Self {
        Self::FrontMatterField { key: key.into() }
    }

    /// Kind of region this locator resolves to
    #[must_use]
    pub fn kind(&self) -> ContextKind {
        match self {
            Self::Section { .. } => ContextKind::Section,
            Self::Paragraph { .. } => ContextKind::Paragraph,
            Self::Phrase { .. } => ContextKind::Phrase,
            Self::FrontMatterField { .. } => ContextKind::FrontMatterField,
        }
    }
}

impl fmt::Display for TargetLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Section { heading } => write!(f, "section '{heading}'"),
            Self::Paragraph { containing } => write!(f, "paragraph containing '{containing}'"),
            Self::Phrase { text, occurrence } => write!(f, "phrase '{text}' #{occurrence}"),
            Self::FrontMatterField { key } => write!(f, "front matter field '{key}'"),
        }
    }
}

/// Kind of extracted region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    Section,
    Paragraph,
    Phrase,
    FrontMatterField,
}

impl ContextKind {
    /// Whether the region is a block (section or paragraph)
    #[must_use]
    pub const fn is_block(self) -> bool {
        matches!(self, Self::Section | Self::Paragraph)
    }
}

/// A resolved target region with anchoring text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContext {
    pub kind: ContextKind,
    /// Byte span in the document it was extracted from
    pub span: Range<usize>,
    /// Text of the span
    pub text: String,
    /// Text immediately before the span (bounded)
    pub before: String,
    /// Text immediately after the span (bounded)
    pub after: String,
}

impl ExtractedContext {
    /// Whether two spans intersect
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.span.start < other.span.end && other.span.start < self.span.end
    }
}

/// Resolves locators to minimal spans
#[derive(Debug, Clone, Copy)]
pub struct ContextExtractor {
    anchor_chars: usize,
}

impl Default for ContextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextExtractor {
    /// Extractor keeping 80 chars of anchor text on each side
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { anchor_chars: 80 }
    }

    /// Extractor with custom anchor length
    #[inline]
    #[must_use]
    pub fn with_anchor_chars(anchor_chars: usize) -> Self {
        Self { anchor_chars }
    }

    /// Resolve a locator against the current document
    ///
    /// # Errors
    /// Returns [`ContextError::TargetNotFound`] if no region matches
    pub fn extract(
        &self,
        document: &Document,
        locator: &TargetLocator,
    ) -> Result<ExtractedContext, ContextError> {
        let content = document.content();
        let structure = document.structure();

        let span = match locator {
            TargetLocator::Section { heading } => section_span(content, &structure, heading),
            TargetLocator::Paragraph { containing } => {
                let needle = containing.to_lowercase();
                structure
                    .paragraphs
                    .iter()
                    .find(|p| !needle.is_empty() && p.text.to_lowercase().contains(&needle))
                    .map(|p| trim_end_span(content, p.span.clone()))
            }
            TargetLocator::Phrase { text, occurrence } if !text.is_empty() => content
                .match_indices(text.as_str())
                .nth(*occurrence)
                .map(|(i, m)| i..i + m.len()),
            TargetLocator::Phrase { .. } => None,
            TargetLocator::FrontMatterField { key } => structure
                .front_matter
                .as_present()
                .and_then(|fm| field_span(content, fm, key)),
        };

        span.filter(|s| !s.is_empty())
            .map(|s| self.context_at(content, locator.kind(), s))
            .ok_or_else(|| ContextError::TargetNotFound(locator.clone()))
    }

    /// Find a previously extracted region again after the document changed
    ///
    /// Matches on the exact span text; when it occurs more than once the
    /// candidate preceded by the recorded anchor text wins.
    #[must_use]
    pub fn relocate(
        &self,
        document: &Document,
        previous: &ExtractedContext,
    ) -> Option<ExtractedContext> {
        if previous.text.is_empty() {
            return None;
        }
        let content = document.content();
        let starts: Vec<usize> = content
            .match_indices(previous.text.as_str())
            .map(|(i, _)| i)
            .collect();
        let start = match starts.as_slice() {
            [] => return None,
            [only] => *only,
            many => *many
                .iter()
                .find(|&&i| content[..i].ends_with(previous.before.as_str()))?,
        };
        Some(self.context_at(content, previous.kind, start..start + previous.text.len()))
    }

    fn context_at(&self, content: &str, kind: ContextKind, span: Range<usize>) -> ExtractedContext {
        ExtractedContext {
            kind,
            text: content[span.clone()].to_string(),
            before: tail(&content[..span.start], self.anchor_chars).to_string(),
            after: head(&content[span.end..], self.anchor_chars).to_string(),
            span,
        }
    }
}

fn section_span(content: &str, structure: &DocumentStructure, heading: &str) -> Option<Range<usize>> {
    let wanted = heading.trim().to_lowercase();
    let idx = structure
        .headings
        .iter()
        .position(|h| h.text.to_lowercase() == wanted)?;
    let level = structure.headings[idx].level;
    let start = structure.headings[idx].span.start;
    let end = structure.headings[idx + 1..]
        .iter()
        .find(|h| h.level <= level)
        .map_or(content.len(), |h| h.span.start);
    Some(trim_end_span(content, start..end))
}

fn field_span(content: &str, fm: &FrontMatter, key: &str) -> Option<Range<usize>> {
    let prefix = format!("{key}:");
    let mut start = None;
    let mut end = 0;
    let mut pos = fm.raw_span.start;

    for line in content[fm.raw_span.clone()].split_inclusive('\n') {
        let line_end = pos + line.trim_end_matches(['\r', '\n']).len();
        match start {
            None if line.starts_with(&prefix) => {
                start = Some(pos);
                end = line_end;
            }
            Some(_) if line.starts_with([' ', '\t']) => end = line_end,
            Some(_) => break,
            None => {}
        }
        pos += line.len();
    }

    start.map(|s| s..end)
}

fn trim_end_span(content: &str, span: Range<usize>) -> Range<usize> {
    let trimmed = content[span.clone()].trim_end();
    span.start..span.start + trimmed.len()
}

fn tail(s: &str, n: usize) -> &str {
    let start = s
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(s.len(), |(i, _)| i);
    &s[start..]
}

fn head(s: &str, n: usize) -> &str {
    let end = s.char_indices().nth(n).map_or(s.len(), |(i, _)| i);
    &s[..end]
}
