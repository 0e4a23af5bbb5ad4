//! Rule violations and severities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Violation severity
///
/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, no score effect
    Low,
    Medium,
    High,
    /// Rejects an edit and blocks apply
    Critical,
}

impl Severity {
    /// Amount subtracted from the overall safety score
    #[inline]
    #[must_use]
    pub const fn penalty(self) -> f64 {
        match self {
            Self::Low => 0.0,
            Self::Medium => 0.1,
            Self::High => 0.2,
            Self::Critical => 0.3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Which preservation rule was broken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRule {
    KeywordLost,
    CodeBlockCount,
    HeadingLost,
    ListItemsLost,
    TableRowsLost,
    MalformedMarkdown,
    ContentReduction,
    TechnicalTermLost,
    ProductNameLost,
    FrontMatter,
    DocumentSize,
}

impl fmt::Display for ViolationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::KeywordLost => "keyword_lost",
            Self::CodeBlockCount => "code_block_count",
            Self::HeadingLost => "heading_lost",
            Self::ListItemsLost => "list_items_lost",
            Self::TableRowsLost => "table_rows_lost",
            Self::MalformedMarkdown => "malformed_markdown",
            Self::ContentReduction => "content_reduction",
            Self::TechnicalTermLost => "technical_term_lost",
            Self::ProductNameLost => "product_name_lost",
            Self::FrontMatter => "front_matter",
            Self::DocumentSize => "document_size",
        };
        f.write_str(s)
    }
}

/// A single broken rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule broken
    pub rule: ViolationRule,
    /// Severity
    pub severity: Severity,
    /// Human readable detail
    pub detail: String,
}

impl Violation {
    /// Create violation
    #[inline]
    #[must_use]
    pub fn new(rule: ViolationRule, severity: Severity, detail: impl Into<String>) -> Self {
        Self {
            rule,
            severity,
            detail: detail.into(),
        }
    }

    /// Whether this violation is critical
    #[inline]
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.rule, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_and_penalty() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::Low.penalty(), 0.0);
        assert_eq!(Severity::Critical.penalty(), 0.3);
    }

    #[test]
    fn violation_display() {
        let v = Violation::new(ViolationRule::KeywordLost, Severity::Medium, "keyword 'Cells' removed");
        assert_eq!(v.to_string(), "[medium] keyword_lost: keyword 'Cells' removed");
        assert!(!v.is_critical());
    }
}
