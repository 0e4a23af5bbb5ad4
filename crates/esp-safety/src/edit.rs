//! Per-edit validation of one candidate span

use crate::checks::{self, KeywordGrading};
use crate::rules::{PreservationRules, ValidationConfig};
use crate::violation::Violation;
use esp_document::DocumentStructure;
use serde::{Deserialize, Serialize};

/// Outcome of validating a single edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditValidationResult {
    /// No critical violation and every sub-score above zero
    pub is_valid: bool,
    pub keyword_score: f64,
    pub structure_score: f64,
    pub content_score: f64,
    pub technical_score: f64,
    pub violations: Vec<Violation>,
    /// Non-penalized observations such as large expansion
    pub notes: Vec<String>,
}

impl EditValidationResult {
    /// Validate replacing `original` span text with `edited`
    #[must_use]
    pub fn evaluate(
        original: &str,
        edited: &str,
        rules: &PreservationRules,
        config: &ValidationConfig,
    ) -> Self {
        let keyword = checks::keyword_check(original, edited, rules, KeywordGrading::Scaled);
        let structure = checks::structure_check(
            &DocumentStructure::analyze_fragment(original),
            &DocumentStructure::analyze_fragment(edited),
            rules,
        );
        let content = checks::content_check(
            original.chars().count(),
            edited.chars().count(),
            rules,
            config,
        );
        let technical = checks::technical_check(original, edited, rules);

        let scores = [keyword.score, structure.score, content.score, technical.score];
        let mut violations = Vec::new();
        let mut notes = Vec::new();
        for outcome in [keyword, structure, content, technical] {
            violations.extend(outcome.violations);
            notes.extend(outcome.notes);
        }

        let is_valid = !violations.iter().any(Violation::is_critical) && scores.iter().all(|s| *s > 0.0);

        Self {
            is_valid,
            keyword_score: scores[0],
            structure_score: scores[1],
            content_score: scores[2],
            technical_score: scores[3],
            violations,
            notes,
        }
    }

    /// Critical violations only
    pub fn critical_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_critical())
    }

    /// Lowest of the four sub-scores
    #[must_use]
    pub fn min_score(&self) -> f64 {
        self.keyword_score
            .min(self.structure_score)
            .min(self.content_score)
            .min(self.technical_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::{Severity, ViolationRule};

    #[test]
    fn benign_edit_is_valid() {
        let rules = PreservationRules::default().with_keywords(["workbook"]);
        let result = EditValidationResult::evaluate(
            "Open the workbook.",
            "Open the workbook with Cells.",
            &rules,
            &ValidationConfig::default(),
        );
        assert!(result.is_valid);
        assert!(result.violations.is_empty());
        assert_eq!(result.min_score(), 1.0);
    }

    #[test]
    fn single_keyword_loss_stays_valid() {
        let rules = PreservationRules::default().with_keywords(["workbook"]);
        let result = EditValidationResult::evaluate(
            "Open the workbook file.",
            "Open the spreadsheet file.",
            &rules,
            &ValidationConfig::default(),
        );
        assert!(result.is_valid);
        assert_eq!(result.violations[0].severity, Severity::Medium);
        assert!((result.keyword_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn heavy_cut_is_rejected() {
        let original = "word ".repeat(200);
        let edited = "word ".repeat(80);
        let result = EditValidationResult::evaluate(
            &original,
            &edited,
            &PreservationRules::default(),
            &ValidationConfig::default(),
        );
        assert!(!result.is_valid);
        let critical: Vec<_> = result.critical_violations().collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].rule, ViolationRule::ContentReduction);
        assert!((result.content_score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn zero_subscore_is_rejected_without_critical() {
        let rules = PreservationRules::default()
            .with_technical_terms(["x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "y1", "y2"]);
        let result = EditValidationResult::evaluate(
            "x1 x2 x3 x4 x5 x6 x7 x8 x9 y1 y2",
            "z1 z2 z3 z4 z5 z6 z7 z8 z9 w1 w2",
            &rules,
            &ValidationConfig::default(),
        );
        assert_eq!(result.critical_violations().count(), 0);
        assert_eq!(result.technical_score, 0.0);
        assert!(!result.is_valid);
    }
}
