//! Edit validator facade over the three validation stages

use crate::edit::EditValidationResult;
use crate::error::PreCheckError;
use crate::post::PostEnhancementReport;
use crate::precheck::{self, PreCheckReport};
use crate::rules::{PreservationRules, ValidationConfig};
use crate::score::SafetyScore;
use esp_document::{ContextExtractor, Document, Recommendation};

/// Runs pre-enhancement, per-edit and post-enhancement validation
#[derive(Debug, Clone, Default)]
pub struct EditValidator {
    config: ValidationConfig,
    extractor: ContextExtractor,
}

impl EditValidator {
    /// Create validator
    #[must_use]
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            extractor: ContextExtractor::new(),
        }
    }

    /// With a custom context extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: ContextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Validation bounds
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Extractor used to resolve targets
    #[inline]
    #[must_use]
    pub fn extractor(&self) -> &ContextExtractor {
        &self.extractor
    }

    /// Check document readability and recommendation conflicts
    ///
    /// # Errors
    /// Any [`PreCheckError`] blocks the whole run.
    pub fn pre_enhancement_check(
        &self,
        document: &Document,
        recommendations: &[Recommendation],
    ) -> Result<PreCheckReport, PreCheckError> {
        let report = precheck::run(document, recommendations, &self.extractor, &self.config)?;
        tracing::debug!(
            recommendations = recommendations.len(),
            resolved = report.resolved_count(),
            "Pre-enhancement check passed"
        );
        Ok(report)
    }

    /// Validate one candidate edit
    #[must_use]
    pub fn validate_edit(&self, original: &str, edited: &str, rules: &PreservationRules) -> EditValidationResult {
        EditValidationResult::evaluate(original, edited, rules, &self.config)
    }

    /// Re-verify the whole candidate document
    #[must_use]
    pub fn post_enhancement_check(
        &self,
        original: &Document,
        candidate: &Document,
        rules: &PreservationRules,
    ) -> PostEnhancementReport {
        PostEnhancementReport::evaluate(original, candidate, rules, &self.config)
    }

    /// Post-check and fold it into a safety score
    #[must_use]
    pub fn score(
        &self,
        original: &Document,
        candidate: &Document,
        rules: &PreservationRules,
    ) -> (PostEnhancementReport, SafetyScore) {
        let report = self.post_enhancement_check(original, candidate, rules);
        let score = SafetyScore::from_report(&report);
        tracing::debug!(
            overall = score.overall,
            violations = score.violations.len(),
            safe = score.is_safe_to_apply(),
            "Safety score computed"
        );
        (report, score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reduced_document_scores_unsafe() {
        let original = Document::new(format!("# Guide\n\n{}\n", "Cells handles workbooks well. ".repeat(30)));
        let candidate = Document::new("# Guide\n\nShort.\n");
        let validator = EditValidator::default();
        let (report, score) = validator.score(&original, &candidate, &PreservationRules::default());
        assert!(!report.is_safe);
        assert!(!score.is_safe_to_apply());
    }

    proptest! {
        #[test]
        fn identity_edit_scores_perfect(body in "[a-zA-Z ,.]{1,200}") {
            let doc = Document::new(format!("# Title\n\n{body}\n"));
            let rules = PreservationRules::default().with_keywords(["Title"]);
            let validator = EditValidator::default();
            let (_, score) = validator.score(&doc, &doc, &rules);
            prop_assert!((score.overall - 1.0).abs() < 1e-9);
            prop_assert!(score.is_safe_to_apply());

            let edit = validator.validate_edit(doc.content(), doc.content(), &rules);
            prop_assert!(edit.is_valid);
        }
    }
}
