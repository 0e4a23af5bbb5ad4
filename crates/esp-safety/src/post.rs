//! Whole-document re-verification of an enhanced candidate

use crate::checks::{self, KeywordGrading};
use crate::rules::{PreservationRules, ValidationConfig};
use crate::violation::{Severity, Violation, ViolationRule};
use esp_document::Document;
use serde::{Deserialize, Serialize};

/// Result of comparing the candidate document against the original
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostEnhancementReport {
    pub keyword_preservation: f64,
    pub structure_preservation: f64,
    pub content_stability: f64,
    pub technical_accuracy: f64,
    pub violations: Vec<Violation>,
    /// Non-penalized findings such as removed links or large growth
    pub warnings: Vec<String>,
    /// No critical violation
    pub is_safe: bool,
}

impl PostEnhancementReport {
    /// Re-run every check on the full documents
    ///
    /// Keyword loss is graded critical here regardless of count.
    #[must_use]
    pub fn evaluate(
        original: &Document,
        candidate: &Document,
        rules: &PreservationRules,
        config: &ValidationConfig,
    ) -> Self {
        let original_structure = original.structure();
        let candidate_structure = candidate.structure();

        let keyword = checks::keyword_check(
            original.content(),
            candidate.content(),
            rules,
            KeywordGrading::Critical,
        );
        let structure = checks::structure_check(&original_structure, &candidate_structure, rules);
        let content = checks::content_check(original.char_count(), candidate.char_count(), rules, config);
        let technical = checks::technical_check(
            &original.content()[original_structure.body_start()..],
            &candidate.content()[candidate_structure.body_start()..],
            rules,
        );

        let mut report = Self {
            keyword_preservation: keyword.score,
            structure_preservation: structure.score,
            content_stability: content.score,
            technical_accuracy: technical.score,
            violations: Vec::new(),
            warnings: Vec::new(),
            is_safe: false,
        };
        for outcome in [keyword, structure, content, technical] {
            report.violations.extend(outcome.violations);
            report.warnings.extend(outcome.notes);
        }

        report
            .violations
            .extend(checks::front_matter_check(&original_structure, &candidate_structure, config));

        if candidate.len() < config.min_document_bytes || candidate.len() > config.max_document_bytes {
            report.violations.push(Violation::new(
                ViolationRule::DocumentSize,
                Severity::High,
                format!(
                    "document size {} outside {}..={} bytes",
                    candidate.len(),
                    config.min_document_bytes,
                    config.max_document_bytes
                ),
            ));
        }

        for link in &original_structure.links {
            if !candidate_structure.links.contains(link) {
                report.warnings.push(format!("link to {link} removed"));
            }
        }

        report.is_safe = !report.violations.iter().any(Violation::is_critical);
        report
    }

    /// Number of critical violations
    #[must_use]
    pub fn critical_count(&self) -> usize {
        self.violations.iter().filter(|v| v.is_critical()).count()
    }
}
