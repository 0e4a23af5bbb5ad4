//! Weighted safety score gating apply

use crate::post::PostEnhancementReport;
use crate::violation::Violation;
use serde::{Deserialize, Serialize};

pub const KEYWORD_WEIGHT: f64 = 0.35;
pub const STRUCTURE_WEIGHT: f64 = 0.25;
pub const CONTENT_WEIGHT: f64 = 0.25;
pub const TECHNICAL_WEIGHT: f64 = 0.15;

/// Overall score must exceed this to apply
pub const SAFE_THRESHOLD: f64 = 0.8;

/// Aggregate safety assessment of an enhancement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyScore {
    pub keyword_preservation: f64,
    pub structure_preservation: f64,
    pub content_stability: f64,
    pub technical_accuracy: f64,
    /// Weighted sub-scores minus severity penalties, clamped to 0.0 - 1.0
    pub overall: f64,
    pub violations: Vec<Violation>,
}

impl SafetyScore {
    /// Combine sub-scores and violations
    #[must_use]
    pub fn compute(
        keyword_preservation: f64,
        structure_preservation: f64,
        content_stability: f64,
        technical_accuracy: f64,
        violations: Vec<Violation>,
    ) -> Self {
        let weighted = keyword_preservation * KEYWORD_WEIGHT
            + structure_preservation * STRUCTURE_WEIGHT
            + content_stability * CONTENT_WEIGHT
            + technical_accuracy * TECHNICAL_WEIGHT;
        let penalty: f64 = violations.iter().map(|v| v.severity.penalty()).sum();

        Self {
            keyword_preservation,
            structure_preservation,
            content_stability,
            technical_accuracy,
            overall: (weighted - penalty).clamp(0.0, 1.0),
            violations,
        }
    }

    /// Score a post-enhancement report
    #[must_use]
    pub fn from_report(report: &PostEnhancementReport) -> Self {
        Self::compute(
            report.keyword_preservation,
            report.structure_preservation,
            report.content_stability,
            report.technical_accuracy,
            report.violations.clone(),
        )
    }

    /// Perfect score with no violations
    #[must_use]
    pub fn perfect() -> Self {
        Self::compute(1.0, 1.0, 1.0, 1.0, Vec::new())
    }

    /// Number of critical violations
    #[must_use]
    pub fn critical_count(&self) -> usize {
        self.violations.iter().filter(|v| v.is_critical()).count()
    }

    /// Overall above threshold and no critical violation
    #[inline]
    #[must_use]
    pub fn is_safe_to_apply(&self) -> bool {
        self.overall > SAFE_THRESHOLD && self.critical_count() == 0
    }
}
