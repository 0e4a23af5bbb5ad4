//! ESP Enhancer
//!
//! Turns an approved recommendation set into a candidate document.
//!
//! # Pipeline
//!
//! ```text
//! pre-check ─► prefetch generations ─► fold(step) per recommendation ─► outcome
//!                                         │
//!                       extract ─► plan ─► validate ─► splice | skip
//! ```
//!
//! A single bad recommendation never fails the run; it is recorded with a
//! [`SkipReason`]. Only [`EnhanceError`] (pre-check failures) aborts.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod enhancer;
mod error;
mod generation;
mod handlers;
mod outcome;

pub use enhancer::{EnhancerConfig, FoldState, RecommendationEnhancer};
pub use error::EnhanceError;
pub use generation::{GenerationError, GenerationService, UnavailableGeneration};
pub use handlers::{plan, Compose, EditPlan};
pub use outcome::{AppliedEdit, EnhancementOutcome, SkipReason, SkippedRecommendation};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use esp_document::{Document, Recommendation, RecommendationCategory, TargetLocator};
    use esp_safety::PreservationRules;
    use std::sync::Arc;

    #[tokio::test]
    async fn oversized_cut_lands_in_skipped() {
        let section = format!("## Details\n\n{}", "Cells reads every sheet of a workbook. ".repeat(25));
        let doc = Document::new(format!("# Guide\n\n{section}\n"));
        let replacement = format!("## Details\n\n{}", "x".repeat(section.chars().count() * 2 / 5 - 12));

        let rec = Recommendation::new(
            "r1",
            RecommendationCategory::StructuralFix,
            TargetLocator::section("Details"),
        )
        .with_proposed_text(replacement);

        let enhancer = RecommendationEnhancer::new(Arc::new(UnavailableGeneration));
        let rules = PreservationRules::default().with_max_content_reduction(30.0);
        let outcome = enhancer.enhance(&doc, &[rec], &rules).await.unwrap();

        assert!(outcome.applied.is_empty());
        let Some(SkipReason::EditRejected { violations }) = outcome.skipped.first().map(|s| &s.reason) else {
            panic!("expected rejection");
        };
        assert!(violations.iter().any(esp_safety::Violation::is_critical));
        assert_eq!(outcome.candidate.hash(), doc.hash());
    }

    #[tokio::test]
    async fn missing_generation_service_skips_synthesis() {
        let doc = Document::new("# Guide\n\nThe plugin loads XLSX files.\n");
        let rec = Recommendation::new(
            "r1",
            RecommendationCategory::ExpandContent,
            TargetLocator::paragraph("plugin"),
        );
        let enhancer = RecommendationEnhancer::new(Arc::new(UnavailableGeneration));
        let outcome = enhancer.enhance(&doc, &[rec], &PreservationRules::default()).await.unwrap();
        assert!(matches!(
            outcome.skipped[0].reason,
            SkipReason::GenerationFailed { .. }
        ));
    }

    #[test]
    fn skip_reason_serializes_tagged() {
        let json = serde_json::to_value(SkipReason::GenerationTimeout).unwrap();
        assert_eq!(json["kind"], "generation_timeout");
    }
}
