//! Sequential recommendation fold
//!
//! Recommendations are applied in input order, each against the working
//! document produced by the previous step. Generation requests for targets
//! resolved against the original document are fetched concurrently up front;
//! a prefetched result is used only if the target text is unchanged when its
//! step runs, otherwise generation is requested again for the new text.

use crate::error::EnhanceError;
use crate::generation::{GenerationError, GenerationService};
use crate::handlers::{self, EditPlan};
use crate::outcome::{AppliedEdit, EnhancementOutcome, SkipReason, SkippedRecommendation};
use esp_document::{Document, ExtractedContext, Recommendation, RecommendationId};
use esp_safety::{EditValidator, PreCheckReport, PreservationRules};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Enhancer tuning
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancerConfig {
    /// Bound on each generation call
    pub generation_timeout: Duration,
    /// Parallel prefetch limit
    pub max_concurrent_generations: usize,
    /// Recommendations below this confidence are skipped
    pub min_confidence: f64,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(10),
            max_concurrent_generations: 4,
            min_confidence: 0.0,
        }
    }
}

/// Working state threaded through the fold
#[derive(Debug, Clone)]
pub struct FoldState {
    pub document: Document,
    pub applied: Vec<AppliedEdit>,
    pub skipped: Vec<SkippedRecommendation>,
    seen: HashSet<RecommendationId>,
}

impl FoldState {
    /// Start from the original document
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            document,
            applied: Vec::new(),
            skipped: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn skip(mut self, id: &RecommendationId, reason: SkipReason) -> Self {
        tracing::warn!(recommendation = %id, reason = %reason, "Recommendation skipped");
        self.skipped.push(SkippedRecommendation {
            id: id.clone(),
            reason,
        });
        self
    }

    fn finish(self) -> EnhancementOutcome {
        EnhancementOutcome {
            candidate: self.document,
            applied: self.applied,
            skipped: self.skipped,
        }
    }
}

#[derive(Debug, Clone)]
struct Prefetched {
    context_text: String,
    instruction: String,
    result: Result<String, SkipReason>,
}

/// Folds recommendations into a candidate document
pub struct RecommendationEnhancer {
    validator: EditValidator,
    generator: Arc<dyn GenerationService>,
    config: EnhancerConfig,
}

impl RecommendationEnhancer {
    /// Create enhancer with default validation
    #[must_use]
    pub fn new(generator: Arc<dyn GenerationService>) -> Self {
        Self {
            validator: EditValidator::default(),
            generator,
            config: EnhancerConfig::default(),
        }
    }

    /// With validator
    #[must_use]
    pub fn with_validator(mut self, validator: EditValidator) -> Self {
        self.validator = validator;
        self
    }

    /// With config
    #[must_use]
    pub fn with_config(mut self, config: EnhancerConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    #[must_use]
    pub fn validator(&self) -> &EditValidator {
        &self.validator
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EnhancerConfig {
        &self.config
    }

    /// Apply `recommendations` to `document` under `rules`
    ///
    /// # Errors
    /// Only pre-enhancement failures are errors; every per-recommendation
    /// problem is reported in [`EnhancementOutcome::skipped`].
    pub async fn enhance(
        &self,
        document: &Document,
        recommendations: &[Recommendation],
        rules: &PreservationRules,
    ) -> Result<EnhancementOutcome, EnhanceError> {
        let report = self.validator.pre_enhancement_check(document, recommendations)?;
        let mut prefetched = self.prefetch(recommendations, &report).await;

        let mut state = FoldState::new(document.clone());
        for (idx, (rec, target)) in recommendations.iter().zip(&report.targets).enumerate() {
            state = self
                .step(state, rec, target.context.as_ref(), prefetched.remove(&idx), rules)
                .await;
        }

        let outcome = state.finish();
        tracing::info!(
            applied = outcome.applied.len(),
            skipped = outcome.skipped.len(),
            original_hash = %document.hash().short(),
            candidate_hash = %outcome.candidate.hash().short(),
            "Enhancement complete"
        );
        Ok(outcome)
    }

    /// Apply one recommendation to the working state
    ///
    /// `original` is the target as resolved against the unedited document and
    /// is used to re-anchor when the locator no longer matches directly.
    pub async fn apply_one(
        &self,
        state: FoldState,
        rec: &Recommendation,
        original: Option<&ExtractedContext>,
        rules: &PreservationRules,
    ) -> FoldState {
        self.step(state, rec, original, None, rules).await
    }

    async fn step(
        &self,
        mut state: FoldState,
        rec: &Recommendation,
        original: Option<&ExtractedContext>,
        prefetched: Option<Prefetched>,
        rules: &PreservationRules,
    ) -> FoldState {
        if let Some(reason) = self.precondition(&state.seen, rec) {
            return state.skip(&rec.id, reason);
        }
        state.seen.insert(rec.id.clone());

        let extractor = self.validator.extractor();
        let context = match extractor.extract(&state.document, &rec.target) {
            Ok(ctx) => ctx,
            Err(_) => match original.and_then(|o| extractor.relocate(&state.document, o)) {
                Some(ctx) => ctx,
                None => return state.skip(&rec.id, SkipReason::TargetNotFound),
            },
        };

        let replacement = match handlers::plan(rec, &context) {
            Ok(EditPlan::Ready(text)) => text,
            Ok(EditPlan::Generate { instruction, compose }) => {
                let generated = match prefetched {
                    Some(p) if p.context_text == context.text && p.instruction == instruction => p.result,
                    _ => self.generate(&context.text, &instruction).await,
                };
                match generated {
                    Ok(text) => compose.apply(&context, &text),
                    Err(reason) => return state.skip(&rec.id, reason),
                }
            }
            Err(reason) => return state.skip(&rec.id, reason),
        };

        if replacement == context.text {
            return state.skip(&rec.id, SkipReason::NoChange);
        }

        let validation = self.validator.validate_edit(&context.text, &replacement, rules);
        if !validation.is_valid {
            return state.skip(
                &rec.id,
                SkipReason::EditRejected {
                    violations: validation.violations,
                },
            );
        }

        let Ok(next) = state.document.splice(context.span.clone(), &replacement) else {
            return state.skip(&rec.id, SkipReason::TargetNotFound);
        };

        tracing::debug!(
            recommendation = %rec.id,
            category = %rec.category,
            span_start = context.span.start,
            span_end = context.span.end,
            "Edit folded into working document"
        );
        state.document = next;
        state.applied.push(AppliedEdit {
            id: rec.id.clone(),
            category: rec.category,
            original_text: context.text,
            replacement_text: replacement,
            validation,
        });
        state
    }

    fn precondition(&self, seen: &HashSet<RecommendationId>, rec: &Recommendation) -> Option<SkipReason> {
        if seen.contains(&rec.id) {
            return Some(SkipReason::DuplicateRecommendation);
        }
        if rec.confidence < self.config.min_confidence {
            return Some(SkipReason::LowConfidence {
                confidence: rec.confidence,
                threshold: self.config.min_confidence,
            });
        }
        None
    }

    async fn prefetch(
        &self,
        recommendations: &[Recommendation],
        report: &PreCheckReport,
    ) -> HashMap<usize, Prefetched> {
        let mut seen = HashSet::new();
        let mut jobs = Vec::new();
        for (idx, (rec, target)) in recommendations.iter().zip(&report.targets).enumerate() {
            if self.precondition(&seen, rec).is_some() {
                continue;
            }
            seen.insert(rec.id.clone());
            let Some(context) = &target.context else { continue };
            if let Ok(EditPlan::Generate { instruction, .. }) = handlers::plan(rec, context) {
                jobs.push((idx, context.text.clone(), instruction));
            }
        }
        if jobs.is_empty() {
            return HashMap::new();
        }

        tracing::debug!(requests = jobs.len(), "Prefetching generations");
        stream::iter(jobs)
            .map(|(idx, context_text, instruction)| async move {
                let result = self.generate(&context_text, &instruction).await;
                (
                    idx,
                    Prefetched {
                        context_text,
                        instruction,
                        result,
                    },
                )
            })
            .buffer_unordered(self.config.max_concurrent_generations.max(1))
            .collect()
            .await
    }

    async fn generate(&self, context: &str, instruction: &str) -> Result<String, SkipReason> {
        let call = self.generator.generate(context, instruction);
        match tokio::time::timeout(self.config.generation_timeout, call).await {
            Err(_) | Ok(Err(GenerationError::Timeout(_))) => Err(SkipReason::GenerationTimeout),
            Ok(Err(e)) => Err(SkipReason::GenerationFailed { message: e.to_string() }),
            Ok(Ok(text)) if text.trim().is_empty() => Err(SkipReason::GenerationFailed {
                message: "empty response".to_string(),
            }),
            Ok(Ok(text)) => Ok(text),
        }
    }
}

impl std::fmt::Debug for RecommendationEnhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationEnhancer")
            .field("validator", &self.validator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockGenerationService;
    use esp_document::{RecommendationCategory, TargetLocator};
    use esp_safety::ViolationRule;
    use pretty_assertions::assert_eq;

    const DOC: &str = "# Guide\n\nThe plugin loads XLSX files.\n\n## Usage\n\nOpen a workbook and save it.\n";

    fn no_generation() -> Arc<dyn GenerationService> {
        let mut mock = MockGenerationService::new();
        mock.expect_generate().never();
        Arc::new(mock)
    }

    fn replace(id: &str, phrase: &str, text: &str) -> Recommendation {
        Recommendation::new(id, RecommendationCategory::ReplaceIncorrectClaim, TargetLocator::phrase(phrase))
            .with_proposed_text(text)
    }

    #[tokio::test]
    async fn applies_in_order_against_working_copy() {
        let enhancer = RecommendationEnhancer::new(no_generation());
        let recs = [
            replace("r1", "XLSX", "DOCX"),
            // only exists once r1 has run
            replace("r2", "DOCX files", "DOCX and CSV files"),
        ];
        let outcome = enhancer
            .enhance(&Document::new(DOC), &recs, &PreservationRules::default())
            .await
            .unwrap();
        assert_eq!(outcome.applied_ids(), vec![RecommendationId::from("r1"), RecommendationId::from("r2")]);
        assert!(outcome.candidate.content().contains("loads DOCX and CSV files."));

        let reversed = [recs[1].clone(), recs[0].clone()];
        let outcome = enhancer
            .enhance(&Document::new(DOC), &reversed, &PreservationRules::default())
            .await
            .unwrap();
        assert_eq!(outcome.applied_ids(), vec![RecommendationId::from("r1")]);
        assert_eq!(outcome.skip_reason(&"r2".into()), Some(&SkipReason::TargetNotFound));
    }

    #[tokio::test]
    async fn later_step_sees_earlier_edit() {
        let enhancer = RecommendationEnhancer::new(no_generation());
        let recs = [
            replace("r1", "XLSX", "DOCX"),
            Recommendation::new(
                "r2",
                RecommendationCategory::InsertMissingReference,
                TargetLocator::paragraph("DOCX"),
            )
            .with_proposed_text("CSV is also supported."),
        ];
        let doc = Document::new(DOC);
        let mut state = FoldState::new(doc.clone());
        for rec in &recs {
            state = enhancer.apply_one(state, rec, None, &PreservationRules::default()).await;
        }
        assert!(state.skipped.is_empty());
        assert!(state
            .document
            .content()
            .contains("The plugin loads DOCX files.\n\nCSV is also supported.\n\n## Usage"));
    }

    #[tokio::test]
    async fn rejected_edit_leaves_document_unchanged() {
        let enhancer = RecommendationEnhancer::new(no_generation());
        let rules = PreservationRules::default().with_keywords(["workbook", "save", "Open"]);
        let recs = [replace("r1", "Open a workbook and save it.", "Done.")];
        let doc = Document::new(DOC);
        let outcome = enhancer.enhance(&doc, &recs, &rules).await.unwrap();

        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.candidate.hash(), doc.hash());
        let Some(SkipReason::EditRejected { violations }) = outcome.skip_reason(&"r1".into()) else {
            panic!("expected rejection");
        };
        assert!(violations.iter().any(|v| v.rule == ViolationRule::KeywordLost && v.is_critical()));
    }

    #[tokio::test]
    async fn generated_text_is_used() {
        let mut mock = MockGenerationService::new();
        mock.expect_generate()
            .withf(|context, _| context.starts_with("Open a workbook"))
            .times(1)
            .returning(|_, _| Ok("Open a workbook, edit the cells, and save it.".to_string()));
        let enhancer = RecommendationEnhancer::new(Arc::new(mock));

        let recs = [Recommendation::new(
            "r1",
            RecommendationCategory::ExpandContent,
            TargetLocator::paragraph("workbook"),
        )];
        let outcome = enhancer
            .enhance(&Document::new(DOC), &recs, &PreservationRules::default())
            .await
            .unwrap();
        assert_eq!(outcome.applied.len(), 1);
        assert!(outcome.candidate.content().contains("edit the cells"));
    }

    #[tokio::test]
    async fn generation_failure_is_a_skip() {
        let mut mock = MockGenerationService::new();
        mock.expect_generate()
            .returning(|_, _| Err(GenerationError::Failed("model overloaded".to_string())));
        let enhancer = RecommendationEnhancer::new(Arc::new(mock));

        let recs = [
            Recommendation::new("r1", RecommendationCategory::ExpandContent, TargetLocator::paragraph("XLSX")),
            replace("r2", "workbook", "spreadsheet"),
        ];
        let outcome = enhancer
            .enhance(&Document::new(DOC), &recs, &PreservationRules::default())
            .await
            .unwrap();
        assert!(matches!(
            outcome.skip_reason(&"r1".into()),
            Some(SkipReason::GenerationFailed { .. })
        ));
        assert_eq!(outcome.applied_ids(), vec![RecommendationId::from("r2")]);
    }

    struct Slow;

    #[async_trait::async_trait]
    impl GenerationService for Slow {
        async fn generate(&self, _context: &str, _instruction: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test]
    async fn generation_timeout_is_a_skip() {
        let enhancer = RecommendationEnhancer::new(Arc::new(Slow)).with_config(EnhancerConfig {
            generation_timeout: Duration::from_millis(20),
            ..EnhancerConfig::default()
        });
        let recs = [Recommendation::new(
            "r1",
            RecommendationCategory::ExpandContent,
            TargetLocator::paragraph("XLSX"),
        )];
        let outcome = enhancer
            .enhance(&Document::new(DOC), &recs, &PreservationRules::default())
            .await
            .unwrap();
        assert_eq!(outcome.skip_reason(&"r1".into()), Some(&SkipReason::GenerationTimeout));
    }

    #[tokio::test]
    async fn low_confidence_and_duplicates_are_skipped() {
        let enhancer = RecommendationEnhancer::new(no_generation()).with_config(EnhancerConfig {
            min_confidence: 0.5,
            ..EnhancerConfig::default()
        });
        let recs = [
            replace("r1", "XLSX", "DOCX").with_confidence(0.2),
            replace("r2", "workbook", "spreadsheet"),
            replace("r2", "workbook", "spreadsheet"),
        ];
        let outcome = enhancer
            .enhance(&Document::new(DOC), &recs, &PreservationRules::default())
            .await
            .unwrap();
        assert!(matches!(outcome.skipped[0].reason, SkipReason::LowConfidence { .. }));
        assert_eq!(outcome.skipped[1].reason, SkipReason::DuplicateRecommendation);
        assert_eq!(outcome.applied.len(), 1);
    }

    #[tokio::test]
    async fn conflicts_block_the_run() {
        let enhancer = RecommendationEnhancer::new(no_generation());
        let recs = [replace("r1", "XLSX files", "DOCX files"), replace("r2", "XLSX", "CSV")];
        let err = enhancer
            .enhance(&Document::new(DOC), &recs, &PreservationRules::default())
            .await
            .unwrap_err();
        assert!(err.is_blocking());
    }
}
