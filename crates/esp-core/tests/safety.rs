//! Safety gating through the service: scenarios and properties

use esp_core::prelude::*;
use esp_core::InMemoryDocumentStorage;
use esp_enhancer::SkipReason;
use esp_safety::{ViolationRule, Violation};
use esp_test_utils::{article_rules, product_dropping_recommendation, safe_recommendation, TestHarness, ARTICLE_REF};
use proptest::prelude::*;
use std::sync::Arc;

fn service_with(reference: &str, content: &str) -> EnhancementService {
    let documents = Arc::new(InMemoryDocumentStorage::new());
    documents.insert(reference, content);
    EnhancementService::builder()
        .with_document_storage(documents)
        .build()
        .unwrap()
}

#[tokio::test]
async fn term_never_present_is_not_penalized() {
    let service = service_with("plugin.md", "The Document plugin loads XLSX files.\n");
    let rec = Recommendation::new(
        "r1",
        RecommendationCategory::ReplaceIncorrectClaim,
        TargetLocator::paragraph("Document plugin"),
    )
    .with_proposed_text("The Document plugin loads DOCX files.");
    let rules = PreservationRules::default().with_technical_terms(["Cells"]);

    let preview = service
        .create_preview(CreatePreviewRequest::new("plugin.md", "v1", vec![rec]).with_rules(rules))
        .await
        .unwrap();
    assert_eq!(preview.applied_recommendations.len(), 1);
    assert!((preview.safety_score.technical_accuracy - 1.0).abs() < f64::EPSILON);
    assert!(preview.is_safe_to_apply());
}

#[tokio::test]
async fn dropped_product_name_lowers_technical_score() {
    let harness = TestHarness::new();
    let preview = harness.preview(vec![product_dropping_recommendation("r1")]).await;

    assert!(preview.safety_score.technical_accuracy < 1.0);
    assert!(preview
        .safety_score
        .violations
        .iter()
        .any(|v| v.rule == ViolationRule::ProductNameLost));
    assert!(!preview.is_safe_to_apply());
}

#[tokio::test]
async fn large_section_cut_is_skipped() {
    let body: String = "lorem ipsum ".repeat(100).chars().take(988).collect();
    let section = format!("## Details\n\n{body}");
    assert_eq!(section.chars().count(), 1000);
    let content = format!("# Guide\n\n{section}\n");
    let service = service_with("guide.md", &content);

    let replacement: String = section.chars().take(400).collect();
    let rec = Recommendation::new("r1", RecommendationCategory::StructuralFix, TargetLocator::section("Details"))
        .with_proposed_text(replacement);
    let rules = PreservationRules::default().with_max_content_reduction(30.0);

    let preview = service
        .create_preview(CreatePreviewRequest::new("guide.md", "v1", vec![rec]).with_rules(rules))
        .await
        .unwrap();

    assert!(preview.applied_recommendations.is_empty());
    let Some(SkipReason::EditRejected { violations }) = preview
        .skipped_recommendations
        .first()
        .map(|s| &s.reason)
    else {
        panic!("expected rejection, got {:?}", preview.skipped_recommendations);
    };
    assert!(violations
        .iter()
        .any(|v| v.rule == ViolationRule::ContentReduction && v.is_critical()));
    assert_eq!(preview.enhanced_content, content);
}

#[tokio::test]
async fn overlapping_conflict_creates_no_preview() {
    let harness = TestHarness::new();
    let a = safe_recommendation("r1");
    let b = Recommendation::new(
        "r2",
        RecommendationCategory::ReplaceIncorrectClaim,
        TargetLocator::phrase("XLSX files"),
    )
    .with_proposed_text("XLSM files");

    let err = harness
        .service
        .create_preview(CreatePreviewRequest::new(ARTICLE_REF, "v1", vec![a, b]).with_rules(article_rules()))
        .await
        .unwrap_err();

    assert!(err.is_blocking());
    assert!(matches!(
        err,
        PreviewError::Enhance(ref e) if e.as_pre_check().is_some_and(esp_safety::PreCheckError::is_conflict)
    ));
    assert!(harness.service.list_previews(&PreviewFilter::new()).is_empty());
}

#[tokio::test]
async fn critical_recommendation_never_raises_overall() {
    let harness = TestHarness::new();
    let base = harness.preview(vec![safe_recommendation("r1")]).await;

    let destructive = Recommendation::new("r2", RecommendationCategory::StructuralFix, TargetLocator::section("Steps"))
        .with_proposed_text("## Steps\n\nJust open it.\n");
    let with_critical = harness.preview(vec![safe_recommendation("r1"), destructive]).await;

    assert!(with_critical.safety_score.overall <= base.safety_score.overall);
    assert!(matches!(
        with_critical.skipped_recommendations[0].reason,
        SkipReason::EditRejected { .. }
    ));
}

fn keywords_in(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    ["workbook", "worksheet"]
        .into_iter()
        .filter(|k| lower.contains(k))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn safe_previews_keep_every_keyword(
        words in proptest::collection::vec(
            prop::sample::select(vec!["Read", "the", "first", "worksheet", "sheet", "tab", "workbook", "data"]),
            1..6,
        )
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let replacement = words.join(" ");
        let preview = runtime.block_on(async {
            let harness = TestHarness::new();
            let rec = Recommendation::new(
                "r1",
                RecommendationCategory::ReplaceIncorrectClaim,
                TargetLocator::phrase("Read the first worksheet"),
            )
            .with_proposed_text(replacement);
            harness.preview(vec![rec]).await
        });

        if preview.is_safe_to_apply() {
            let original = keywords_in(&preview.original_content);
            let enhanced = keywords_in(&preview.enhanced_content);
            for keyword in original {
                prop_assert!(enhanced.contains(&keyword), "{keyword} lost from a safe preview");
            }
        } else {
            prop_assert!(preview.safety_score.violations.iter().any(Violation::is_critical)
                || preview.safety_score.overall <= esp_safety::SAFE_THRESHOLD);
        }
    }
}
