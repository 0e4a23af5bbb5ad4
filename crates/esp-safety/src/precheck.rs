//! Pre-enhancement checks on the original document and recommendation set

use crate::error::PreCheckError;
use crate::rules::ValidationConfig;
use esp_document::{ContextExtractor, Document, ExtractedContext, FrontMatterState, Recommendation, RecommendationId};

/// A recommendation resolved against the original document
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub id: RecommendationId,
    /// `None` when the target is not found; such recommendations are skipped later
    pub context: Option<ExtractedContext>,
}

/// Successful pre-check
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreCheckReport {
    /// One entry per recommendation, input order
    pub targets: Vec<ResolvedTarget>,
}

impl PreCheckReport {
    /// Number of recommendations whose target was found
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.targets.iter().filter(|t| t.context.is_some()).count()
    }
}

pub(crate) fn run(
    document: &Document,
    recommendations: &[Recommendation],
    extractor: &ContextExtractor,
    config: &ValidationConfig,
) -> Result<PreCheckReport, PreCheckError> {
    if document.is_blank() {
        return Err(PreCheckError::UnreadableDocument("document is empty".to_string()));
    }
    if document.len() > config.max_document_bytes {
        return Err(PreCheckError::UnreadableDocument(format!(
            "document is {} bytes, limit is {}",
            document.len(),
            config.max_document_bytes
        )));
    }

    let structure = document.structure();
    match &structure.front_matter {
        FrontMatterState::Malformed(reason) => return Err(PreCheckError::malformed(reason.clone())),
        FrontMatterState::Absent if config.require_front_matter => {
            return Err(PreCheckError::malformed("front matter is required"));
        }
        FrontMatterState::Present(fm) if config.require_front_matter => {
            if let Some(missing) = config
                .required_front_matter_fields
                .iter()
                .find(|f| !fm.has_field(f))
            {
                return Err(PreCheckError::malformed(format!(
                    "front matter is missing required field '{missing}'"
                )));
            }
        }
        _ => {}
    }
    if structure.unbalanced_fences {
        return Err(PreCheckError::malformed("unterminated code fence"));
    }

    let targets: Vec<ResolvedTarget> = recommendations
        .iter()
        .map(|rec| ResolvedTarget {
            id: rec.id.clone(),
            context: extractor.extract(document, &rec.target).ok(),
        })
        .collect();

    detect_conflicts(recommendations, &targets)?;

    Ok(PreCheckReport { targets })
}

/// Pairwise overlap check
///
/// Overlapping spans are allowed only when both carry the same proposed text.
fn detect_conflicts(recommendations: &[Recommendation], targets: &[ResolvedTarget]) -> Result<(), PreCheckError> {
    for (i, (a, ta)) in recommendations.iter().zip(targets).enumerate() {
        let Some(ca) = &ta.context else { continue };
        for (b, tb) in recommendations.iter().zip(targets).skip(i + 1) {
            let Some(cb) = &tb.context else { continue };
            if !ca.overlaps(cb) {
                continue;
            }
            let same_intent = a.proposed_text.is_some() && a.proposed_text == b.proposed_text;
            if !same_intent {
                return Err(PreCheckError::conflict(
                    &a.id,
                    &b.id,
                    format!(
                        "spans {}..{} and {}..{} overlap",
                        ca.span.start, ca.span.end, cb.span.start, cb.span.end
                    ),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use esp_document::{RecommendationCategory, TargetLocator};

    const DOC: &str = "# Guide\n\nThe plugin loads XLSX files.\n\n## Usage\n\nOpen a workbook.\n";

    fn check(doc: &str, recs: &[Recommendation]) -> Result<PreCheckReport, PreCheckError> {
        run(&Document::new(doc), recs, &ContextExtractor::new(), &ValidationConfig::default())
    }

    fn replace(id: &str, target: TargetLocator, text: &str) -> Recommendation {
        Recommendation::new(id, RecommendationCategory::ReplaceIncorrectClaim, target).with_proposed_text(text)
    }

    #[test]
    fn disjoint_targets_pass() {
        let recs = [
            replace("r1", TargetLocator::phrase("XLSX"), "DOCX"),
            replace("r2", TargetLocator::phrase("workbook"), "spreadsheet"),
        ];
        let report = check(DOC, &recs).unwrap();
        assert_eq!(report.resolved_count(), 2);
    }

    #[test]
    fn overlapping_different_text_conflicts() {
        let recs = [
            replace("r1", TargetLocator::paragraph("XLSX"), "Loads DOCX."),
            replace("r2", TargetLocator::phrase("XLSX files"), "CSV files"),
        ];
        let err = check(DOC, &recs).unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("r1"));
    }

    #[test]
    fn overlapping_identical_text_is_allowed() {
        let recs = [
            replace("r1", TargetLocator::phrase("XLSX"), "DOCX"),
            replace("r2", TargetLocator::phrase("XLSX"), "DOCX"),
        ];
        assert!(check(DOC, &recs).is_ok());
    }

    #[test]
    fn overlapping_without_text_conflicts() {
        let recs = [
            Recommendation::new("r1", RecommendationCategory::ExpandContent, TargetLocator::section("Usage")),
            Recommendation::new("r2", RecommendationCategory::ExpandContent, TargetLocator::paragraph("workbook")),
        ];
        assert!(check(DOC, &recs).unwrap_err().is_conflict());
    }

    #[test]
    fn unresolved_targets_are_not_conflicts() {
        let recs = [
            replace("r1", TargetLocator::phrase("PDF"), "DOCX"),
            replace("r2", TargetLocator::phrase("PDF"), "CSV"),
        ];
        let report = check(DOC, &recs).unwrap();
        assert_eq!(report.resolved_count(), 0);
    }

    #[test]
    fn empty_document_is_unreadable() {
        let err = check("  \n", &[]).unwrap_err();
        assert!(matches!(err, PreCheckError::UnreadableDocument(_)));
    }

    #[test]
    fn malformed_front_matter_blocks() {
        let err = check("---\ntitle: x\nbody\n", &[]).unwrap_err();
        assert!(matches!(err, PreCheckError::MalformedStructure(_)));
    }

    #[test]
    fn unterminated_fence_blocks() {
        let err = check("# T\n\n```\ncode\n", &[]).unwrap_err();
        assert!(matches!(err, PreCheckError::MalformedStructure(_)));
    }

    #[test]
    fn fence_shown_inside_other_fence_passes() {
        let doc = "# Guide\n\nIntro.\n\n~~~markdown\n```\n~~~\n\nThe plugin loads XLSX files.\n";
        let recs = [replace("r1", TargetLocator::phrase("XLSX"), "DOCX")];
        let report = check(doc, &recs).unwrap();
        assert_eq!(report.resolved_count(), 1);
    }

    #[test]
    fn required_field_enforced() {
        let config = ValidationConfig::default().with_required_front_matter(["title"]);
        let err = run(
            &Document::new("---\nauthor: x\n---\nbody\n"),
            &[],
            &ContextExtractor::new(),
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("title"));
    }
}
