//! Per-category edit strategies
//!
//! Dispatch is an exhaustive match on [`RecommendationCategory`]. A handler
//! only sees the extracted context and the recommendation, never the rest of
//! the document.

use crate::outcome::SkipReason;
use esp_document::{ContextKind, ExtractedContext, Recommendation, RecommendationCategory, TargetLocator};

/// How generated text becomes the span replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compose {
    /// Generated text replaces the span
    Replace,
    /// Generated text is appended after the span
    Append { separator: &'static str },
}

impl Compose {
    /// Build the replacement for `context` from `text`
    #[must_use]
    pub fn apply(self, context: &ExtractedContext, text: &str) -> String {
        match self {
            Self::Replace => text.trim().to_string(),
            Self::Append { separator } => format!("{}{separator}{}", context.text, text.trim()),
        }
    }
}

/// What a handler decided for one recommendation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditPlan {
    /// Replacement known without generation
    Ready(String),
    /// Replacement depends on the generation service
    Generate { instruction: String, compose: Compose },
}

/// Decide the edit for `rec` at `context`
///
/// # Errors
/// Returns the skip reason when the category cannot act here.
pub fn plan(rec: &Recommendation, context: &ExtractedContext) -> Result<EditPlan, SkipReason> {
    let proposed = rec.proposed_text.as_deref().filter(|t| !t.trim().is_empty());

    match rec.category {
        RecommendationCategory::InsertMissingReference => {
            let compose = Compose::Append {
                separator: if context.kind.is_block() { "\n\n" } else { " " },
            };
            Ok(match proposed {
                Some(text) => EditPlan::Ready(compose.apply(context, text)),
                None => EditPlan::Generate {
                    instruction: instruction(
                        "Write a short addition that supplies the missing reference for this text.",
                        rec,
                    ),
                    compose,
                },
            })
        }
        RecommendationCategory::ReplaceIncorrectClaim => Ok(match proposed {
            Some(text) => EditPlan::Ready(Compose::Replace.apply(context, text)),
            None => EditPlan::Generate {
                instruction: instruction(
                    "Rewrite this text to correct the inaccurate claim. Keep its structure and terminology.",
                    rec,
                ),
                compose: Compose::Replace,
            },
        }),
        RecommendationCategory::StructuralFix => proposed
            .map(|text| EditPlan::Ready(text.to_string()))
            .ok_or(SkipReason::MissingProposedText),
        RecommendationCategory::ExpandContent => {
            let mut text = instruction(
                "Expand this text with more detail. Keep existing headings, code blocks and terms.",
                rec,
            );
            if let Some(hint) = proposed {
                text.push_str("\nSuggested direction: ");
                text.push_str(hint);
            }
            Ok(EditPlan::Generate {
                instruction: text,
                compose: Compose::Replace,
            })
        }
        RecommendationCategory::UpdateFrontMatter => {
            let TargetLocator::FrontMatterField { key } = &rec.target else {
                return Err(SkipReason::UnsupportedLocator);
            };
            if context.kind != ContextKind::FrontMatterField {
                return Err(SkipReason::UnsupportedLocator);
            }
            let value = proposed.ok_or(SkipReason::MissingProposedText)?;
            Ok(EditPlan::Ready(format!("{key}: {}", value.trim())))
        }
    }
}

fn instruction(base: &str, rec: &Recommendation) -> String {
    if rec.rationale.trim().is_empty() {
        base.to_string()
    } else {
        format!("{base}\nReason: {}", rec.rationale.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esp_document::{ContextExtractor, Document};

    const DOC: &str = "---\nversion: 1\n---\n# Guide\n\nThe plugin loads XLSX files.\n";

    fn ctx(locator: &TargetLocator) -> ExtractedContext {
        ContextExtractor::new().extract(&Document::new(DOC), locator).unwrap()
    }

    fn rec(category: RecommendationCategory, target: TargetLocator) -> Recommendation {
        Recommendation::new("r1", category, target)
    }

    #[test]
    fn insert_after_paragraph_uses_blank_line() {
        let target = TargetLocator::paragraph("XLSX");
        let r = rec(RecommendationCategory::InsertMissingReference, target.clone())
            .with_proposed_text("See the CSV guide.");
        assert_eq!(
            plan(&r, &ctx(&target)).unwrap(),
            EditPlan::Ready("The plugin loads XLSX files.\n\nSee the CSV guide.".to_string())
        );
    }

    #[test]
    fn insert_after_phrase_uses_space() {
        let target = TargetLocator::phrase("XLSX");
        let r = rec(RecommendationCategory::InsertMissingReference, target.clone()).with_proposed_text("and CSV");
        assert_eq!(plan(&r, &ctx(&target)).unwrap(), EditPlan::Ready("XLSX and CSV".to_string()));
    }

    #[test]
    fn replace_without_text_generates() {
        let target = TargetLocator::phrase("XLSX files");
        let r = rec(RecommendationCategory::ReplaceIncorrectClaim, target.clone())
            .with_rationale("format list is outdated");
        let EditPlan::Generate { instruction, compose } = plan(&r, &ctx(&target)).unwrap() else {
            panic!("expected generation");
        };
        assert_eq!(compose, Compose::Replace);
        assert!(instruction.contains("format list is outdated"));
    }

    #[test]
    fn structural_fix_requires_text() {
        let target = TargetLocator::section("Guide");
        let r = rec(RecommendationCategory::StructuralFix, target.clone());
        assert_eq!(plan(&r, &ctx(&target)), Err(SkipReason::MissingProposedText));
    }

    #[test]
    fn expand_passes_hint() {
        let target = TargetLocator::paragraph("XLSX");
        let r = rec(RecommendationCategory::ExpandContent, target.clone()).with_proposed_text("mention CSV");
        let EditPlan::Generate { instruction, .. } = plan(&r, &ctx(&target)).unwrap() else {
            panic!("expected generation");
        };
        assert!(instruction.ends_with("Suggested direction: mention CSV"));
    }

    #[test]
    fn front_matter_update() {
        let target = TargetLocator::front_matter_field("version");
        let r = rec(RecommendationCategory::UpdateFrontMatter, target.clone()).with_proposed_text(" 2 ");
        assert_eq!(plan(&r, &ctx(&target)).unwrap(), EditPlan::Ready("version: 2".to_string()));
    }

    #[test]
    fn front_matter_update_rejects_other_locators() {
        let target = TargetLocator::phrase("XLSX");
        let r = rec(RecommendationCategory::UpdateFrontMatter, target.clone()).with_proposed_text("2");
        assert_eq!(plan(&r, &ctx(&target)), Err(SkipReason::UnsupportedLocator));
    }
}
