//! Individual preservation checks shared by per-edit and post-enhancement validation

use crate::rules::{PreservationRules, StructureElement, ValidationConfig};
use crate::violation::{Severity, Violation, ViolationRule};
use esp_document::{prose_text, DocumentStructure};
use std::collections::BTreeSet;

/// Score lost per missing keyword or technical term
const TERM_COST: f64 = 0.1;
/// Score lost per missing product name
const PRODUCT_COST: f64 = 0.2;
/// Score lost when the code block count changes
const CODE_BLOCK_COST: f64 = 0.5;
/// Score lost per lost heading, list or table
const STRUCTURE_COST: f64 = 0.25;

/// Result of one check
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CheckOutcome {
    pub(crate) score: f64,
    pub(crate) violations: Vec<Violation>,
    pub(crate) notes: Vec<String>,
}

impl CheckOutcome {
    fn clean() -> Self {
        Self {
            score: 1.0,
            violations: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// How lost keywords are graded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeywordGrading {
    /// Severity grows with the number lost
    Scaled,
    /// Every loss is critical
    Critical,
}

/// Terms present in `original` but absent from `edited` (case-insensitive)
pub(crate) fn lost_terms<'a>(original: &str, edited: &str, terms: &'a BTreeSet<String>) -> Vec<&'a str> {
    let original = original.to_lowercase();
    let edited = edited.to_lowercase();
    terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .filter(|t| {
            let needle = t.to_lowercase();
            original.contains(&needle) && !edited.contains(&needle)
        })
        .map(String::as_str)
        .collect()
}

/// Names present in the prose of `original` but not of `edited`
///
/// Matching is case-sensitive on word boundaries. Code and link
/// destinations are not prose, so a name surviving only in a URL is lost.
pub(crate) fn lost_names<'a>(original: &str, edited: &str, names: &'a BTreeSet<String>) -> Vec<&'a str> {
    let original = prose_text(original);
    let edited = prose_text(edited);
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .filter(|n| contains_word(&original, n) && !contains_word(&edited, n))
        .collect()
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(word).any(|(at, _)| {
        let before = haystack[..at].chars().next_back();
        let after = haystack[at + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

pub(crate) fn keyword_check(
    original: &str,
    edited: &str,
    rules: &PreservationRules,
    grading: KeywordGrading,
) -> CheckOutcome {
    let lost = lost_terms(original, edited, &rules.preserve_keywords);
    if lost.is_empty() {
        return CheckOutcome::clean();
    }

    let severity = match grading {
        KeywordGrading::Critical => Severity::Critical,
        KeywordGrading::Scaled => match lost.len() {
            1 => Severity::Medium,
            2 => Severity::High,
            _ => Severity::Critical,
        },
    };

    CheckOutcome {
        score: (1.0 - TERM_COST * lost.len() as f64).max(0.0),
        violations: lost
            .iter()
            .map(|k| Violation::new(ViolationRule::KeywordLost, severity, format!("keyword '{k}' removed")))
            .collect(),
        notes: Vec::new(),
    }
}

pub(crate) fn structure_check(
    original: &DocumentStructure,
    edited: &DocumentStructure,
    rules: &PreservationRules,
) -> CheckOutcome {
    let mut outcome = CheckOutcome::clean();

    if rules.preserve_code_blocks && original.code_block_count() != edited.code_block_count() {
        outcome.score -= CODE_BLOCK_COST;
        outcome.violations.push(Violation::new(
            ViolationRule::CodeBlockCount,
            Severity::Critical,
            format!(
                "code block count changed from {} to {}",
                original.code_block_count(),
                edited.code_block_count()
            ),
        ));
    }

    if !original.unbalanced_fences && edited.unbalanced_fences {
        outcome.score -= CODE_BLOCK_COST;
        outcome.violations.push(Violation::new(
            ViolationRule::MalformedMarkdown,
            Severity::Critical,
            "edit leaves an unterminated code fence",
        ));
    }

    if rules.preserves(StructureElement::Heading) {
        for heading in original.major_headings() {
            let kept = edited
                .major_headings()
                .any(|h| h.text.to_lowercase() == heading.text.to_lowercase());
            if !kept {
                outcome.score -= STRUCTURE_COST;
                outcome.violations.push(Violation::new(
                    ViolationRule::HeadingLost,
                    Severity::High,
                    format!("heading '{}' removed", heading.text),
                ));
            }
        }
    }

    if rules.preserves(StructureElement::List) && edited.ordered_list_items < original.ordered_list_items {
        outcome.score -= STRUCTURE_COST;
        outcome.violations.push(Violation::new(
            ViolationRule::ListItemsLost,
            Severity::High,
            format!(
                "numbered list items dropped from {} to {}",
                original.ordered_list_items, edited.ordered_list_items
            ),
        ));
    }

    if rules.preserves(StructureElement::Table) && edited.table_rows < original.table_rows {
        outcome.score -= STRUCTURE_COST;
        outcome.violations.push(Violation::new(
            ViolationRule::TableRowsLost,
            Severity::High,
            format!("table rows dropped from {} to {}", original.table_rows, edited.table_rows),
        ));
    }

    outcome.score = outcome.score.max(0.0);
    outcome
}

/// Compare character counts against the reduction limit and expansion warning
pub(crate) fn content_check(
    original_chars: usize,
    edited_chars: usize,
    rules: &PreservationRules,
    config: &ValidationConfig,
) -> CheckOutcome {
    let mut outcome = CheckOutcome::clean();
    if original_chars == 0 {
        return outcome;
    }

    let change = (edited_chars as f64 - original_chars as f64) / original_chars as f64 * 100.0;
    if -change > rules.max_content_reduction_percent {
        outcome.score = (1.0 + change / 100.0).max(0.0);
        outcome.violations.push(Violation::new(
            ViolationRule::ContentReduction,
            Severity::Critical,
            format!(
                "content reduced by {:.1}% (limit {:.1}%)",
                -change, rules.max_content_reduction_percent
            ),
        ));
    } else if change > config.expansion_warning_percent {
        outcome.notes.push(format!("content expanded by {change:.1}%"));
    }

    outcome
}

pub(crate) fn technical_check(original: &str, edited: &str, rules: &PreservationRules) -> CheckOutcome {
    let terms = lost_names(original, edited, &rules.preserve_technical_terms);
    let products = lost_names(original, edited, &rules.preserve_product_names);
    if terms.is_empty() && products.is_empty() {
        return CheckOutcome::clean();
    }

    let score = 1.0 - TERM_COST * terms.len() as f64 - PRODUCT_COST * products.len() as f64;
    let violations = terms
        .iter()
        .map(|t| {
            Violation::new(
                ViolationRule::TechnicalTermLost,
                Severity::Medium,
                format!("technical term '{t}' removed"),
            )
        })
        .chain(products.iter().map(|p| {
            Violation::new(
                ViolationRule::ProductNameLost,
                Severity::High,
                format!("product name '{p}' removed"),
            )
        }))
        .collect();

    CheckOutcome {
        score: score.max(0.0),
        violations,
        notes: Vec::new(),
    }
}

/// Front matter presence and required fields on a candidate document
pub(crate) fn front_matter_check(
    original: &DocumentStructure,
    candidate: &DocumentStructure,
    config: &ValidationConfig,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let required = config.require_front_matter || original.front_matter.as_present().is_some();

    match candidate.front_matter.as_present() {
        None if required => violations.push(Violation::new(
            ViolationRule::FrontMatter,
            Severity::Critical,
            "front matter missing or malformed",
        )),
        None => {}
        Some(fm) if config.require_front_matter => {
            for field in &config.required_front_matter_fields {
                if !fm.has_field(field) {
                    violations.push(Violation::new(
                        ViolationRule::FrontMatter,
                        Severity::Critical,
                        format!("front matter field '{field}' missing"),
                    ));
                }
            }
        }
        Some(_) => {}
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> PreservationRules {
        PreservationRules::default()
            .with_keywords(["Cells", "XLSX", "CSV"])
            .with_technical_terms(["workbook"])
            .with_product_names(["Cells"])
    }

    #[test]
    fn keyword_severity_scales_with_losses() {
        let r = rules();
        let one = keyword_check("Cells reads XLSX", "Cells reads files", &r, KeywordGrading::Scaled);
        assert_eq!(one.violations.len(), 1);
        assert_eq!(one.violations[0].severity, Severity::Medium);
        assert!((one.score - 0.9).abs() < 1e-9);

        let two = keyword_check("Cells reads XLSX", "It reads files", &r, KeywordGrading::Scaled);
        assert_eq!(two.violations[0].severity, Severity::High);

        let three = keyword_check("Cells reads XLSX and CSV", "It reads files", &r, KeywordGrading::Scaled);
        assert!(three.violations.iter().all(Violation::is_critical));
        assert!((three.score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let outcome = keyword_check("Load XLSX", "load xlsx files", &rules(), KeywordGrading::Scaled);
        assert!(outcome.violations.is_empty());
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn keyword_absent_from_original_is_ignored() {
        let outcome = keyword_check("plain text", "other text", &rules(), KeywordGrading::Critical);
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn code_block_change_is_critical() {
        let original = DocumentStructure::analyze_fragment("text\n\n```\ncode\n```\n");
        let edited = DocumentStructure::analyze_fragment("text only\n");
        let outcome = structure_check(&original, &edited, &rules());
        assert!(outcome.violations.iter().any(|v| v.rule == ViolationRule::CodeBlockCount && v.is_critical()));
        assert!((outcome.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn lost_heading_and_table_rows_are_high() {
        let original = DocumentStructure::analyze_fragment("## Setup\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        let edited = DocumentStructure::analyze_fragment("Setup is easy.\n");
        let outcome = structure_check(&original, &edited, &rules());
        let rules_hit: Vec<_> = outcome.violations.iter().map(|v| v.rule).collect();
        assert!(rules_hit.contains(&ViolationRule::HeadingLost));
        assert!(rules_hit.contains(&ViolationRule::TableRowsLost));
        assert!(outcome.violations.iter().all(|v| v.severity == Severity::High));
        assert!((outcome.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unprotected_elements_are_not_checked() {
        let r = PreservationRules::default().with_structure_elements([]);
        let original = DocumentStructure::analyze_fragment("## Setup\n\n1. one\n2. two\n");
        let edited = DocumentStructure::analyze_fragment("Setup.\n");
        assert_eq!(structure_check(&original, &edited, &r).score, 1.0);
    }

    #[test]
    fn reduction_over_limit_is_critical() {
        let outcome = content_check(1000, 400, &rules(), &ValidationConfig::default());
        assert_eq!(outcome.violations.len(), 1);
        assert!(outcome.violations[0].is_critical());
        assert!((outcome.score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn reduction_within_limit_passes() {
        let outcome = content_check(100, 75, &rules(), &ValidationConfig::default());
        assert!(outcome.violations.is_empty());
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn expansion_only_notes() {
        let outcome = content_check(100, 200, &rules(), &ValidationConfig::default());
        assert!(outcome.violations.is_empty());
        assert_eq!(outcome.notes.len(), 1);
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn product_names_cost_more_than_terms() {
        let outcome = technical_check("Cells opens a workbook", "It opens a file", &rules());
        assert!((outcome.score - 0.7).abs() < 1e-9);
        let product = outcome
            .violations
            .iter()
            .find(|v| v.rule == ViolationRule::ProductNameLost)
            .unwrap();
        assert_eq!(product.severity, Severity::High);
    }

    #[test]
    fn name_in_link_destination_does_not_count() {
        let original = "Loads files with Cells.\n\nSee [the reference](https://example.com/cells).\n";
        let edited = "Loads files.\n\nSee [the reference](https://example.com/cells).\n";
        let outcome = technical_check(original, edited, &rules());
        assert!(outcome.violations.iter().any(|v| v.rule == ViolationRule::ProductNameLost));
        assert!((outcome.score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn names_match_whole_words_with_case() {
        let r = PreservationRules::default().with_technical_terms(["XLS"]).with_product_names(["Cells"]);
        assert_eq!(lost_names("Reads XLS.", "Reads XLSX.", &r.preserve_technical_terms), vec!["XLS"]);
        assert_eq!(lost_names("Uses Cells.", "Uses cells.", &r.preserve_product_names), vec!["Cells"]);
        assert!(lost_names("Uses Cells.", "Cells, again.", &r.preserve_product_names).is_empty());
    }

    #[test]
    fn name_only_in_code_is_not_tracked() {
        let outcome = technical_check("Call `Cells.Open`.\n", "Call `Open`.\n", &rules());
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn front_matter_loss_is_critical() {
        let original = DocumentStructure::analyze("---\ntitle: x\n---\nbody\n");
        let candidate = DocumentStructure::analyze("body\n");
        let violations = front_matter_check(&original, &candidate, &ValidationConfig::default());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].is_critical());
    }

    #[test]
    fn required_field_missing() {
        let config = ValidationConfig::default().with_required_front_matter(["title", "author"]);
        let s = DocumentStructure::analyze("---\ntitle: x\n---\nbody\n");
        let violations = front_matter_check(&s, &s, &config);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].detail.contains("author"));
    }
}
