//! Preservation rules and validation bounds

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Structural element kinds that can be protected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureElement {
    /// Level 1 and 2 headings
    Heading,
    /// Numbered list items
    List,
    /// Table rows
    Table,
}

/// Invariants an edit must not violate, supplied per validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreservationRules {
    /// Keywords that must survive every edit
    pub preserve_keywords: BTreeSet<String>,
    /// Largest allowed shrink of an edited span, in percent
    pub max_content_reduction_percent: f64,
    /// Code block count must not change
    pub preserve_code_blocks: bool,
    /// Structural elements that must not be lost
    pub preserve_structure_elements: BTreeSet<StructureElement>,
    /// Technical terms (lower risk)
    pub preserve_technical_terms: BTreeSet<String>,
    /// Product names (higher risk)
    pub preserve_product_names: BTreeSet<String>,
}

impl Default for PreservationRules {
    fn default() -> Self {
        Self {
            preserve_keywords: BTreeSet::new(),
            max_content_reduction_percent: 30.0,
            preserve_code_blocks: true,
            preserve_structure_elements: [
                StructureElement::Heading,
                StructureElement::List,
                StructureElement::Table,
            ]
            .into_iter()
            .collect(),
            preserve_technical_terms: BTreeSet::new(),
            preserve_product_names: BTreeSet::new(),
        }
    }
}

impl PreservationRules {
    /// Default rules
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With keywords
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserve_keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    /// With technical terms
    #[must_use]
    pub fn with_technical_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserve_technical_terms.extend(terms.into_iter().map(Into::into));
        self
    }

    /// With product names
    #[must_use]
    pub fn with_product_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserve_product_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// With max content reduction
    #[must_use]
    pub fn with_max_content_reduction(mut self, percent: f64) -> Self {
        self.max_content_reduction_percent = percent.max(0.0);
        self
    }

    /// With protected structure elements (replaces the default set)
    #[must_use]
    pub fn with_structure_elements<I>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = StructureElement>,
    {
        self.preserve_structure_elements = elements.into_iter().collect();
        self
    }

    /// With code block preservation toggled
    #[must_use]
    pub fn with_code_block_preservation(mut self, preserve: bool) -> Self {
        self.preserve_code_blocks = preserve;
        self
    }

    /// Whether an element kind is protected
    #[inline]
    #[must_use]
    pub fn preserves(&self, element: StructureElement) -> bool {
        self.preserve_structure_elements.contains(&element)
    }
}

/// Document-level bounds checked before and after enhancement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Front matter block must exist
    pub require_front_matter: bool,
    /// Fields the front matter must carry when required
    pub required_front_matter_fields: Vec<String>,
    /// Smallest acceptable candidate document
    pub min_document_bytes: usize,
    /// Largest acceptable document
    pub max_document_bytes: usize,
    /// Growth above this percent is flagged (not penalized)
    pub expansion_warning_percent: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_front_matter: false,
            required_front_matter_fields: Vec::new(),
            min_document_bytes: 1,
            max_document_bytes: 10 * 1024 * 1024, // 10MB
            expansion_warning_percent: 50.0,
        }
    }
}

impl ValidationConfig {
    /// Require front matter with the given fields
    #[must_use]
    pub fn with_required_front_matter<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_front_matter = true;
        self.required_front_matter_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// With max document size
    #[must_use]
    pub fn with_max_document_bytes(mut self, max: usize) -> Self {
        self.max_document_bytes = max;
        self
    }
}
