//! ESP Document Layer
//!
//! Immutable, content-addressed document snapshots and the tools needed to
//! point a recommendation at a region of one.
//!
//! # Core Concepts
//!
//! - [`Document`]: UTF-8 content plus its [`ContentHash`] (Blake3)
//! - [`DocumentStructure`]: front matter and markdown element inventory
//! - [`Recommendation`]: a pre-classified edit instruction
//! - [`TargetLocator`]: a textual description of where an edit applies
//! - [`ContextExtractor`]: resolves a locator against a document at apply time
//!
//! # Example
//!
//! ```rust,ignore
//! use esp_document::{ContextExtractor, Document, TargetLocator};
//!
//! let doc = Document::new("# Intro\n\nThe plugin loads XLSX files.\n");
//! let ctx = ContextExtractor::new()
//!     .extract(&doc, &TargetLocator::section("Intro"))?;
//! assert!(ctx.text.contains("XLSX"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod context;
mod document;
mod error;
mod hash;
mod recommendation;
mod structure;

pub use context::{ContextExtractor, ContextKind, ExtractedContext, TargetLocator};
pub use document::{Document, DocumentRef};
pub use error::{ContextError, DocumentError, HashError};
pub use hash::ContentHash;
pub use recommendation::{Recommendation, RecommendationCategory, RecommendationId};
pub use structure::{
    prose_text, CodeBlockInfo, DocumentStructure, FrontMatter, FrontMatterState, Heading, Paragraph,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
