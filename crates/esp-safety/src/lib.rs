//! ESP Safety Layer
//!
//! Enforces that an edit is structurally and semantically non-destructive.
//!
//! # Stages
//!
//! - **Pre-enhancement**: document is readable and well-formed, and no two
//!   recommendations conflict ([`PreCheckError`] blocks the whole run)
//! - **Per-edit**: four sub-scores for one candidate span
//!   ([`EditValidationResult`])
//! - **Post-enhancement**: whole-document re-verification
//!   ([`PostEnhancementReport`]) feeding the weighted [`SafetyScore`]
//!
//! ```text
//! overall = keyword*0.35 + structure*0.25 + content*0.25 + technical*0.15
//!           - Σ severity penalties
//! safe    = overall > 0.8 && no critical violations
//! ```

#![allow(missing_docs)]
#![warn(unreachable_pub)]

mod checks;
mod edit;
mod error;
mod post;
mod precheck;
mod rules;
mod score;
mod validator;
mod violation;

pub use edit::EditValidationResult;
pub use error::PreCheckError;
pub use post::PostEnhancementReport;
pub use precheck::{PreCheckReport, ResolvedTarget};
pub use rules::{PreservationRules, StructureElement, ValidationConfig};
pub use score::{
    SafetyScore, CONTENT_WEIGHT, KEYWORD_WEIGHT, SAFE_THRESHOLD, STRUCTURE_WEIGHT, TECHNICAL_WEIGHT,
};
pub use validator::EditValidator;
pub use violation::{Severity, Violation, ViolationRule};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
