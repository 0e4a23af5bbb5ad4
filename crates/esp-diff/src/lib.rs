//! ESP Diff
//!
//! Line-based diff of an original document against its enhanced candidate.
//! Pure functions, no side effects.
//!
//! ```rust,ignore
//! let diff = DiffGenerator::new().generate("guide.md", original, enhanced);
//! println!("{}", diff.unified.render());
//! assert_eq!(diff.stats.lines_modified, 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod myers;
mod side_by_side;
mod stats;
mod unified;

pub use myers::{diff, DiffOp};
pub use side_by_side::{ChangeTag, SideBySideRow};
pub use stats::DiffStats;
pub use unified::{Hunk, HunkLine, UnifiedDiff};

use serde::{Deserialize, Serialize};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lines of context around each hunk
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Complete change set between two documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDiff {
    pub unified: UnifiedDiff,
    pub side_by_side: Vec<SideBySideRow>,
    pub stats: DiffStats,
}

/// Builds [`DocumentDiff`]s
#[derive(Debug, Clone, Copy)]
pub struct DiffGenerator {
    context_lines: usize,
}

impl Default for DiffGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffGenerator {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_context_lines(context_lines: usize) -> Self {
        Self { context_lines }
    }

    /// Diff `original` against `enhanced`, labelling the unified output with `label`
    #[must_use]
    pub fn generate(&self, label: &str, original: &str, enhanced: &str) -> DocumentDiff {
        let old: Vec<&str> = original.lines().collect();
        let new: Vec<&str> = enhanced.lines().collect();
        let ops = diff(&old, &new);

        let side_by_side = side_by_side::build(&ops, &old, &new);
        let stats = DiffStats::from_rows(&side_by_side, old.len(), new.len());

        DocumentDiff {
            unified: UnifiedDiff::build(label, &ops, &old, &new, self.context_lines),
            side_by_side,
            stats,
        }
    }
}
