//! Aggregate change statistics

use crate::side_by_side::{ChangeTag, SideBySideRow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DiffStats {
    pub lines_added: usize,
    pub lines_removed: usize,
    pub lines_modified: usize,
    /// Changed rows over the longer side's line count, 0.0 - 100.0
    pub change_percentage: f64,
}

impl DiffStats {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn from_rows(rows: &[SideBySideRow], old_lines: usize, new_lines: usize) -> Self {
        let count = |tag: ChangeTag| rows.iter().filter(|r| r.tag == tag).count();
        let lines_added = count(ChangeTag::Added);
        let lines_removed = count(ChangeTag::Removed);
        let lines_modified = count(ChangeTag::Modified);

        let changed = (lines_added + lines_removed + lines_modified) as f64;
        let total = old_lines.max(new_lines).max(1) as f64;

        Self {
            lines_added,
            lines_removed,
            lines_modified,
            change_percentage: (changed / total * 100.0).min(100.0),
        }
    }

    /// Total changed rows
    #[inline]
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.lines_added + self.lines_removed + self.lines_modified
    }

    /// No changes
    #[inline]
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.total_changes() == 0
    }
}
