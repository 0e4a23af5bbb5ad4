//! Paired original/enhanced rows

use crate::myers::DiffOp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTag {
    Added,
    Removed,
    /// Removed line paired with an added line
    Modified,
    Unchanged,
}

/// One row of a side-by-side view
///
/// Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideBySideRow {
    pub tag: ChangeTag,
    pub old_line_no: Option<usize>,
    pub old_text: Option<String>,
    pub new_line_no: Option<usize>,
    pub new_text: Option<String>,
}

impl SideBySideRow {
    fn old_only(tag: ChangeTag, idx: usize, old: &[&str]) -> Self {
        Self {
            tag,
            old_line_no: Some(idx + 1),
            old_text: Some(old[idx].to_string()),
            new_line_no: None,
            new_text: None,
        }
    }

    fn new_only(idx: usize, new: &[&str]) -> Self {
        Self {
            tag: ChangeTag::Added,
            old_line_no: None,
            old_text: None,
            new_line_no: Some(idx + 1),
            new_text: Some(new[idx].to_string()),
        }
    }

    fn paired(tag: ChangeTag, o: usize, n: usize, old: &[&str], new: &[&str]) -> Self {
        Self {
            tag,
            old_line_no: Some(o + 1),
            old_text: Some(old[o].to_string()),
            new_line_no: Some(n + 1),
            new_text: Some(new[n].to_string()),
        }
    }
}

pub(crate) fn build(ops: &[DiffOp], old: &[&str], new: &[&str]) -> Vec<SideBySideRow> {
    let mut rows = Vec::with_capacity(ops.len());
    let mut deleted = Vec::new();
    let mut inserted = Vec::new();

    let flush = |rows: &mut Vec<SideBySideRow>, deleted: &mut Vec<usize>, inserted: &mut Vec<usize>| {
        let paired = deleted.len().min(inserted.len());
        for (&o, &n) in deleted.iter().zip(inserted.iter()) {
            rows.push(SideBySideRow::paired(ChangeTag::Modified, o, n, old, new));
        }
        rows.extend(deleted[paired..].iter().map(|&o| SideBySideRow::old_only(ChangeTag::Removed, o, old)));
        rows.extend(inserted[paired..].iter().map(|&n| SideBySideRow::new_only(n, new)));
        deleted.clear();
        inserted.clear();
    };

    for op in ops {
        match *op {
            DiffOp::Equal { old: o, new: n } => {
                flush(&mut rows, &mut deleted, &mut inserted);
                rows.push(SideBySideRow::paired(ChangeTag::Unchanged, o, n, old, new));
            }
            DiffOp::Delete { old: o } => deleted.push(o),
            DiffOp::Insert { new: n } => inserted.push(n),
        }
    }
    flush(&mut rows, &mut deleted, &mut inserted);
    rows
}
