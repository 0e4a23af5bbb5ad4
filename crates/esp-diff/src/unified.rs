//! Patch-style unified diff

use crate::myers::DiffOp;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A line inside a hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum HunkLine {
    Context(String),
    Added(String),
    Removed(String),
}

impl HunkLine {
    fn prefix(&self) -> char {
        match self {
            Self::Context(_) => ' ',
            Self::Added(_) => '+',
            Self::Removed(_) => '-',
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Context(t) | Self::Added(t) | Self::Removed(t) => t,
        }
    }
}

/// Contiguous block of changes with surrounding context
///
/// Starts are 1-based line numbers; an empty side uses the line before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// `@@ -a,b +c,d @@` header
    #[must_use]
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_len, self.new_start, self.new_len
        )
    }
}

/// Unified diff of two documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedDiff {
    pub old_label: String,
    pub new_label: String,
    pub hunks: Vec<Hunk>,
}

impl UnifiedDiff {
    pub(crate) fn build(
        label: &str,
        ops: &[DiffOp],
        old: &[&str],
        new: &[&str],
        context: usize,
    ) -> Self {
        Self {
            old_label: format!("a/{label}"),
            new_label: format!("b/{label}"),
            hunks: group_hunks(ops, old, new, context),
        }
    }

    /// No changes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Render as patch text; empty string when there are no changes
    #[must_use]
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        let _ = writeln!(out, "--- {}", self.old_label);
        let _ = writeln!(out, "+++ {}", self.new_label);
        for hunk in &self.hunks {
            let _ = writeln!(out, "{}", hunk.header());
            for line in &hunk.lines {
                let _ = writeln!(out, "{}{}", line.prefix(), line.text());
            }
        }
        out
    }
}

fn group_hunks(ops: &[DiffOp], old: &[&str], new: &[&str], context: usize) -> Vec<Hunk> {
    // lines consumed on each side before op i
    let mut positions = Vec::with_capacity(ops.len() + 1);
    let (mut o, mut n) = (0, 0);
    for op in ops {
        positions.push((o, n));
        match op {
            DiffOp::Equal { .. } => {
                o += 1;
                n += 1;
            }
            DiffOp::Delete { .. } => o += 1,
            DiffOp::Insert { .. } => n += 1,
        }
    }

    let mut hunks = Vec::new();
    let mut emitted = 0;
    let mut i = 0;
    while i < ops.len() {
        if ops[i].is_equal() {
            i += 1;
            continue;
        }

        let start = i.saturating_sub(context).max(emitted);
        let mut end = i;
        loop {
            while end < ops.len() && !ops[end].is_equal() {
                end += 1;
            }
            let mut next = end;
            while next < ops.len() && ops[next].is_equal() {
                next += 1;
            }
            if next < ops.len() && next - end <= 2 * context {
                end = next;
            } else {
                break;
            }
        }
        let stop = (end + context).min(ops.len());

        let slice = &ops[start..stop];
        let (old_pos, new_pos) = positions[start];
        let lines: Vec<HunkLine> = slice
            .iter()
            .map(|op| match *op {
                DiffOp::Equal { old: idx, .. } => HunkLine::Context(old[idx].to_string()),
                DiffOp::Delete { old: idx } => HunkLine::Removed(old[idx].to_string()),
                DiffOp::Insert { new: idx } => HunkLine::Added(new[idx].to_string()),
            })
            .collect();
        let old_len = lines.iter().filter(|l| !matches!(l, HunkLine::Added(_))).count();
        let new_len = lines.iter().filter(|l| !matches!(l, HunkLine::Removed(_))).count();

        hunks.push(Hunk {
            old_start: if old_len == 0 { old_pos } else { old_pos + 1 },
            old_len,
            new_start: if new_len == 0 { new_pos } else { new_pos + 1 },
            new_len,
            lines,
        });

        emitted = stop;
        i = stop;
    }
    hunks
}
