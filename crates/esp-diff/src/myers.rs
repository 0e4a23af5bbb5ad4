//! Shortest edit script over lines (Myers, O((N+M)D) time, linear space)

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One step of an edit script
///
/// Indices are 0-based positions in the old and new line sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffOp {
    /// Line kept
    Equal { old: usize, new: usize },
    /// Old line removed
    Delete { old: usize },
    /// New line inserted
    Insert { new: usize },
}

impl DiffOp {
    #[inline]
    #[must_use]
    pub const fn is_equal(&self) -> bool {
        matches!(self, Self::Equal { .. })
    }
}

/// Compute an edit script turning `old` into `new`
///
/// Linear-space divide and conquer: each step finds the middle snake of
/// the remaining problem and recurses on both halves. Deletions are
/// ordered before insertions within a change block.
#[must_use]
pub fn diff<T: PartialEq>(old: &[T], new: &[T]) -> Vec<DiffOp> {
    let max_d = (old.len() + new.len() + 1) / 2 + 1;
    let mut forward = Diagonals::new(max_d);
    let mut backward = Diagonals::new(max_d);
    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    conquer(old, 0..old.len(), new, 0..new.len(), &mut forward, &mut backward, &mut ops);
    normalize_blocks(ops)
}

/// Furthest x per diagonal, indexed by signed diagonal k = x - y
struct Diagonals {
    offset: isize,
    v: Vec<isize>,
}

impl Diagonals {
    #[allow(clippy::cast_possible_wrap)]
    fn new(max_d: usize) -> Self {
        Self {
            offset: max_d as isize,
            v: vec![0; 2 * max_d + 1],
        }
    }
}

impl std::ops::Index<isize> for Diagonals {
    type Output = isize;

    #[allow(clippy::cast_sign_loss)]
    fn index(&self, k: isize) -> &isize {
        &self.v[(k + self.offset) as usize]
    }
}

impl std::ops::IndexMut<isize> for Diagonals {
    #[allow(clippy::cast_sign_loss)]
    fn index_mut(&mut self, k: isize) -> &mut isize {
        &mut self.v[(k + self.offset) as usize]
    }
}

fn common_prefix<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().rev().zip(b.iter().rev()).take_while(|(x, y)| x == y).count()
}

fn conquer<T: PartialEq>(
    old: &[T],
    mut old_range: Range<usize>,
    new: &[T],
    mut new_range: Range<usize>,
    forward: &mut Diagonals,
    backward: &mut Diagonals,
    ops: &mut Vec<DiffOp>,
) {
    let prefix = common_prefix(&old[old_range.clone()], &new[new_range.clone()]);
    ops.extend((0..prefix).map(|i| DiffOp::Equal {
        old: old_range.start + i,
        new: new_range.start + i,
    }));
    old_range.start += prefix;
    new_range.start += prefix;

    let suffix = common_suffix(&old[old_range.clone()], &new[new_range.clone()]);
    old_range.end -= suffix;
    new_range.end -= suffix;

    if old_range.is_empty() {
        ops.extend(new_range.clone().map(|new| DiffOp::Insert { new }));
    } else if new_range.is_empty() {
        ops.extend(old_range.clone().map(|old| DiffOp::Delete { old }));
    } else if let Some((x, y)) = middle_snake(old, old_range.clone(), new, new_range.clone(), forward, backward) {
        conquer(old, old_range.start..x, new, new_range.start..y, forward, backward, ops);
        conquer(old, x..old_range.end, new, y..new_range.end, forward, backward, ops);
    } else {
        ops.extend(old_range.clone().map(|old| DiffOp::Delete { old }));
        ops.extend(new_range.clone().map(|new| DiffOp::Insert { new }));
    }

    ops.extend((0..suffix).map(|i| DiffOp::Equal {
        old: old_range.end + i,
        new: new_range.end + i,
    }));
}

/// Split point on an optimal path, found by searching from both ends
///
/// Both ranges must be non-empty with no common prefix or suffix.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn middle_snake<T: PartialEq>(
    old: &[T],
    old_range: Range<usize>,
    new: &[T],
    new_range: Range<usize>,
    forward: &mut Diagonals,
    backward: &mut Diagonals,
) -> Option<(usize, usize)> {
    let n = old_range.len() as isize;
    let m = new_range.len() as isize;
    let delta = n - m;
    let odd = delta & 1 == 1;
    let max_d = (n + m + 1) / 2 + 1;
    forward[1] = 0;
    backward[1] = 0;

    for d in 0..max_d {
        for k in (-d..=d).rev().step_by(2) {
            let mut x = if k == -d || (k != d && forward[k - 1] < forward[k + 1]) {
                forward[k + 1]
            } else {
                forward[k - 1] + 1
            };
            let y = x - k;
            let (x0, y0) = (x, y);
            if x < n && y < m {
                x += common_prefix(
                    &old[old_range.start + x as usize..old_range.end],
                    &new[new_range.start + y as usize..new_range.end],
                ) as isize;
            }
            forward[k] = x;
            if odd && (k - delta).abs() < d && forward[k] + backward[-(k - delta)] >= n {
                return Some((old_range.start + x0 as usize, new_range.start + y0 as usize));
            }
        }

        for k in (-d..=d).rev().step_by(2) {
            let mut x = if k == -d || (k != d && backward[k - 1] < backward[k + 1]) {
                backward[k + 1]
            } else {
                backward[k - 1] + 1
            };
            let mut y = x - k;
            if x < n && y < m {
                let run = common_suffix(
                    &old[old_range.start..old_range.start + (n - x) as usize],
                    &new[new_range.start..new_range.start + (m - y) as usize],
                ) as isize;
                x += run;
                y += run;
            }
            backward[k] = x;
            if !odd && (k - delta).abs() <= d && backward[k] + forward[-(k - delta)] >= n {
                return Some((
                    old_range.start + (n - x) as usize,
                    new_range.start + (m - y) as usize,
                ));
            }
        }
    }
    None
}

/// Reorder each run of non-equal ops so deletions precede insertions
fn normalize_blocks(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    let mut out = Vec::with_capacity(ops.len());
    let mut inserts = Vec::new();
    for op in ops {
        match op {
            DiffOp::Equal { .. } => {
                out.append(&mut inserts);
                out.push(op);
            }
            DiffOp::Delete { .. } => out.push(op),
            DiffOp::Insert { .. } => inserts.push(op),
        }
    }
    out.append(&mut inserts);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn apply<'a>(ops: &[DiffOp], old: &[&'a str], new: &[&'a str]) -> Vec<&'a str> {
        ops.iter()
            .filter_map(|op| match *op {
                DiffOp::Equal { old: i, .. } => Some(old[i]),
                DiffOp::Insert { new: j } => Some(new[j]),
                DiffOp::Delete { .. } => None,
            })
            .collect()
    }

    fn edit_count(ops: &[DiffOp]) -> usize {
        ops.iter().filter(|op| !op.is_equal()).count()
    }

    #[test]
    fn identical_has_no_edits() {
        let lines = ["a", "b", "c"];
        let ops = diff(&lines, &lines);
        assert_eq!(edit_count(&ops), 0);
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn single_replacement() {
        let ops = diff(&["a", "b", "c"], &["a", "x", "c"]);
        assert_eq!(
            ops,
            vec![
                DiffOp::Equal { old: 0, new: 0 },
                DiffOp::Delete { old: 1 },
                DiffOp::Insert { new: 1 },
                DiffOp::Equal { old: 2, new: 2 },
            ]
        );
    }

    #[test]
    fn empty_sides() {
        assert_eq!(edit_count(&diff::<&str>(&[], &["a", "b"])), 2);
        assert_eq!(edit_count(&diff::<&str>(&["a"], &[])), 1);
        assert!(diff::<&str>(&[], &[]).is_empty());
    }

    #[test]
    fn minimal_on_classic_example() {
        // ABCABBA -> CBABAC has edit distance 5
        let a: Vec<char> = "ABCABBA".chars().collect();
        let b: Vec<char> = "CBABAC".chars().collect();
        assert_eq!(edit_count(&diff(&a, &b)), 5);
    }

    fn lcs_len(a: &[&str], b: &[&str]) -> usize {
        let mut row = vec![0usize; b.len() + 1];
        for x in a {
            let mut diag = 0;
            for (j, y) in b.iter().enumerate() {
                let above = row[j + 1];
                row[j + 1] = if x == y { diag + 1 } else { above.max(row[j]) };
                diag = above;
            }
        }
        row[b.len()]
    }

    #[test]
    fn full_rewrite_of_large_section() {
        let old: Vec<String> = (0..3000).map(|i| format!("old line {i}")).collect();
        let new: Vec<String> = (0..2500).map(|i| format!("new line {i}")).collect();
        let ops = diff(&old, &new);
        assert_eq!(edit_count(&ops), 5500);
        assert!(ops[..3000].iter().all(|op| matches!(op, DiffOp::Delete { .. })));
    }

    #[test]
    fn scattered_edits_in_long_input() {
        let old: Vec<String> = (0..4000).map(|i| format!("line {i}")).collect();
        let new: Vec<String> = old
            .iter()
            .enumerate()
            .map(|(i, l)| if i % 100 == 7 { format!("{l} changed") } else { l.clone() })
            .collect();
        let ops = diff(&old, &new);
        assert_eq!(edit_count(&ops), 80);
        assert_eq!(ops.iter().filter(|op| op.is_equal()).count(), 3960);
    }

    proptest! {
        #[test]
        fn script_is_minimal(
            old in proptest::collection::vec("[abc]", 0..24),
            new in proptest::collection::vec("[abc]", 0..24),
        ) {
            let old: Vec<&str> = old.iter().map(String::as_str).collect();
            let new: Vec<&str> = new.iter().map(String::as_str).collect();
            let expected = old.len() + new.len() - 2 * lcs_len(&old, &new);
            prop_assert_eq!(edit_count(&diff(&old, &new)), expected);
        }

        #[test]
        fn script_reconstructs_new(
            old in proptest::collection::vec("[abc]", 0..24),
            new in proptest::collection::vec("[abc]", 0..24),
        ) {
            let old: Vec<&str> = old.iter().map(String::as_str).collect();
            let new: Vec<&str> = new.iter().map(String::as_str).collect();
            let ops = diff(&old, &new);
            prop_assert_eq!(apply(&ops, &old, &new), new.clone());

            let kept_old: Vec<usize> = ops.iter().filter_map(|op| match *op {
                DiffOp::Equal { old, .. } | DiffOp::Delete { old } => Some(old),
                DiffOp::Insert { .. } => None,
            }).collect();
            prop_assert_eq!(kept_old, (0..old.len()).collect::<Vec<_>>());
        }
    }
}
