//! Differ
//!
//! Correlates the nodes of two indexed trees by path key and reports what
//! was added, removed or changed. Both trees keep their nodes sorted by key,
//! so the comparison is a single merge over the two sorted sequences and the
//! output comes out in total path-key order. Reordered siblings that carry
//! names are matched by name, not by position.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::index::{IndexedTree, PathKey};

/// Classification of a difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DifferenceKind {
    Added,
    Removed,
    Changed,
}

impl fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DifferenceKind::Added => "Added",
            DifferenceKind::Removed => "Removed",
            DifferenceKind::Changed => "Changed",
        };
        f.write_str(label)
    }
}

/// One change between two trees at a given path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    pub path: PathKey,
    pub kind: DifferenceKind,
    pub left_value: Option<String>,
    pub right_value: Option<String>,
}

impl Difference {
    fn added(path: &PathKey, value: Option<String>) -> Self {
        Self {
            path: path.clone(),
            kind: DifferenceKind::Added,
            left_value: None,
            right_value: value,
        }
    }

    fn removed(path: &PathKey, value: Option<String>) -> Self {
        Self {
            path: path.clone(),
            kind: DifferenceKind::Removed,
            left_value: value,
            right_value: None,
        }
    }
}

/// Compare two indexed trees.
///
/// Never fails: every mismatch becomes a [`Difference`]. Output is sorted by
/// path key, so diffing the same pair twice gives identical lists. Roots
/// with different tags share the empty key and are reported as a single
/// change carrying the two tags.
pub fn diff(left: &IndexedTree, right: &IndexedTree) -> Vec<Difference> {
    let mut differences = Vec::new();
    let mut lhs = left.iter_sorted().peekable();
    let mut rhs = right.iter_sorted().peekable();

    loop {
        let order = match (lhs.peek(), rhs.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((l, _)), Some((r, _))) => l.cmp(r),
        };

        match order {
            Ordering::Less => {
                if let Some((path, element)) = lhs.next() {
                    differences.push(Difference::removed(path, element.comparison_value()));
                }
            }
            Ordering::Greater => {
                if let Some((path, element)) = rhs.next() {
                    differences.push(Difference::added(path, element.comparison_value()));
                }
            }
            Ordering::Equal => {
                if let (Some((path, l)), Some((_, r))) = (lhs.next(), rhs.next()) {
                    // Only the roots can share a key without sharing a tag
                    let (left_value, right_value) = if l.tag() != r.tag() {
                        (Some(l.tag().to_string()), Some(r.tag().to_string()))
                    } else {
                        (l.comparison_value(), r.comparison_value())
                    };
                    if left_value != right_value {
                        differences.push(Difference {
                            path: path.clone(),
                            kind: DifferenceKind::Changed,
                            left_value,
                            right_value,
                        });
                    }
                }
            }
        }
    }

    tracing::debug!(
        left = left.len(),
        right = right.len(),
        differences = differences.len(),
        "compared trees"
    );
    differences
}

/// Per-kind counts of a difference list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

impl DiffSummary {
    pub fn from_differences(differences: &[Difference]) -> Self {
        differences
            .iter()
            .fold(Self::default(), |mut summary, difference| {
                match difference.kind {
                    DifferenceKind::Added => summary.added += 1,
                    DifferenceKind::Removed => summary.removed += 1,
                    DifferenceKind::Changed => summary.changed += 1,
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.added + self.removed + self.changed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
