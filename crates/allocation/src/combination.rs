//! Subset search over the releasable assignments of a unit.

use std::ops::ControlFlow;

use rust_decimal::Decimal;

use stockflow_core::{Quantity, StockAssignmentId, ValueObject};

/// A set of assignments whose releasable quantities together approach a
/// target quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentCombination {
    entries: Vec<(StockAssignmentId, Quantity)>,
    sum: Quantity,
    /// `sum - target`; negative when the combination falls short.
    diff: Quantity,
}

impl AssignmentCombination {
    pub fn new(entries: Vec<(StockAssignmentId, Quantity)>, target: Quantity) -> Self {
        let sum = entries.iter().map(|(_, q)| *q).sum::<Decimal>();
        Self {
            entries,
            sum,
            diff: sum - target,
        }
    }

    pub fn entries(&self) -> &[(StockAssignmentId, Quantity)] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = StockAssignmentId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn sum(&self) -> Quantity {
        self.sum
    }

    pub fn diff(&self) -> Quantity {
        self.diff
    }

    pub fn is_exact(&self) -> bool {
        self.diff.is_zero()
    }

    /// Closer to the target wins; on a tie, covering the target beats
    /// falling short.
    pub fn is_better_than(&self, other: &AssignmentCombination) -> bool {
        let (mine, theirs) = (self.diff.abs(), other.diff.abs());
        mine < theirs
            || (mine == theirs && self.diff >= Decimal::ZERO && other.diff < Decimal::ZERO)
    }
}

impl ValueObject for AssignmentCombination {}

/// Find the combination of `releasable` entries closest to `target`.
///
/// Only the first `cap` entries take part; callers pass them sorted by
/// descending quantity so that the largest assignments are the ones kept.
/// Subsets are visited by size (singletons first, the full set last) and in
/// index order within a size; the first exact match ends the search, and
/// among equally good results the first one visited is kept.
pub fn search(
    releasable: &[(StockAssignmentId, Quantity)],
    target: Quantity,
    cap: usize,
) -> Option<AssignmentCombination> {
    if target <= Decimal::ZERO {
        return None;
    }
    let pool: Vec<_> = releasable
        .iter()
        .filter(|(_, q)| *q > Decimal::ZERO)
        .take(cap)
        .copied()
        .collect();
    let n = pool.len();
    let mut best: Option<AssignmentCombination> = None;

    for size in 1..=n {
        let flow = for_each_subset(n, size, |indices| {
            let candidate =
                AssignmentCombination::new(indices.iter().map(|&i| pool[i]).collect(), target);
            let exact = candidate.is_exact();
            if best.as_ref().is_none_or(|b| candidate.is_better_than(b)) {
                best = Some(candidate);
            }
            if exact {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        if flow.is_break() {
            break;
        }
    }
    best
}

/// Visit every `k`-subset of `0..n` in lexicographic order.
fn for_each_subset(
    n: usize,
    k: usize,
    mut visit: impl FnMut(&[usize]) -> ControlFlow<()>,
) -> ControlFlow<()> {
    if k == 0 || k > n {
        return ControlFlow::Continue(());
    }
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        visit(&indices)?;

        let mut i = k;
        while i > 0 && indices[i - 1] == n - k + i - 1 {
            i -= 1;
        }
        if i == 0 {
            return ControlFlow::Continue(());
        }
        indices[i - 1] += 1;
        for j in i..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}
