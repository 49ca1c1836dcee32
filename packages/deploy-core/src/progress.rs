//! Position tracking for one deployment run.
//!
//! [`MigrationProgress`] is an immutable value: every step produces a new
//! instance, which keeps the engine loop trivial to reason about and to test.
//! The invariant throughout a run is that `applied_steps ++ pending_steps`
//! is a permutation-free split of the original step sequence, and
//! `is_rolling_back`, once set, never reverts within a run.

use crate::migration::MigrationStep;

/// Immutable snapshot of applied and pending steps during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationProgress {
    pub applied_steps: Vec<MigrationStep>,
    pub pending_steps: Vec<MigrationStep>,
    pub is_rolling_back: bool,
}

impl MigrationProgress {
    /// Start-of-run progress: nothing applied, everything pending.
    pub fn new(steps: Vec<MigrationStep>) -> Self {
        Self {
            applied_steps: Vec::new(),
            pending_steps: steps,
            is_rolling_back: false,
        }
    }

    /// Remove the head of `pending_steps` and append it to `applied_steps`.
    ///
    /// Returns `None` when nothing is pending.
    pub fn pop_pending(&self) -> Option<(MigrationStep, MigrationProgress)> {
        let (head, tail) = self.pending_steps.split_first()?;
        let mut next = self.clone();
        next.applied_steps.push(head.clone());
        next.pending_steps = tail.to_vec();
        Some((head.clone(), next))
    }

    /// Remove the last of `applied_steps`; the removed step is the next to be
    /// reversed. `pending_steps` is unchanged.
    ///
    /// Returns `None` when nothing is applied.
    pub fn pop_applied(&self) -> Option<(MigrationStep, MigrationProgress)> {
        let (last, init) = self.applied_steps.split_last()?;
        let mut next = self.clone();
        next.applied_steps = init.to_vec();
        Some((last.clone(), next))
    }

    /// Flip into rollback mode. Monotonic within a run.
    pub fn mark_for_rollback(&self) -> MigrationProgress {
        let mut next = self.clone();
        next.is_rolling_back = true;
        next
    }
}
