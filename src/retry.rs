//! Retry Queue Planner
//!
//! In-session placement for an item that was just failed. The first failure
//! comes back after a short gap; repeated failures push it further out so the
//! learner is not drilled on the same word back-to-back. Nothing here is
//! persisted.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryQueuePlanner {
    /// Items shown between the failure and the first retry
    pub base_gap: usize,
    pub max_gap: usize,
}

impl Default for RetryQueuePlanner {
    fn default() -> Self {
        Self {
            base_gap: 3,
            max_gap: 10,
        }
    }
}

impl RetryQueuePlanner {
    pub fn new(base_gap: usize, max_gap: usize) -> Self {
        let base_gap = base_gap.max(1);
        Self {
            base_gap,
            max_gap: max_gap.max(base_gap),
        }
    }

    /// Gap doubles per consecutive failure, capped at `max_gap`
    pub fn gap_for(&self, failures: u32) -> usize {
        let doublings = failures.saturating_sub(1).min(16);
        self.base_gap
            .saturating_mul(1usize << doublings)
            .min(self.max_gap)
    }

    /// Index at which to re-insert into a queue of `queue_len` items, given the
    /// position of the item currently on screen
    pub fn plan_index(&self, queue_len: usize, current_index: usize, failures: u32) -> usize {
        current_index
            .saturating_add(1)
            .saturating_add(self.gap_for(failures))
            .min(queue_len)
    }

    pub fn requeue<T>(
        &self,
        queue: &mut VecDeque<T>,
        current_index: usize,
        item: T,
        failures: u32,
    ) -> usize {
        let index = self.plan_index(queue.len(), current_index, failures);
        queue.insert(index, item);
        index
    }
}
