//! Bounded FIFO history used for metric values, scores and worker performance.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity ring buffer. Pushing onto a full buffer evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    capacity: usize,
    values: VecDeque<f64>,
}

impl History {
    /// Create an empty history holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one so the latest value is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a value, evicting the oldest one when full.
    pub fn push(&mut self, value: f64) {
        while self.values.len() >= self.capacity.max(1) {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Whether the entries fit in a non-zero capacity.
    pub fn is_bounded(&self) -> bool {
        self.capacity >= 1 && self.values.len() <= self.capacity
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent value.
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = f64> + ExactSizeIterator + '_ {
        self.values.iter().copied()
    }

    /// The last `n` entries, oldest first (fewer if the history is shorter).
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(n);
        self.values.iter().skip(skip).copied().collect()
    }

    /// Mean of the last `n` entries.
    pub fn recent_mean(&self, n: usize) -> Option<f64> {
        let tail = self.tail(n);
        if tail.is_empty() {
            return None;
        }
        Some(tail.iter().sum::<f64>() / tail.len() as f64)
    }

    /// `max - min` of the last `n` entries.
    pub fn spread(&self, n: usize) -> Option<f64> {
        let tail = self.tail(n);
        if tail.is_empty() {
            return None;
        }
        let (min, max) = tail
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        Some(max - min)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}
