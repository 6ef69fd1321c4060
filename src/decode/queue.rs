// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity queue that keeps the highest-scoring items.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::candidate::Scored;
use super::error::DecodeError;

/// What happened to an item offered to a full or non-full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queue had room.
    Inserted,
    /// Queue was full; the previous worst item was evicted.
    Replaced,
    /// Queue was full and the item did not beat the worst one.
    Rejected,
}

/// Heap entry ordered so that the heap root is the eviction victim:
/// lowest score first, and among equal scores the latest insertion.
#[derive(Debug)]
struct Ranked<T> {
    score: f64,
    sequence: u64,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // "Greater" means "evict sooner".
        match other.score.total_cmp(&self.score) {
            Ordering::Equal => self.sequence.cmp(&other.sequence), // Later insertion = evicted first
            ord => ord,
        }
    }
}

/// Holds at most `capacity` items, silently dropping the lowest-scoring one
/// on overflow.
///
/// When the queue is full and an offered item ties the current minimum, the
/// incumbent stays and the offered item is rejected.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    heap: BinaryHeap<Ranked<T>>,
    capacity: usize,
    next_sequence: u64,
}

impl<T: Scored> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, DecodeError> {
        if capacity == 0 {
            return Err(DecodeError::InvalidConfig(
                "queue capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
            next_sequence: 0,
        })
    }

    pub fn push(&mut self, item: T) -> PushOutcome {
        let score = item.score();
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if self.heap.len() < self.capacity {
            self.heap.push(Ranked { score, sequence, item });
            return PushOutcome::Inserted;
        }

        let beats_worst = self
            .heap
            .peek()
            .map_or(true, |worst| score.total_cmp(&worst.score) == Ordering::Greater);
        if !beats_worst {
            return PushOutcome::Rejected;
        }

        self.heap.pop();
        self.heap.push(Ranked { score, sequence, item });
        PushOutcome::Replaced
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The item that would be evicted next.
    pub fn peek_worst(&self) -> Option<&T> {
        self.heap.peek().map(|r| &r.item)
    }

    /// Empty the queue, returning its items in no particular order.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .map(|r| r.item)
            .collect()
    }

    /// Empty the queue, returning items by descending score.
    /// Equal scores keep insertion order.
    pub fn drain_sorted(&mut self) -> Vec<T> {
        // Ascending in `Ranked` order is best-first.
        std::mem::take(&mut self.heap)
            .into_sorted_vec()
            .into_iter()
            .map(|r| r.item)
            .collect()
    }
}
