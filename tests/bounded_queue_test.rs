//! Bounded top-N queue tests.

use caption_core::decode::{BoundedQueue, PushOutcome, Scored};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    id: usize,
    score: f64,
}

impl Scored for Entry {
    fn score(&self) -> f64 {
        self.score
    }
}

fn entry(id: usize, score: f64) -> Entry {
    Entry { id, score }
}

// =============================================================================
// Capacity
// =============================================================================

#[test]
fn zero_capacity_is_rejected() {
    let err = BoundedQueue::<Entry>::new(0).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn never_exceeds_capacity() {
    let mut rng = StdRng::seed_from_u64(42);
    for capacity in 1..8 {
        let mut queue = BoundedQueue::new(capacity).unwrap();
        for id in 0..200 {
            queue.push(entry(id, rng.gen_range(-50.0..0.0)));
            assert!(queue.len() <= capacity);
        }
        assert_eq!(queue.len(), capacity);
    }
}

// =============================================================================
// Retention
// =============================================================================

#[test]
fn keeps_the_top_scores() {
    let mut rng = StdRng::seed_from_u64(1234);
    for _ in 0..100 {
        let capacity = rng.gen_range(1..10);
        let count = rng.gen_range(0..60);
        let entries: Vec<Entry> = (0..count)
            .map(|id| entry(id, f64::from(rng.gen_range(-20_i32..0))))
            .collect();

        let mut queue = BoundedQueue::new(capacity).unwrap();
        for e in entries.iter().cloned() {
            queue.push(e);
        }
        let kept: Vec<f64> = queue.drain_sorted().iter().map(|e| e.score).collect();

        let mut expected: Vec<f64> = entries.iter().map(|e| e.score).collect();
        expected.sort_by(|a, b| b.total_cmp(a));
        expected.truncate(capacity);
        assert_eq!(kept, expected);
    }
}

#[test]
fn equal_to_minimum_is_rejected_when_full() {
    let mut queue = BoundedQueue::new(2).unwrap();
    queue.push(entry(0, -1.0));
    queue.push(entry(1, -2.0));

    assert_eq!(queue.push(entry(2, -2.0)), PushOutcome::Rejected);
    let ids: Vec<usize> = queue.drain_sorted().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn latest_of_tied_minimum_is_evicted_first() {
    let mut queue = BoundedQueue::new(3).unwrap();
    queue.push(entry(0, -3.0));
    queue.push(entry(1, -3.0));
    queue.push(entry(2, -1.0));

    assert_eq!(queue.peek_worst().map(|e| e.id), Some(1));
    assert_eq!(queue.push(entry(3, -2.0)), PushOutcome::Replaced);
    let ids: Vec<usize> = queue.drain_sorted().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![2, 3, 0]);
}

// =============================================================================
// Draining
// =============================================================================

#[test]
fn drain_sorted_keeps_insertion_order_for_ties() {
    let mut queue = BoundedQueue::new(4).unwrap();
    for id in 0..4 {
        queue.push(entry(id, -1.0));
    }
    let ids: Vec<usize> = queue.drain_sorted().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

#[test]
fn drain_empties_and_allows_reuse() {
    let mut queue = BoundedQueue::new(2).unwrap();
    queue.push(entry(0, -1.0));
    queue.push(entry(1, -0.5));

    let mut drained: Vec<usize> = queue.drain().into_iter().map(|e| e.id).collect();
    drained.sort_unstable();
    assert_eq!(drained, vec![0, 1]);
    assert!(queue.is_empty());
    assert_eq!(queue.capacity(), 2);

    assert_eq!(queue.push(entry(2, -9.0)), PushOutcome::Inserted);
    assert_eq!(queue.len(), 1);
}
