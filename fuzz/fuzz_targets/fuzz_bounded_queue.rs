//! Fuzz target for the bounded top-N queue.
//!
//! Checks that the queue never grows past capacity and that it keeps
//! exactly the highest scores offered.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use caption_core::decode::{BoundedQueue, Scored};

#[derive(Debug, Arbitrary)]
struct Input {
    capacity: u8,
    scores: Vec<i16>,
}

struct Item(f64);

impl Scored for Item {
    fn score(&self) -> f64 {
        self.0
    }
}

fuzz_target!(|input: Input| {
    let capacity = usize::from(input.capacity % 16) + 1;
    let Ok(mut queue) = BoundedQueue::new(capacity) else {
        return;
    };
    for &s in &input.scores {
        queue.push(Item(f64::from(s)));
        assert!(queue.len() <= capacity);
    }

    let kept: Vec<f64> = queue.drain_sorted().into_iter().map(|i| i.0).collect();
    let mut expected: Vec<f64> = input.scores.iter().map(|&s| f64::from(s)).collect();
    expected.sort_by(|a, b| b.total_cmp(a));
    expected.truncate(capacity);
    assert_eq!(kept, expected);
});
