//! Interval-graph coloring.
//!
//! The least number of colors such that no two overlapping intervals share
//! one equals the largest number of intervals crossing any single point.
//! Sweeping the intervals by start point and keeping the ones still open
//! at the sweep point, ordered by end, finds that maximum.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Closed interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }
}

/// Minimum number of colors for `intervals`, where intervals that share a
/// point (endpoints included) need different colors.
pub fn min_coloring_size(intervals: &[Interval]) -> usize {
    let mut by_start = intervals.to_vec();
    by_start.sort_by_key(|interval| interval.start);

    // Ends of the intervals open at the sweep point, earliest on top.
    let mut open: BinaryHeap<Reverse<u64>> = BinaryHeap::new();
    let mut colors = 0;
    let mut next = 0;
    while let Some(first) = by_start.get(next) {
        let point = first.start;
        while open.peek().is_some_and(|&Reverse(end)| end < point) {
            open.pop();
        }
        while let Some(interval) = by_start.get(next).filter(|i| i.start == point) {
            open.push(Reverse(interval.end));
            next += 1;
        }
        colors = colors.max(open.len());
    }
    colors
}
