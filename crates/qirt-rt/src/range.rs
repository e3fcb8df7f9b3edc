//! Inclusive integer ranges and their normalized form.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RtResult, RuntimeError};

/// Range `start..step..end` with an inclusive `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: i64,
    pub step: i64,
    pub end: i64,
}

impl Range {
    pub const fn new(start: i64, step: i64, end: i64) -> Self {
        Self { start, step, end }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "{}..{}", self.start, self.end)
        } else {
            write!(f, "{}..{}..{}", self.start, self.step, self.end)
        }
    }
}

/// A [`Range`] validated against a dimension extent.
///
/// `end` is exclusive here: it is one step past the last element, so
/// walking `start, start + step, ..` until `end` visits exactly `width`
/// elements. An empty range normalizes to `{0, 1, 0, 0}`, and a range
/// with a single element always has step 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedRange {
    pub start: i64,
    pub step: i64,
    pub end: i64,
    pub width: i64,
}

impl CheckedRange {
    /// Normalize `range` for a dimension with `upper_bound` elements.
    pub fn new(range: Range, upper_bound: i64) -> RtResult<Self> {
        let Range { start, step, end } = range;
        if step == 0 {
            return Err(RuntimeError::InvalidRange(range));
        }

        if (step > 0 && end < start) || (step < 0 && start < end) {
            return Ok(Self {
                start: 0,
                step: 1,
                end: 0,
                width: 0,
            });
        }

        let out_of_bounds = || RuntimeError::RangeOutOfBounds {
            range,
            bound: upper_bound,
        };

        // Rust integer division truncates toward zero
        let span = if step > 0 {
            end.checked_sub(start).and_then(|d| d.checked_add(1))
        } else {
            end.checked_sub(start).and_then(|d| d.checked_sub(1))
        }
        .ok_or_else(out_of_bounds)?;
        let width = span
            .checked_div(step)
            .ok_or_else(out_of_bounds)?
            + i64::from(span % step != 0);

        let last = (width - 1)
            .checked_mul(step)
            .and_then(|offset| start.checked_add(offset))
            .ok_or_else(out_of_bounds)?;
        let in_bounds = if step > 0 {
            start >= 0 && last < upper_bound
        } else {
            last >= 0 && start < upper_bound
        };
        if !in_bounds {
            return Err(out_of_bounds());
        }

        if width == 1 {
            Ok(Self {
                start,
                step: 1,
                end: start + 1,
                width,
            })
        } else {
            Ok(Self {
                start,
                step,
                end: last.checked_add(step).ok_or_else(out_of_bounds)?,
                width,
            })
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// Selected positions, in order.
    pub fn indices(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.width).map(move |i| self.start + i * self.step)
    }
}
