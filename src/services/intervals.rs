use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::services::schedule_utils;

/// Half-open `[start, end)` range of instants with `start < end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeInterval {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> AppResult<Self> {
        schedule_utils::ensure_window(start, end)?;
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        overlaps(self, other)
    }

    pub fn duration_minutes(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_minutes()
    }

    /// The part of `self` inside `bounds`, if any.
    pub fn clip_to(&self, bounds: &TimeInterval) -> Option<TimeInterval> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        (start < end).then_some(TimeInterval { start, end })
    }
}

pub fn overlaps(a: &TimeInterval, b: &TimeInterval) -> bool {
    a.start < b.end && b.start < a.end
}

/// Sorts by start and folds overlapping or touching ranges together.
pub fn merge_intervals(mut intervals: Vec<TimeInterval>) -> Vec<TimeInterval> {
    intervals.sort_by_key(|interval| (interval.start, interval.end));

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Free gaps of `window` not covered by `occupied`.
///
/// `occupied` must be sorted and disjoint, as returned by [`merge_intervals`].
pub fn subtract_intervals(window: &TimeInterval, occupied: &[TimeInterval]) -> Vec<TimeInterval> {
    let mut gaps = Vec::new();
    let mut cursor = window.start;

    for busy in occupied {
        if busy.end <= cursor {
            continue;
        }
        if busy.start >= window.end {
            break;
        }
        if busy.start > cursor {
            gaps.push(TimeInterval {
                start: cursor,
                end: busy.start,
            });
        }
        cursor = cursor.max(busy.end);
        if cursor >= window.end {
            break;
        }
    }

    if cursor < window.end {
        gaps.push(TimeInterval {
            start: cursor,
            end: window.end,
        });
    }

    gaps
}
