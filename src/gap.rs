//! Lost-message estimation from wrapping frame counters.
//!
//! Sensor firmware stamps every transmitted frame with a small cyclic
//! counter. Within one `(sensor, gateway[, mesh gateway], calendar day)`
//! group, readings are ordered by timestamp and the counter sequence is
//! folded through [`advance`]; every discontinuity is turned into an
//! estimate of frames that never arrived.
//!
//! Daily totals are then summed into the requested resampling buckets.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::frequency::Frequency;
use crate::models::{GroupKey, Reading};

/// Frame counters are unsigned and at most 32 bits wide on the air.
const COUNTER_LIMIT: i64 = u32::MAX as i64;

// ---

/// Inclusive range of values the frame counter cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRange {
    pub min: i64,
    pub max: i64,
}

impl Default for CounterRange {
    fn default() -> Self {
        Self { min: 0, max: 4 }
    }
}

impl CounterRange {
    pub fn new(min: i64, max: i64) -> Result<Self> {
        // ---
        if min < 0 || min > max || max > COUNTER_LIMIT {
            return Err(PipelineError::InvalidCounterRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Classification of one step between consecutive counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `current == previous + 1`.
    Forward,
    /// `current > previous + 1`; the skipped values were lost.
    Gap { lost: u64 },
    /// `current < previous`; the counter cycled.
    ///
    /// `clamped` is set when the legacy formula `current - (max + 1)` would
    /// have contributed a negative count for this step.
    Wrap { lost: u64, clamped: bool },
    /// `current == previous`, a retransmission or duplicate row.
    Repeat,
}

impl Step {
    pub fn lost(&self) -> u64 {
        match *self {
            Step::Gap { lost } | Step::Wrap { lost, .. } => lost,
            Step::Forward | Step::Repeat => 0,
        }
    }
}

/// Running fold state: the last counter seen in the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapState {
    previous: i64,
}

impl GapState {
    /// Seed the fold with the group's first counter.
    pub fn start(first: i64) -> Self {
        Self { previous: first }
    }

    pub fn previous(&self) -> i64 {
        self.previous
    }
}

/// One step of the fold: classify `current` against the state and advance.
pub fn advance(range: CounterRange, state: GapState, current: i64) -> (GapState, Step) {
    // ---
    let previous = state.previous;
    let step = match current.cmp(&previous) {
        Ordering::Equal => Step::Repeat,
        Ordering::Greater => match current.abs_diff(previous) - 1 {
            0 => Step::Forward,
            lost => Step::Gap { lost },
        },
        Ordering::Less if current == range.max => Step::Wrap {
            lost: 1,
            clamped: false,
        },
        Ordering::Less => {
            let legacy = current.saturating_sub(range.max.saturating_add(1));
            // Cyclic distance: values after `previous` up to max, then min up to `current`.
            let lost = range
                .max
                .saturating_sub(previous)
                .max(0)
                .saturating_add(current.saturating_sub(range.min).max(0));
            Step::Wrap {
                lost: lost as u64,
                clamped: legacy < 0,
            }
        }
    };

    (GapState { previous: current }, step)
}

/// Totals from folding one or more counter sequences.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GapTally {
    pub missing: u64,
    pub clamped_wraps: u64,
    pub repeats: u64,
}

impl GapTally {
    fn record(&mut self, step: Step) {
        // ---
        self.missing += step.lost();
        match step {
            Step::Wrap { clamped: true, .. } => self.clamped_wraps += 1,
            Step::Repeat => self.repeats += 1,
            _ => {}
        }
    }

    fn merge(&mut self, other: GapTally) {
        self.missing += other.missing;
        self.clamped_wraps += other.clamped_wraps;
        self.repeats += other.repeats;
    }
}

/// Fold an already ordered counter sequence. Fewer than two counters give
/// an empty tally.
pub fn estimate_sequence<I>(range: CounterRange, counters: I) -> GapTally
where
    I: IntoIterator<Item = i64>,
{
    // ---
    let mut counters = counters.into_iter();
    let Some(first) = counters.next() else {
        return GapTally::default();
    };

    counters
        .fold(
            (GapState::start(first), GapTally::default()),
            |(state, mut tally), current| {
                let (next, step) = advance(range, state, current);
                tally.record(step);
                (next, tally)
            },
        )
        .1
}

/// Missing-message counts per group and resampling bucket.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GapEstimate {
    pub missing: BTreeMap<(GroupKey, NaiveDate), u64>,
    pub tally: GapTally,
}

/// Estimate lost messages for every group.
///
/// Continuity is evaluated per calendar day; the daily counts are summed
/// into `frequency` buckets.
pub fn estimate_missing(
    readings: &[Reading],
    frequency: Frequency,
    range: CounterRange,
) -> GapEstimate {
    // ---
    let mut days: BTreeMap<(GroupKey, NaiveDate), Vec<&Reading>> = BTreeMap::new();
    for reading in readings {
        days.entry((reading.group_key(), reading.timestamp.date_naive()))
            .or_default()
            .push(reading);
    }

    let mut estimate = GapEstimate::default();
    for ((key, date), mut group) in days {
        // Stable sort: equal timestamps keep their input order.
        group.sort_by_key(|r| r.timestamp);
        let tally = estimate_sequence(range, group.iter().map(|r| r.frame_counter));

        if tally.missing > 0 {
            debug!(
                "{} via {} on {}: {} missing over {} readings",
                key.sensor_id,
                key.gateway_id,
                date,
                tally.missing,
                group.len()
            );
        }

        *estimate
            .missing
            .entry((key, frequency.bucket_start(date)))
            .or_insert(0) += tally.missing;
        estimate.tally.merge(tally);
    }

    estimate
}
