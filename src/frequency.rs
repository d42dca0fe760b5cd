//! Resampling frequency tokens and time-bucket arithmetic.
//!
//! A bucket is labelled by its first day. Day buckets are aligned to the
//! Unix epoch, week buckets to Monday, month buckets to the first of the
//! month. Anything finer than a day is rejected because frame-counter
//! continuity is evaluated per calendar day.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, TimeDelta};
use serde::{Serialize, Serializer};

use crate::error::PipelineError;

/// Largest bucket count a frequency token may carry.
pub const MAX_COUNT: u32 = 10_000;

// ---

/// Fixed-width resampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Days(u32),
    Weeks(u32),
    Months(u32),
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Days(1)
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// First Monday after the epoch.
fn week_anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 5).unwrap_or_default()
}

impl Frequency {
    /// First day of the bucket containing `date`.
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        // ---
        match *self {
            Frequency::Days(n) => align_days(epoch(), date, i64::from(n.max(1))),
            Frequency::Weeks(n) => align_days(week_anchor(), date, 7 * i64::from(n.max(1))),
            Frequency::Months(n) => {
                let width = n.clamp(1, MAX_COUNT) as i32;
                let months = (date.year() - 1970) * 12 + date.month0() as i32;
                let start = months.div_euclid(width) * width;
                NaiveDate::from_ymd_opt(
                    1970 + start.div_euclid(12),
                    start.rem_euclid(12) as u32 + 1,
                    1,
                )
                .unwrap_or(date)
            }
        }
    }
}

/// Start of the `width`-day bucket containing `date`, counted from `anchor`.
///
/// A start before the earliest representable date is clamped to it.
fn align_days(anchor: NaiveDate, date: NaiveDate, width: i64) -> NaiveDate {
    // ---
    let offset = (date - anchor).num_days();
    TimeDelta::try_days(offset.div_euclid(width) * width)
        .and_then(|delta| anchor.checked_add_signed(delta))
        .unwrap_or(NaiveDate::MIN)
}

impl FromStr for Frequency {
    type Err = PipelineError;

    /// Accepts `D`, `3D`, `1 day`, `2 days`, `W`, `week`, `M`, `MS`, `month`…
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        let token = s.trim().to_ascii_lowercase();
        let split = token
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(token.len());
        let (count, unit) = token.split_at(split);
        let unit = unit.trim();

        let count = if count.is_empty() {
            1
        } else {
            count
                .parse::<u32>()
                .map_err(|_| PipelineError::UnknownFrequency(s.to_string()))?
        };
        if count == 0 || count > MAX_COUNT {
            return Err(PipelineError::UnknownFrequency(s.to_string()));
        }

        match unit {
            "d" | "day" | "days" => Ok(Frequency::Days(count)),
            "w" | "w-mon" | "week" | "weeks" => Ok(Frequency::Weeks(count)),
            "m" | "ms" | "me" | "month" | "months" => Ok(Frequency::Months(count)),
            "h" | "hour" | "hours" | "t" | "min" | "minute" | "minutes" | "s" | "second"
            | "seconds" => Err(PipelineError::SubDailyFrequency(s.to_string())),
            _ => Err(PipelineError::UnknownFrequency(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Days(n) => write!(f, "{n}D"),
            Frequency::Weeks(n) => write!(f, "{n}W"),
            Frequency::Months(n) => write!(f, "{n}MS"),
        }
    }
}

impl Serialize for Frequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
