//! Fire-time generators for triggering pipeline runs.
//!
//! Schedules only compute instants; they never touch a pipeline. A caller
//! sleeps until [`Schedule::next_event`] and then queues a run.

mod cron;
mod pattern;
mod random;

pub use cron::CronSchedule;
pub use pattern::PatternSchedule;
pub use random::RandomSchedule;

use chrono::{DateTime, Days, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// A source of fire times.
pub trait Schedule {
    /// Returns the next fire time and advances the schedule.
    ///
    /// `None` once the schedule cannot produce further instants.
    fn next_event(&mut self) -> Option<DateTime<Utc>>;

    /// Collects up to `count` upcoming fire times.
    fn upcoming(&mut self, count: usize) -> Vec<DateTime<Utc>> {
        std::iter::from_fn(|| self.next_event()).take(count).collect()
    }
}

/// Unit of the intervals of random and pattern schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeScale {
    /// Minutes.
    Minute,
    /// Hours.
    Hour,
    /// Calendar days.
    Day,
    /// Weeks of seven days.
    Week,
    /// Calendar months, clamped to the last day of shorter months.
    Month,
}

impl TimeScale {
    /// Moves `from` forward by `amount` units. `None` on overflow.
    #[must_use]
    pub fn advance(self, from: DateTime<Utc>, amount: u32) -> Option<DateTime<Utc>> {
        let amount64 = u64::from(amount);
        match self {
            Self::Minute => from.checked_add_signed(Duration::minutes(i64::from(amount))),
            Self::Hour => from.checked_add_signed(Duration::hours(i64::from(amount))),
            Self::Day => from.checked_add_days(Days::new(amount64)),
            Self::Week => from.checked_add_days(Days::new(amount64 * 7)),
            Self::Month => from.checked_add_months(Months::new(amount)),
        }
    }
}

impl std::fmt::Display for TimeScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
pub(crate) fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}
