//! Five-field crontab expressions.
//!
//! Fields are `minute hour day-of-month month day-of-week`. Each field takes
//! `*`, a number, an `a-b` range, or a comma separated list of those. Days
//! of the week run from 1 (Monday) to 7 (Sunday). A time matches only when
//! every field matches, day-of-month and day-of-week included.

use super::Schedule;
use crate::errors::ScheduleError;
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

/// How far ahead [`CronSchedule::next_after`] looks before giving up.
const SEARCH_DAYS: u64 = 5 * 366;

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59 },
    FieldSpec { name: "hour", min: 0, max: 23 },
    FieldSpec { name: "day of month", min: 1, max: 31 },
    FieldSpec { name: "month", min: 1, max: 12 },
    FieldSpec { name: "day of week", min: 1, max: 7 },
];

/// A parsed cron expression plus a cursor for [`Schedule::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    cursor: DateTime<Utc>,
}

impl CronSchedule {
    /// Parses `expression`; the cursor starts at the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`ScheduleError`] describing the first invalid field.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != FIELDS.len() {
            return Err(ScheduleError::FieldCount(fields.len()));
        }

        let mut parsed = Vec::with_capacity(FIELDS.len());
        for (raw, spec) in fields.iter().zip(FIELDS.iter()) {
            parsed.push(parse_field(raw, spec)?);
        }
        let mut parsed = parsed.into_iter();
        let mut next = || parsed.next().unwrap_or_default();

        Ok(Self {
            expression: fields.join(" "),
            minutes: next(),
            hours: next(),
            days_of_month: next(),
            months: next(),
            days_of_week: next(),
            cursor: Utc::now(),
        })
    }

    /// Moves the cursor: the next event will be strictly after `at`.
    #[must_use]
    pub fn starting_at(mut self, at: DateTime<Utc>) -> Self {
        self.cursor = at;
        self
    }

    /// The normalized expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Allowed minutes, sorted.
    #[must_use]
    pub fn minutes(&self) -> &[u32] {
        &self.minutes
    }

    /// Allowed hours, sorted.
    #[must_use]
    pub fn hours(&self) -> &[u32] {
        &self.hours
    }

    /// Allowed days of the month, sorted.
    #[must_use]
    pub fn days_of_month(&self) -> &[u32] {
        &self.days_of_month
    }

    /// Allowed months, sorted.
    #[must_use]
    pub fn months(&self) -> &[u32] {
        &self.months
    }

    /// Allowed days of the week (1 = Monday), sorted.
    #[must_use]
    pub fn days_of_week(&self) -> &[u32] {
        &self.days_of_week
    }

    /// Returns true if the minute containing `at` matches every field.
    #[must_use]
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.day_matches(at.date_naive())
            && self.hours.contains(&at.hour())
            && self.minutes.contains(&at.minute())
    }

    /// First whole minute strictly after `after` that matches.
    ///
    /// Returns `None` if nothing matches within about five years, which
    /// happens for expressions such as `0 0 31 2 *`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let naive = after.naive_utc();
        let start = naive
            .date()
            .and_hms_opt(naive.hour(), naive.minute(), 0)?
            .checked_add_signed(Duration::minutes(1))?;
        let last_day = start.date().checked_add_days(Days::new(SEARCH_DAYS))?;

        let mut day = start.date();
        while day <= last_day {
            if self.day_matches(day) {
                if let Some(found) = self.first_time_on(day, start) {
                    return Some(Utc.from_utc_datetime(&found));
                }
            }
            day = day.succ_opt()?;
        }
        None
    }

    fn day_matches(&self, day: NaiveDate) -> bool {
        self.months.contains(&day.month())
            && self.days_of_month.contains(&day.day())
            && self.days_of_week.contains(&day.weekday().number_from_monday())
    }

    fn first_time_on(&self, day: NaiveDate, not_before: NaiveDateTime) -> Option<NaiveDateTime> {
        self.hours
            .iter()
            .flat_map(|&h| self.minutes.iter().map(move |&m| (h, m)))
            .filter_map(|(h, m)| day.and_hms_opt(h, m, 0))
            .find(|candidate| *candidate >= not_before)
    }
}

impl Schedule for CronSchedule {
    fn next_event(&mut self) -> Option<DateTime<Utc>> {
        let next = self.next_after(self.cursor)?;
        self.cursor = next;
        Some(next)
    }
}

impl FromStr for CronSchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn parse_field(raw: &str, spec: &FieldSpec) -> Result<Vec<u32>, ScheduleError> {
    let mut values = Vec::new();
    for element in raw.split(',') {
        if element == "*" {
            values.extend(spec.min..=spec.max);
            continue;
        }
        match element.split_once('-') {
            Some((lower, upper)) => {
                let lower = parse_value(lower, spec)?;
                let upper = parse_value(upper, spec)?;
                if lower > upper {
                    return Err(ScheduleError::InvertedRange {
                        field: spec.name,
                        lower,
                        upper,
                    });
                }
                values.extend(lower..=upper);
            }
            None => values.push(parse_value(element, spec)?),
        }
    }
    values.sort_unstable();
    values.dedup();
    Ok(values)
}

fn parse_value(raw: &str, spec: &FieldSpec) -> Result<u32, ScheduleError> {
    let value: u32 = raw.trim().parse().map_err(|_| ScheduleError::Parse {
        field: spec.name,
        value: raw.to_string(),
    })?;
    if value < spec.min || value > spec.max {
        return Err(ScheduleError::OutOfRange {
            field: spec.name,
            value,
            min: spec.min,
            max: spec.max,
        });
    }
    Ok(value)
}
