use super::{Schedule, TimeScale};
use crate::errors::ScheduleError;
use chrono::{DateTime, Utc};

/// Fires at intervals taken from a fixed pattern, repeated forever.
///
/// The first event is the start time; each following event is the previous
/// one advanced by the next pattern entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSchedule {
    next: Option<DateTime<Utc>>,
    scale: TimeScale,
    pattern: Vec<u32>,
    position: usize,
}

impl PatternSchedule {
    /// Creates a schedule starting at `start`.
    ///
    /// # Errors
    ///
    /// `EmptyPattern` if `pattern` is empty.
    pub fn new(
        start: DateTime<Utc>,
        scale: TimeScale,
        pattern: Vec<u32>,
    ) -> Result<Self, ScheduleError> {
        if pattern.is_empty() {
            return Err(ScheduleError::EmptyPattern);
        }
        Ok(Self {
            next: Some(start),
            scale,
            pattern,
            position: 0,
        })
    }

    /// The interval pattern.
    #[must_use]
    pub fn pattern(&self) -> &[u32] {
        &self.pattern
    }

    /// The interval unit.
    #[must_use]
    pub fn scale(&self) -> TimeScale {
        self.scale
    }
}

impl Schedule for PatternSchedule {
    fn next_event(&mut self) -> Option<DateTime<Utc>> {
        let current = self.next?;
        let delta = self.pattern[self.position];
        self.position = (self.position + 1) % self.pattern.len();
        self.next = self.scale.advance(current, delta);
        Some(current)
    }
}
