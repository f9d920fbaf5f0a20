use super::{Schedule, TimeScale};
use crate::errors::ScheduleError;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fires at random intervals drawn uniformly from `lower..=upper` units.
///
/// The first event is the start time itself.
#[derive(Debug, Clone)]
pub struct RandomSchedule {
    next: Option<DateTime<Utc>>,
    scale: TimeScale,
    lower: u32,
    upper: u32,
    rng: StdRng,
}

impl RandomSchedule {
    /// Creates a schedule starting at `start`.
    ///
    /// # Errors
    ///
    /// `InvertedBounds` if `upper < lower`.
    pub fn new(
        start: DateTime<Utc>,
        scale: TimeScale,
        lower: u32,
        upper: u32,
    ) -> Result<Self, ScheduleError> {
        if upper < lower {
            return Err(ScheduleError::InvertedBounds { lower, upper });
        }
        Ok(Self {
            next: Some(start),
            scale,
            lower,
            upper,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replaces the entropy source with a seeded one, for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The interval unit.
    #[must_use]
    pub fn scale(&self) -> TimeScale {
        self.scale
    }

    /// Inclusive interval bounds.
    #[must_use]
    pub fn bounds(&self) -> (u32, u32) {
        (self.lower, self.upper)
    }
}

impl Schedule for RandomSchedule {
    fn next_event(&mut self) -> Option<DateTime<Utc>> {
        let current = self.next?;
        let delta = self.rng.gen_range(self.lower..=self.upper);
        self.next = self.scale.advance(current, delta);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::utc;

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = RandomSchedule::new(utc(2024, 1, 1, 0, 0), TimeScale::Minute, 5, 2).unwrap_err();
        assert_eq!(err, ScheduleError::InvertedBounds { lower: 5, upper: 2 });
    }

    #[test]
    fn test_deltas_stay_in_bounds() {
        let start = utc(2024, 1, 1, 0, 0);
        let mut schedule = RandomSchedule::new(start, TimeScale::Minute, 2, 5)
            .unwrap()
            .with_seed(7);

        let events = schedule.upcoming(50);
        assert_eq!(events.len(), 50);
        assert_eq!(events[0], start);
        for pair in events.windows(2) {
            let minutes = (pair[1] - pair[0]).num_minutes();
            assert!((2..=5).contains(&minutes), "delta {minutes} out of bounds");
        }
    }

    #[test]
    fn test_equal_bounds_are_deterministic() {
        let start = utc(2024, 3, 1, 8, 0);
        let mut schedule = RandomSchedule::new(start, TimeScale::Day, 3, 3).unwrap();
        assert_eq!(schedule.bounds(), (3, 3));
        assert_eq!(
            schedule.upcoming(3),
            vec![start, utc(2024, 3, 4, 8, 0), utc(2024, 3, 7, 8, 0)]
        );
    }

    #[test]
    fn test_seeded_schedules_repeat() {
        let start = utc(2024, 1, 1, 0, 0);
        let mut first = RandomSchedule::new(start, TimeScale::Hour, 1, 24).unwrap().with_seed(42);
        let mut second = RandomSchedule::new(start, TimeScale::Hour, 1, 24).unwrap().with_seed(42);
        assert_eq!(first.upcoming(10), second.upcoming(10));
    }
}
