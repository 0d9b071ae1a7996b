//! Random draws used by the generator.
//!
//! Wraps one RNG and exposes the handful of draw shapes the tables need:
//! categorical picks, inclusive integer ranges and day offsets from an epoch.

use chrono::{Days, NaiveDate};
use rand::Rng;

/// Deterministic sampler over a caller-supplied RNG
pub struct Sampler<R: Rng> {
    rng: R,
}

impl<R: Rng> Sampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Pick one element with equal weight. `items` must not be empty.
    pub fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.rng.random_range(0..items.len())]
    }

    /// Uniform integer in `min..=max`
    pub fn int_range(&mut self, min: i64, max: i64) -> i64 {
        self.rng.random_range(min..=max)
    }

    /// Uniform id in `1..=count`. `count` must be at least 1.
    pub fn id(&mut self, count: usize) -> i64 {
        self.rng.random_range(1..=count as i64)
    }

    /// `epoch` plus a uniform number of days in `0..=max_offset`
    pub fn date_after(&mut self, epoch: NaiveDate, max_offset: u64) -> NaiveDate {
        let offset = self.rng.random_range(0..=max_offset);
        epoch
            .checked_add_days(Days::new(offset))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Year, month (1-12) and day (1-28), drawn in that order
    pub fn birth_date_parts(&mut self, start_year: i32, end_year: i32) -> (i32, u32, u32) {
        let year = self.rng.random_range(start_year..=end_year);
        let month = self.rng.random_range(1..=12);
        // 28 is valid in every month
        let day = self.rng.random_range(1..=28);
        (year, month, day)
    }
}
