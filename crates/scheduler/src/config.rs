//! Scheduler configuration.

use std::time::Duration;

use chrono::NaiveTime;

/// Configuration for a [`crate::TrainingScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    daily_time: NaiveTime,
    max_parallel: usize,
    tick_interval: Duration,
}

impl Default for SchedulerConfig {
    /// Defaults: full sweep at 02:00, 4 parallel retrains, one tick per
    /// minute.
    fn default() -> Self {
        Self {
            daily_time: NaiveTime::from_hms_opt(2, 0, 0).expect("02:00 is a valid time"),
            max_parallel: 4,
            tick_interval: Duration::from_secs(60),
        }
    }
}

impl SchedulerConfig {
    /// Sets the local time of the daily full sweep.
    pub fn with_daily_time(mut self, time: NaiveTime) -> Self {
        self.daily_time = time;
        self
    }

    /// Returns the local time of the daily full sweep.
    pub fn daily_time(&self) -> NaiveTime {
        self.daily_time
    }

    /// Sets the worker pool bound.
    pub fn with_max_parallel(mut self, parallel: usize) -> Self {
        self.max_parallel = parallel.max(1);
        self
    }

    /// Returns the worker pool bound.
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Sets the clock tick granularity.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Returns the clock tick granularity.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}
