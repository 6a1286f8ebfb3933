use std::sync::Arc;
use std::time::Duration;

use tally_common::{Clock, SystemClock, TimeUnit};

use crate::compressed::CompressedHistogram;
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::snapshot::Snapshot;

/// The storage of recorded durations.
#[derive(Debug)]
enum Durations {
    /// A uniform sample that is never cleared.
    Sampled(Histogram),
    /// A compressed histogram that is drained on every report.
    Flushing(CompressedHistogram),
}

/// A timer measures the rate of events and the distribution of their durations.
///
/// Durations are recorded in nanoseconds. A timer may declare its own duration and rate units,
/// which the reporter uses instead of its defaults.
///
/// # Example
///
/// ```
/// use tally_metrics::Timer;
///
/// let timer = Timer::new();
/// let answer = timer.time(|| 6 * 7);
///
/// assert_eq!(answer, 42);
/// assert_eq!(timer.count(), 1);
/// ```
#[derive(Debug)]
pub struct Timer {
    meter: Meter,
    durations: Durations,
    duration_unit: Option<TimeUnit>,
    rate_unit: Option<TimeUnit>,
    clock: Arc<dyn Clock>,
}

impl Timer {
    /// Creates a sampling timer driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    /// Creates a sampling timer driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            meter: Meter::with_clock(clock.clone()),
            durations: Durations::Sampled(Histogram::new()),
            duration_unit: None,
            rate_unit: None,
            clock,
        }
    }

    /// Creates a timer whose durations are cleared every time they are reported.
    pub fn flushing(clock: Arc<dyn Clock>) -> Self {
        let histogram = CompressedHistogram::with_clock(clock.clone()).with_snapshot_mode(true);
        Self {
            durations: Durations::Flushing(histogram),
            ..Self::with_clock(clock)
        }
    }

    /// Declares the unit in which durations of this timer are reported.
    pub fn with_duration_unit(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = Some(unit);
        self
    }

    /// Declares the unit in which rates of this timer are reported.
    pub fn with_rate_unit(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = Some(unit);
        self
    }

    /// Returns the custom duration unit of this timer, if any.
    pub fn duration_unit(&self) -> Option<TimeUnit> {
        self.duration_unit
    }

    /// Returns the custom rate unit of this timer, if any.
    pub fn rate_unit(&self) -> Option<TimeUnit> {
        self.rate_unit
    }

    /// Returns `true` if recorded durations are drained on every report.
    pub fn is_flushing(&self) -> bool {
        matches!(self.durations, Durations::Flushing(_))
    }

    /// Records a duration.
    pub fn update(&self, duration: Duration) {
        self.update_nanos(i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX));
    }

    /// Records a duration in nanoseconds. Negative durations are ignored.
    pub fn update_nanos(&self, nanos: i64) {
        if nanos < 0 {
            tally_log::trace!(nanos, "ignoring negative timer duration");
            return;
        }

        match &self.durations {
            Durations::Sampled(histogram) => histogram.update(nanos),
            Durations::Flushing(histogram) => histogram.update(nanos as f64),
        }
        self.meter.mark();
    }

    /// Runs the closure and records how long it took.
    pub fn time<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let context = self.start();
        let result = f();
        context.stop();
        result
    }

    /// Starts measuring a duration that is recorded when the returned context is stopped or
    /// dropped.
    pub fn start(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            start: self.clock.tick(),
            stopped: false,
        }
    }

    /// Returns the number of recorded durations.
    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// Returns the one minute moving average rate per second.
    pub fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    /// Returns the five minute moving average rate per second.
    pub fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    /// Returns the fifteen minute moving average rate per second.
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }

    /// Returns the mean rate per second since the timer was created.
    pub fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    /// Returns a snapshot of the recorded durations in nanoseconds without clearing them.
    pub fn snapshot(&self) -> Snapshot {
        match &self.durations {
            Durations::Sampled(histogram) => histogram.snapshot(),
            Durations::Flushing(histogram) => histogram.snapshot(),
        }
    }

    /// Returns a snapshot of the recorded durations in nanoseconds.
    ///
    /// For a flushing timer, the durations are cleared so that they are never reported twice. A
    /// sampling timer returns the same as [`snapshot`](Self::snapshot).
    pub fn flush_snapshot(&self) -> Snapshot {
        match &self.durations {
            Durations::Sampled(histogram) => histogram.snapshot(),
            Durations::Flushing(histogram) => histogram.flush_snapshot(),
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Measures a single duration for a [`Timer`].
///
/// The duration is recorded once, either by [`stop`](Self::stop) or when the context is dropped.
#[must_use = "the duration is recorded when the context is dropped"]
#[derive(Debug)]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    start: u64,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Records the elapsed time and returns it in nanoseconds.
    pub fn stop(mut self) -> u64 {
        self.record()
    }

    fn record(&mut self) -> u64 {
        let elapsed = self.timer.clock.tick().saturating_sub(self.start);
        if !self.stopped {
            self.stopped = true;
            self.timer
                .update_nanos(i64::try_from(elapsed).unwrap_or(i64::MAX));
        }
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}
