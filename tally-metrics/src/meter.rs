use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tally_common::{Clock, SystemClock, TimeUnit};

/// The interval at which moving averages are decayed, in nanoseconds.
const TICK_INTERVAL: u64 = 5_000_000_000;
const TICK_INTERVAL_SECS: f64 = 5.0;

/// An exponentially-weighted moving average of a per-second rate.
///
/// Events are accumulated with [`update`](Self::update) and folded into the average on every
/// [`tick`](Self::tick), which must be called once per tick interval.
#[derive(Debug)]
struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    /// The current rate per second, or `None` before the first tick.
    rate: Mutex<Option<f64>>,
}

impl Ewma {
    fn minutes(minutes: f64) -> Self {
        Self {
            alpha: 1.0 - (-TICK_INTERVAL_SECS / 60.0 / minutes).exp(),
            uncounted: AtomicU64::new(0),
            rate: Mutex::new(None),
        }
    }

    fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = count as f64 / TICK_INTERVAL_SECS;

        let mut rate = self.rate.lock();
        *rate = Some(match *rate {
            Some(current) => current + self.alpha * (instant_rate - current),
            None => instant_rate,
        });
    }

    fn rate(&self) -> f64 {
        let rate = *self.rate.lock();
        rate.unwrap_or(0.0)
    }
}

/// A meter that measures the rate of events.
///
/// Rates are exposed per second as the mean rate since creation and as one, five and fifteen
/// minute exponentially-weighted moving averages. A meter may declare its own rate unit, which
/// the reporter uses instead of its default.
#[derive(Debug)]
pub struct Meter {
    count: AtomicU64,
    start_time: u64,
    last_tick: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    rate_unit: Option<TimeUnit>,
    clock: Arc<dyn Clock>,
}

impl Meter {
    /// Creates a meter driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    /// Creates a meter driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let start_time = clock.tick();
        Self {
            count: AtomicU64::new(0),
            start_time,
            last_tick: AtomicU64::new(start_time),
            m1: Ewma::minutes(1.0),
            m5: Ewma::minutes(5.0),
            m15: Ewma::minutes(15.0),
            rate_unit: None,
            clock,
        }
    }

    /// Declares the unit in which rates of this meter are reported.
    pub fn with_rate_unit(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = Some(unit);
        self
    }

    /// Returns the custom rate unit of this meter, if any.
    pub fn rate_unit(&self) -> Option<TimeUnit> {
        self.rate_unit
    }

    /// Marks the occurrence of one event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Marks the occurrence of `n` events.
    pub fn mark_n(&self, n: u64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    /// Returns the number of events marked so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns the one minute moving average rate per second.
    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate()
    }

    /// Returns the five minute moving average rate per second.
    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate()
    }

    /// Returns the fifteen minute moving average rate per second.
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate()
    }

    /// Returns the mean rate per second since the meter was created.
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        let elapsed = self.clock.tick().saturating_sub(self.start_time);
        if count == 0 || elapsed == 0 {
            return 0.0;
        }

        count as f64 / (elapsed as f64 / 1e9)
    }

    fn tick_if_necessary(&self) {
        let old_tick = self.last_tick.load(Ordering::Acquire);
        let new_tick = self.clock.tick();
        let age = new_tick.saturating_sub(old_tick);

        if age <= TICK_INTERVAL {
            return;
        }

        let new_interval_start = new_tick - age % TICK_INTERVAL;
        let swapped = self
            .last_tick
            .compare_exchange(old_tick, new_interval_start, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();

        // Another thread already decayed the averages for this interval.
        if !swapped {
            return;
        }

        for _ in 0..age / TICK_INTERVAL {
            self.m1.tick();
            self.m5.tick();
            self.m15.tick();
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}
