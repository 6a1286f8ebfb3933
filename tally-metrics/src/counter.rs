use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

/// Marks the registry key of a [`DeltaCounter`].
pub const DELTA_PREFIX: &str = "\u{2206}";

/// An alternative delta marker that is accepted in place of [`DELTA_PREFIX`].
pub const DELTA_PREFIX_ALT: &str = "\u{0394}";

/// Returns `true` if the name starts with one of the delta markers.
pub fn has_delta_prefix(name: &str) -> bool {
    name.starts_with(DELTA_PREFIX) || name.starts_with(DELTA_PREFIX_ALT)
}

/// Returns the registry key of a delta counter.
///
/// The delta prefix is added only if the name does not already carry a delta marker, so that
/// applying this function twice yields the same key.
pub fn delta_counter_key(name: &str) -> String {
    if has_delta_prefix(name) {
        name.to_owned()
    } else {
        format!("{DELTA_PREFIX}{name}")
    }
}

/// Removes a leading delta marker from the name, if present.
pub fn strip_delta_prefix(name: &str) -> &str {
    name.strip_prefix(DELTA_PREFIX)
        .or_else(|| name.strip_prefix(DELTA_PREFIX_ALT))
        .unwrap_or(name)
}

/// A counter that is reported with its absolute value on every cycle.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Creates a new counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increments the counter by `n`.
    pub fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrements the counter by one.
    pub fn dec(&self) {
        self.dec_by(1);
    }

    /// Decrements the counter by `n`.
    pub fn dec_by(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    /// Returns the current count.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// A counter whose value is reported as a delta and then reset.
///
/// Reporting goes through [`flush_with`](Self::flush_with), which subtracts exactly the reported
/// amount after a successful send. Increments that race with the send are kept for the next
/// report.
///
/// A delta counter must only be reported by a single reporter, since every report changes its
/// state.
#[derive(Debug, Default)]
pub struct DeltaCounter {
    count: AtomicI64,
    flush: Mutex<()>,
}

impl DeltaCounter {
    /// Creates a new delta counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increments the counter by `n`.
    pub fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrements the counter by one.
    pub fn dec(&self) {
        self.dec_by(1);
    }

    /// Decrements the counter by `n`.
    pub fn dec_by(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    /// Returns the current, not yet reported count.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Passes the current count to `report` and subtracts it once `report` succeeds.
    ///
    /// Concurrent flushes of the same counter are serialized. If `report` fails, the counter is
    /// left untouched and the error is returned.
    pub fn flush_with<F, E>(&self, report: F) -> Result<i64, E>
    where
        F: FnOnce(i64) -> Result<(), E>,
    {
        let _guard = self.flush.lock();
        let count = self.count();
        report(count)?;
        self.count.fetch_sub(count, Ordering::Relaxed);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.inc_by(5);
        counter.dec();
        assert_eq!(counter.count(), 5);
        counter.dec_by(7);
        assert_eq!(counter.count(), -2);
    }

    #[test]
    fn test_delta_key_idempotent() {
        let key = delta_counter_key("requests");
        assert_eq!(key, "\u{2206}requests");
        assert_eq!(delta_counter_key(&key), key);
        assert_eq!(delta_counter_key("\u{0394}requests"), "\u{0394}requests");
    }

    #[test]
    fn test_strip_delta_prefix() {
        assert_eq!(strip_delta_prefix("\u{2206}|requests"), "|requests");
        assert_eq!(strip_delta_prefix("\u{0394}requests"), "requests");
        assert_eq!(strip_delta_prefix("requests"), "requests");
    }

    #[test]
    fn test_flush_decrements_reported_amount() {
        let counter = DeltaCounter::new();
        counter.inc_by(5);
        counter.inc_by(3);

        let reported = counter.flush_with(|_| Ok::<_, ()>(())).unwrap();
        assert_eq!(reported, 8);
        assert_eq!(counter.count(), 0);

        let reported = counter.flush_with(|_| Ok::<_, ()>(())).unwrap();
        assert_eq!(reported, 0);
    }

    #[test]
    fn test_flush_failure_keeps_count() {
        let counter = DeltaCounter::new();
        counter.inc_by(4);

        assert_eq!(counter.flush_with(|_| Err("closed")), Err("closed"));
        assert_eq!(counter.count(), 4);
    }

    #[test]
    fn test_flush_keeps_concurrent_increments() {
        let counter = Arc::new(DeltaCounter::new());
        counter.inc_by(2);

        let reported = counter
            .flush_with(|value| {
                // An update lands between reading and decrementing.
                counter.inc_by(10);
                assert_eq!(value, 2);
                Ok::<_, ()>(())
            })
            .unwrap();

        assert_eq!(reported, 2);
        assert_eq!(counter.count(), 10);
    }
}
