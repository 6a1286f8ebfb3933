use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::Rng;

use crate::snapshot::Snapshot;

/// The default number of samples kept by a [`Histogram`].
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// A fixed-size uniform sample of a stream of values.
///
/// Uses Algorithm R: the first `size` values are kept, after which the `n`-th value replaces a
/// random slot with probability `size / n`.
#[derive(Debug)]
struct UniformReservoir {
    values: Vec<i64>,
    size: usize,
    seen: u64,
}

impl UniformReservoir {
    fn new(size: usize) -> Self {
        Self {
            values: Vec::with_capacity(size),
            size,
            seen: 0,
        }
    }

    fn update(&mut self, value: i64) {
        self.seen += 1;

        if self.values.len() < self.size {
            self.values.push(value);
            return;
        }

        let slot = rand::rng().random_range(0..self.seen);
        if let Some(entry) = usize::try_from(slot)
            .ok()
            .and_then(|slot| self.values.get_mut(slot))
        {
            *entry = value;
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::from_values(self.values.iter().map(|&value| value as f64))
    }
}

/// A histogram of integer values backed by a uniform reservoir sample.
///
/// The count covers every recorded value, while statistics are computed over the sample.
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    reservoir: Mutex<UniformReservoir>,
}

impl Histogram {
    /// Creates a histogram with the default reservoir size.
    pub fn new() -> Self {
        Self::with_reservoir_size(DEFAULT_RESERVOIR_SIZE)
    }

    /// Creates a histogram that keeps up to `size` samples.
    pub fn with_reservoir_size(size: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            reservoir: Mutex::new(UniformReservoir::new(size.max(1))),
        }
    }

    /// Records a value.
    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.reservoir.lock().update(value);
    }

    /// Returns the number of values recorded so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of the current sample.
    pub fn snapshot(&self) -> Snapshot {
        self.reservoir.lock().snapshot()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
