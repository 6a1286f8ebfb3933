use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;
use tally_common::{Clock, SystemClock, UnixTimestamp};

use crate::snapshot::{Centroid, Snapshot};

/// The maximum number of centroids kept per minute bin.
pub const MAX_CENTROIDS: usize = 100;

const MINUTE_MILLIS: u64 = 60_000;

/// The values accumulated by a [`CompressedHistogram`] during one minute.
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution {
    /// The start of the minute in which the values were recorded.
    pub timestamp: UnixTimestamp,
    /// The compressed values, sorted by mean.
    pub centroids: Vec<Centroid>,
}

#[derive(Debug)]
struct MinuteBin {
    minute: u64,
    centroids: Vec<Centroid>,
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
}

impl MinuteBin {
    fn new(minute: u64) -> Self {
        Self {
            minute,
            centroids: Vec::new(),
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
        }
    }

    fn add(&mut self, mean: f64, count: u64) {
        self.count += count;
        self.min = self.min.min(mean);
        self.max = self.max.max(mean);
        self.sum += mean * count as f64;

        match self
            .centroids
            .binary_search_by(|centroid| centroid.mean.total_cmp(&mean))
        {
            Ok(index) => self.centroids[index].count += count,
            Err(index) => self.centroids.insert(index, Centroid::new(mean, count)),
        }

        if self.centroids.len() > MAX_CENTROIDS {
            self.merge_closest();
        }
    }

    /// Merges the two adjacent centroids with the smallest distance.
    fn merge_closest(&mut self) {
        let closest = self
            .centroids
            .iter()
            .tuple_windows()
            .map(|(a, b)| b.mean - a.mean)
            .position_min_by(|a, b| a.total_cmp(b));

        let Some(index) = closest else {
            return;
        };

        let upper = self.centroids.remove(index + 1);
        let lower = &mut self.centroids[index];
        let count = lower.count + upper.count;
        lower.mean = (lower.mean * lower.count as f64 + upper.mean * upper.count as f64)
            / count as f64;
        lower.count = count;
    }

    fn into_distribution(self) -> Distribution {
        Distribution {
            timestamp: UnixTimestamp::from_millis(self.minute),
            centroids: self.centroids,
        }
    }
}

/// A histogram that accumulates values into per-minute bins of bounded size.
///
/// Every minute bin keeps at most [`MAX_CENTROIDS`] centroids and the exact count, minimum,
/// maximum and sum of its values. Bins are drained by [`flush_distributions`] or
/// [`flush_snapshot`], so that every value is reported exactly once.
///
/// In snapshot mode, the reporter flushes a single [`Snapshot`] and reports its statistics
/// instead of sending the distributions.
///
/// [`flush_distributions`]: Self::flush_distributions
/// [`flush_snapshot`]: Self::flush_snapshot
#[derive(Debug)]
pub struct CompressedHistogram {
    bins: Mutex<Vec<MinuteBin>>,
    snapshot_mode: bool,
    clock: Arc<dyn Clock>,
}

impl CompressedHistogram {
    /// Creates a histogram driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    /// Creates a histogram driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            bins: Mutex::new(Vec::new()),
            snapshot_mode: false,
            clock,
        }
    }

    /// Makes the reporter flush this histogram as a snapshot.
    pub fn with_snapshot_mode(mut self, snapshot_mode: bool) -> Self {
        self.snapshot_mode = snapshot_mode;
        self
    }

    /// Returns `true` if this histogram is reported as a snapshot.
    pub fn is_snapshot_mode(&self) -> bool {
        self.snapshot_mode
    }

    /// Records a value.
    pub fn update(&self, value: f64) {
        self.add(value, 1);
    }

    /// Records pre-aggregated values, where `counts[i]` values have the mean `means[i]`.
    ///
    /// Excess entries of the longer slice and entries with a count of zero are ignored.
    pub fn bulk_update(&self, means: &[f64], counts: &[u64]) {
        for (&mean, &count) in means.iter().zip(counts) {
            self.add(mean, count);
        }
    }

    /// Returns the number of values that have not been flushed yet.
    pub fn count(&self) -> u64 {
        self.bins.lock().iter().map(|bin| bin.count).sum()
    }

    /// Returns a snapshot of all values that have not been flushed yet.
    pub fn snapshot(&self) -> Snapshot {
        let bins = self.bins.lock();
        merge(bins.iter())
    }

    /// Drains all minute bins and returns their distributions, oldest first.
    pub fn flush_distributions(&self) -> Vec<Distribution> {
        let bins = std::mem::take(&mut *self.bins.lock());
        bins.into_iter()
            .map(MinuteBin::into_distribution)
            .collect()
    }

    /// Drains all minute bins and returns a single snapshot of their values.
    pub fn flush_snapshot(&self) -> Snapshot {
        let bins = std::mem::take(&mut *self.bins.lock());
        merge(bins.iter())
    }

    fn add(&self, value: f64, count: u64) {
        if count == 0 || value.is_nan() {
            return;
        }

        let minute = self.clock.time() / MINUTE_MILLIS * MINUTE_MILLIS;
        let mut bins = self.bins.lock();

        match bins.iter_mut().rev().find(|bin| bin.minute == minute) {
            Some(bin) => bin.add(value, count),
            None => {
                let mut bin = MinuteBin::new(minute);
                bin.add(value, count);
                bins.push(bin);
                bins.sort_by_key(|bin| bin.minute);
            }
        }
    }
}

impl Default for CompressedHistogram {
    fn default() -> Self {
        Self::new()
    }
}

fn merge<'a>(bins: impl Iterator<Item = &'a MinuteBin>) -> Snapshot {
    let mut centroids = Vec::new();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;

    for bin in bins {
        centroids.extend_from_slice(&bin.centroids);
        min = min.min(bin.min);
        max = max.max(bin.max);
        sum += bin.sum;
    }

    Snapshot::from_centroids(centroids).with_exact(min, max, sum)
}
