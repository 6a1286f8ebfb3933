/// A weighted value in a distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Centroid {
    /// The mean of all values merged into this centroid.
    pub mean: f64,
    /// The number of values merged into this centroid.
    pub count: u64,
}

impl Centroid {
    /// Creates a new centroid.
    pub fn new(mean: f64, count: u64) -> Self {
        Self { mean, count }
    }
}

/// A statistical snapshot of a distribution.
///
/// Snapshots are built either from individual values of a reservoir or from weighted
/// [centroids](Centroid). All accessors return `0` for an empty snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    centroids: Vec<Centroid>,
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
}

impl Snapshot {
    /// Creates a snapshot of individual values.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        Self::from_centroids(values.into_iter().map(|value| Centroid::new(value, 1)).collect())
    }

    /// Creates a snapshot of weighted centroids.
    ///
    /// Minimum and maximum are the smallest and largest centroid means.
    pub fn from_centroids(mut centroids: Vec<Centroid>) -> Self {
        centroids.retain(|centroid| centroid.count > 0 && !centroid.mean.is_nan());
        centroids.sort_by(|a, b| a.mean.total_cmp(&b.mean));

        let count = centroids.iter().map(|c| c.count).sum();
        let sum = centroids.iter().map(|c| c.mean * c.count as f64).sum();
        let min = centroids.first().map_or(0.0, |c| c.mean);
        let max = centroids.last().map_or(0.0, |c| c.mean);

        Self {
            centroids,
            count,
            min,
            max,
            sum,
        }
    }

    /// Replaces the approximated extremes and sum with exactly tracked ones.
    pub(crate) fn with_exact(mut self, min: f64, max: f64, sum: f64) -> Self {
        if self.count > 0 {
            self.min = min;
            self.max = max;
            self.sum = sum;
        }
        self
    }

    /// Returns the number of values in this snapshot.
    pub fn size(&self) -> u64 {
        self.count
    }

    /// Returns `true` if the snapshot contains no values.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the centroids of this snapshot, sorted by mean.
    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Returns the smallest value.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Returns the largest value.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Returns the sum of all values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Returns the arithmetic mean of all values.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Returns the sample standard deviation of all values.
    pub fn stddev(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }

        let mean = self.mean();
        let squares: f64 = self
            .centroids
            .iter()
            .map(|c| c.count as f64 * (c.mean - mean).powi(2))
            .sum();

        (squares / (self.count - 1) as f64).sqrt()
    }

    /// Returns the value at the given quantile in `[0, 1]`.
    ///
    /// Values between two ranks are interpolated linearly.
    pub fn value(&self, quantile: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }

        let quantile = if quantile.is_nan() {
            0.0
        } else {
            quantile.clamp(0.0, 1.0)
        };

        let n = self.count as f64;
        let pos = quantile * (n + 1.0);

        if pos < 1.0 {
            return self.min;
        }
        if pos >= n {
            return self.max;
        }

        let rank = pos.floor();
        let lower = self.value_at_rank(rank as u64);
        let upper = self.value_at_rank(rank as u64 + 1);
        lower + (pos - rank) * (upper - lower)
    }

    /// Returns the median.
    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    /// Returns the 75th percentile.
    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    /// Returns the 95th percentile.
    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    /// Returns the 98th percentile.
    pub fn p98(&self) -> f64 {
        self.value(0.98)
    }

    /// Returns the 99th percentile.
    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    /// Returns the 99.9th percentile.
    pub fn p999(&self) -> f64 {
        self.value(0.999)
    }

    /// Returns the value with the given one-based rank.
    fn value_at_rank(&self, rank: u64) -> f64 {
        let mut seen = 0;
        for centroid in &self.centroids {
            seen += centroid.count;
            if seen >= rank {
                return centroid.mean;
            }
        }
        self.max
    }
}
