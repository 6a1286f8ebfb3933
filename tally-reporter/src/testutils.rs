//! Helpers for testing code that reports metrics.
//!
//! The [`CapturingSender`] records every call instead of delivering points, and can be told to
//! fail in order to exercise the error paths of the reporter.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tally_common::UnixTimestamp;
use tally_metrics::{Centroid, Tags};

use crate::attribute::HistogramGranularity;
use crate::sender::{SendError, Sender};

/// The sender method through which a [`SentPoint`] was delivered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SentKind {
    /// [`Sender::send_metric`].
    Metric,
    /// [`Sender::send_delta_counter`].
    DeltaCounter,
    /// [`Sender::send_distribution`].
    Distribution,
}

/// A call recorded by the [`CapturingSender`].
#[derive(Clone, Debug, PartialEq)]
pub struct SentPoint {
    /// The method that was called.
    pub kind: SentKind,
    /// The point name.
    pub name: String,
    /// The value, or the total count of the centroids for distributions.
    pub value: f64,
    /// The timestamp, absent for delta counters.
    pub timestamp: Option<UnixTimestamp>,
    /// The source.
    pub source: String,
    /// The point tags.
    pub tags: Tags,
    /// The centroids of a distribution.
    pub centroids: Vec<Centroid>,
    /// The granularities of a distribution.
    pub granularities: BTreeSet<HistogramGranularity>,
}

/// A [`Sender`] that records all points in memory.
#[derive(Debug, Default)]
pub struct CapturingSender {
    points: Mutex<Vec<SentPoint>>,
    threads: Mutex<HashSet<ThreadId>>,
    fail_after: Option<usize>,
    fail_on_close: bool,
    failures: AtomicU64,
    closed: AtomicU64,
}

impl CapturingSender {
    /// Creates a sender that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every send once `n` points have been recorded.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Fails every call to [`close`](Sender::close).
    pub fn fail_on_close(mut self) -> Self {
        self.fail_on_close = true;
        self
    }

    /// Returns all recorded points in the order they were sent.
    pub fn points(&self) -> Vec<SentPoint> {
        self.points.lock().clone()
    }

    /// Returns and clears all recorded points.
    pub fn take(&self) -> Vec<SentPoint> {
        std::mem::take(&mut *self.points.lock())
    }

    /// Returns the names of all recorded points in the order they were sent.
    pub fn names(&self) -> Vec<String> {
        self.points.lock().iter().map(|p| p.name.clone()).collect()
    }

    /// Returns the first recorded point with the given name.
    pub fn point(&self, name: &str) -> Option<SentPoint> {
        self.points.lock().iter().find(|p| p.name == name).cloned()
    }

    /// Returns the value of the first recorded point with the given name.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.point(name).map(|p| p.value)
    }

    /// Returns the threads that called the sender's send methods.
    pub fn send_threads(&self) -> Vec<ThreadId> {
        self.threads.lock().iter().copied().collect()
    }

    /// Returns how often the sender has been closed.
    pub fn close_count(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    fn record(&self, point: SentPoint) -> Result<(), SendError> {
        self.threads.lock().insert(thread::current().id());
        let mut points = self.points.lock();
        if self.fail_after.is_some_and(|n| points.len() >= n) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(SendError::Other(format!("rejected point {}", point.name)));
        }
        points.push(point);
        Ok(())
    }
}

impl Sender for CapturingSender {
    fn send_metric(
        &self,
        name: &str,
        value: f64,
        timestamp: UnixTimestamp,
        source: &str,
        tags: &Tags,
    ) -> Result<(), SendError> {
        self.record(SentPoint {
            kind: SentKind::Metric,
            name: name.to_owned(),
            value,
            timestamp: Some(timestamp),
            source: source.to_owned(),
            tags: tags.clone(),
            centroids: Vec::new(),
            granularities: BTreeSet::new(),
        })
    }

    fn send_delta_counter(
        &self,
        name: &str,
        value: f64,
        source: &str,
        tags: &Tags,
    ) -> Result<(), SendError> {
        self.record(SentPoint {
            kind: SentKind::DeltaCounter,
            name: name.to_owned(),
            value,
            timestamp: None,
            source: source.to_owned(),
            tags: tags.clone(),
            centroids: Vec::new(),
            granularities: BTreeSet::new(),
        })
    }

    fn send_distribution(
        &self,
        name: &str,
        centroids: &[Centroid],
        granularities: &BTreeSet<HistogramGranularity>,
        timestamp: UnixTimestamp,
        source: &str,
        tags: &Tags,
    ) -> Result<(), SendError> {
        self.record(SentPoint {
            kind: SentKind::Distribution,
            name: name.to_owned(),
            value: centroids.iter().map(|c| c.count as f64).sum(),
            timestamp: Some(timestamp),
            source: source.to_owned(),
            tags: tags.clone(),
            centroids: centroids.to_vec(),
            granularities: granularities.clone(),
        })
    }

    fn close(&self) -> Result<(), SendError> {
        self.closed.fetch_add(1, Ordering::Relaxed);
        if self.fail_on_close {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(SendError::Closed);
        }
        Ok(())
    }

    fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
