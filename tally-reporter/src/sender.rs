use std::collections::BTreeSet;
use std::io;

use tally_common::UnixTimestamp;
use tally_metrics::{Centroid, Tags};

use crate::attribute::HistogramGranularity;

/// An error returned by a [`Sender`].
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The transport failed with an I/O error.
    #[error("failed to send points")]
    Io(#[from] io::Error),

    /// The sender has been closed.
    #[error("sender is closed")]
    Closed,

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Delivers reported points to a telemetry backend.
///
/// Senders are shared between the reporting cycle and the shutdown path, so all methods take
/// `&self`. Implementations should count failed deliveries and expose them through
/// [`failure_count`](Self::failure_count).
pub trait Sender: Send + Sync {
    /// Sends a single point of a time series.
    fn send_metric(
        &self,
        name: &str,
        value: f64,
        timestamp: UnixTimestamp,
        source: &str,
        tags: &Tags,
    ) -> Result<(), SendError>;

    /// Sends a delta value, which the backend adds to the series instead of replacing it.
    fn send_delta_counter(
        &self,
        name: &str,
        value: f64,
        source: &str,
        tags: &Tags,
    ) -> Result<(), SendError>;

    /// Sends the centroids of one distribution.
    fn send_distribution(
        &self,
        name: &str,
        centroids: &[Centroid],
        granularities: &BTreeSet<HistogramGranularity>,
        timestamp: UnixTimestamp,
        source: &str,
        tags: &Tags,
    ) -> Result<(), SendError>;

    /// Flushes pending data and releases the connection.
    fn close(&self) -> Result<(), SendError>;

    /// Returns the total number of failed deliveries.
    fn failure_count(&self) -> u64;
}
