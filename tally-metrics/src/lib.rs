//! Tagged metrics and the registry they live in.
//!
//! Metrics are identified by a [`TaggedMetricName`], a group and name with a set of point tags,
//! which is encoded into a flat string key for the [`Registry`]:
//!
//! ```
//! use tally_metrics::{Registry, TaggedMetricName};
//!
//! let registry = Registry::new();
//! let name = TaggedMetricName::with_tags("jobs", "processed", [("queue", "default")]);
//! registry.counter(&name).unwrap().inc();
//!
//! assert_eq!(registry.names(), vec!["jobs|processed|queue|default"]);
//! ```
//!
//! # Metric Kinds
//!
//! The registry holds a closed set of metric kinds, see [`Metric`]:
//!
//! - [`Counter`]: an integer that counts up and down.
//! - [`DeltaCounter`]: a counter that is reset by the amount reported on every report.
//! - [`Gauge`]: a value computed by a callback.
//! - [`Meter`]: the rate of events as mean and moving averages.
//! - [`Timer`]: a meter together with the distribution of event durations.
//! - [`Histogram`]: a sampled distribution of integers.
//! - [`CompressedHistogram`]: per-minute distributions that are drained on every report.
//!
//! All metrics are safe to update concurrently from multiple threads.

#![warn(missing_docs)]

mod compressed;
mod counter;
mod filter;
mod gauge;
mod histogram;
mod meter;
mod metric;
mod name;
mod registry;
mod snapshot;
mod timer;

pub use self::compressed::*;
pub use self::counter::*;
pub use self::filter::*;
pub use self::gauge::*;
pub use self::histogram::*;
pub use self::meter::*;
pub use self::metric::*;
pub use self::name::*;
pub use self::registry::*;
pub use self::snapshot::*;
pub use self::timer::*;
