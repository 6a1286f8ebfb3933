//! Periodic reporting of tally metrics as tagged time-series points.
//!
//! The [`Reporter`] drains a [`Registry`](tally_metrics::Registry) once per interval and
//! translates every metric into one point per attribute, such as `requests.count` or
//! `db.query.p99`. Points carry the tags of the metric's
//! [`TaggedMetricName`](tally_metrics::TaggedMetricName) merged with the point tags of the
//! reporter, and are delivered through a [`Sender`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tally_metrics::{Registry, TaggedMetricName};
//! use tally_reporter::{ApplicationTags, Reporter, ReporterConfig};
//!
//! let registry = Arc::new(Registry::new());
//! let config = ReporterConfig::builder()
//!     .source("web-1")
//!     .application_tags(ApplicationTags::new("shop", "checkout"))
//!     .interval(Duration::from_secs(30))
//!     .build();
//!
//! let handle = Reporter::new(registry.clone(), Arc::new(MySender::connect()?), config).start();
//!
//! let name = TaggedMetricName::with_tags("http", "requests", [("method", "GET")]);
//! registry.counter(&name)?.inc();
//!
//! // On shutdown:
//! handle.stop().await;
//! ```
//!
//! # Configuration
//!
//! Options can be set programmatically with [`ReporterConfig::builder`], or loaded from a YAML or
//! JSON file with [`Config::from_path`] together with the [logging
//! configuration](tally_log::LogConfig).
#![warn(missing_docs)]

mod attribute;
mod config;
mod reporter;
mod sanitize;
mod sender;
mod service;

#[cfg(any(test, feature = "test"))]
pub mod testutils;

pub use self::attribute::*;
pub use self::config::*;
pub use self::reporter::*;
pub use self::sanitize::*;
pub use self::sender::*;
pub use self::service::*;
