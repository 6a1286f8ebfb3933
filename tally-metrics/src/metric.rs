use std::fmt;
use std::sync::Arc;

use crate::compressed::CompressedHistogram;
use crate::counter::{Counter, DeltaCounter};
use crate::gauge::Gauge;
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::timer::Timer;

/// The kind of a [`Metric`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum MetricKind {
    /// A [`Counter`].
    Counter,
    /// A [`DeltaCounter`].
    DeltaCounter,
    /// A [`Gauge`].
    Gauge,
    /// A [`Meter`].
    Meter,
    /// A [`Timer`].
    Timer,
    /// A [`Histogram`].
    Histogram,
    /// A [`CompressedHistogram`].
    CompressedHistogram,
}

impl MetricKind {
    /// Returns the name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::DeltaCounter => "delta_counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Meter => "meter",
            MetricKind::Timer => "timer",
            MetricKind::Histogram => "histogram",
            MetricKind::CompressedHistogram => "compressed_histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared handle to any registered metric.
///
/// Cloning a metric clones the handle, not the metric.
#[derive(Clone, Debug)]
pub enum Metric {
    /// Counts up and down and is reported with its absolute value.
    Counter(Arc<Counter>),
    /// Counts up and down and is reset after every report.
    DeltaCounter(Arc<DeltaCounter>),
    /// Reports the value of a callback.
    Gauge(Arc<Gauge>),
    /// Measures the rate of events.
    Meter(Arc<Meter>),
    /// Measures the rate and duration of events.
    Timer(Arc<Timer>),
    /// Samples a distribution of values.
    Histogram(Arc<Histogram>),
    /// Accumulates a distribution of values per minute.
    CompressedHistogram(Arc<CompressedHistogram>),
}

impl Metric {
    /// Returns the kind of this metric.
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::DeltaCounter(_) => MetricKind::DeltaCounter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Timer(_) => MetricKind::Timer,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::CompressedHistogram(_) => MetricKind::CompressedHistogram,
        }
    }
}

macro_rules! impl_metric_conversions {
    ($($variant:ident),+) => {
        $(
            impl From<$variant> for Metric {
                fn from(metric: $variant) -> Self {
                    Metric::$variant(Arc::new(metric))
                }
            }

            impl From<Arc<$variant>> for Metric {
                fn from(metric: Arc<$variant>) -> Self {
                    Metric::$variant(metric)
                }
            }

            impl TypedMetric for $variant {
                const KIND: MetricKind = MetricKind::$variant;

                fn from_metric(metric: &Metric) -> Option<Arc<Self>> {
                    match metric {
                        Metric::$variant(inner) => Some(Arc::clone(inner)),
                        _ => None,
                    }
                }
            }
        )+
    };
}

/// A concrete metric type that can be extracted from a [`Metric`].
pub trait TypedMetric: Sized {
    /// The kind of [`Metric`] wrapping this type.
    const KIND: MetricKind;

    /// Returns the handle if the metric is of this type.
    fn from_metric(metric: &Metric) -> Option<Arc<Self>>;
}

impl_metric_conversions!(
    Counter,
    DeltaCounter,
    Gauge,
    Meter,
    Timer,
    Histogram,
    CompressedHistogram
);
