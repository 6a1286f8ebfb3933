use std::fmt;

/// An attribute reported for meters, timers and histograms.
///
/// Every attribute is emitted as a separate point whose name ends in the attribute
/// [code](Self::code). Attributes can be disabled in the
/// [`ReporterConfig`](crate::ReporterConfig).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum MetricAttribute {
    /// The largest value.
    Max,
    /// The arithmetic mean.
    Mean,
    /// The smallest value.
    Min,
    /// The standard deviation.
    Stddev,
    /// The median.
    P50,
    /// The 75th percentile.
    P75,
    /// The 95th percentile.
    P95,
    /// The 98th percentile.
    P98,
    /// The 99th percentile.
    P99,
    /// The 99.9th percentile.
    P999,
    /// The number of recorded events or values.
    Count,
    /// The one minute moving average rate.
    M1Rate,
    /// The five minute moving average rate.
    M5Rate,
    /// The fifteen minute moving average rate.
    M15Rate,
    /// The mean rate since creation.
    MeanRate,
}

impl MetricAttribute {
    /// Returns the code appended to the point name.
    pub fn code(self) -> &'static str {
        match self {
            MetricAttribute::Max => "max",
            MetricAttribute::Mean => "mean",
            MetricAttribute::Min => "min",
            MetricAttribute::Stddev => "stddev",
            MetricAttribute::P50 => "p50",
            MetricAttribute::P75 => "p75",
            MetricAttribute::P95 => "p95",
            MetricAttribute::P98 => "p98",
            MetricAttribute::P99 => "p99",
            MetricAttribute::P999 => "p999",
            MetricAttribute::Count => "count",
            MetricAttribute::M1Rate => "m1_rate",
            MetricAttribute::M5Rate => "m5_rate",
            MetricAttribute::M15Rate => "m15_rate",
            MetricAttribute::MeanRate => "mean_rate",
        }
    }
}

impl fmt::Display for MetricAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An error returned when parsing an unknown [`MetricAttribute`] code.
#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("unknown metric attribute")]
pub struct ParseMetricAttributeError(());

impl std::str::FromStr for MetricAttribute {
    type Err = ParseMetricAttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "max" => MetricAttribute::Max,
            "mean" => MetricAttribute::Mean,
            "min" => MetricAttribute::Min,
            "stddev" => MetricAttribute::Stddev,
            "p50" => MetricAttribute::P50,
            "p75" => MetricAttribute::P75,
            "p95" => MetricAttribute::P95,
            "p98" => MetricAttribute::P98,
            "p99" => MetricAttribute::P99,
            "p999" => MetricAttribute::P999,
            "count" => MetricAttribute::Count,
            "m1_rate" => MetricAttribute::M1Rate,
            "m5_rate" => MetricAttribute::M5Rate,
            "m15_rate" => MetricAttribute::M15Rate,
            "mean_rate" => MetricAttribute::MeanRate,
            _ => return Err(ParseMetricAttributeError(())),
        })
    }
}

tally_common::impl_str_serde!(MetricAttribute, "a metric attribute code");

/// The interval into which the backend aggregates reported distributions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum HistogramGranularity {
    /// Aggregated per minute.
    Minute,
    /// Aggregated per hour.
    Hour,
    /// Aggregated per day.
    Day,
}

impl HistogramGranularity {
    /// Returns the identifier of the granularity.
    pub fn as_str(self) -> &'static str {
        match self {
            HistogramGranularity::Minute => "minute",
            HistogramGranularity::Hour => "hour",
            HistogramGranularity::Day => "day",
        }
    }
}

impl fmt::Display for HistogramGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned when parsing an unknown [`HistogramGranularity`].
#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("unknown histogram granularity")]
pub struct ParseHistogramGranularityError(());

impl std::str::FromStr for HistogramGranularity {
    type Err = ParseHistogramGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "minute" => HistogramGranularity::Minute,
            "hour" => HistogramGranularity::Hour,
            "day" => HistogramGranularity::Day,
            _ => return Err(ParseHistogramGranularityError(())),
        })
    }
}

tally_common::impl_str_serde!(HistogramGranularity, "a histogram granularity");
