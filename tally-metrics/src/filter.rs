use std::fmt;

use crate::metric::MetricKind;

/// Decides which metrics are included in a registry snapshot.
///
/// Filters see the registry key of the metric, which for tagged metrics is the
/// [encoded](crate::TaggedMetricName::encode) name. Any closure over name and kind is a filter.
///
/// # Example
///
/// ```
/// use tally_metrics::{MetricFilter, MetricKind};
///
/// let filter = |name: &str, kind: MetricKind| kind == MetricKind::Counter && name.contains("db");
/// assert!(filter.matches("db.queries", MetricKind::Counter));
/// assert!(!filter.matches("db.queries", MetricKind::Gauge));
/// ```
pub trait MetricFilter: Send + Sync {
    /// Returns `true` if the metric should be included.
    fn matches(&self, name: &str, kind: MetricKind) -> bool;
}

impl<F> MetricFilter for F
where
    F: Fn(&str, MetricKind) -> bool + Send + Sync,
{
    fn matches(&self, name: &str, kind: MetricKind) -> bool {
        self(name, kind)
    }
}

/// A filter that includes every metric.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllMetrics;

impl MetricFilter for AllMetrics {
    fn matches(&self, _name: &str, _kind: MetricKind) -> bool {
        true
    }
}

/// A filter that includes metrics whose key starts with a prefix.
#[derive(Clone, Debug)]
pub struct StartsWith(String);

impl StartsWith {
    /// Creates a new prefix filter.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }
}

impl MetricFilter for StartsWith {
    fn matches(&self, name: &str, _kind: MetricKind) -> bool {
        name.starts_with(&self.0)
    }
}

impl fmt::Display for StartsWith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "starts_with({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with() {
        let filter = StartsWith::new("my");
        assert!(filter.matches("myCounter", MetricKind::Counter));
        assert!(!filter.matches("notMyCounter", MetricKind::Counter));
        assert_eq!(filter.to_string(), r#"starts_with("my")"#);
    }

    #[test]
    fn test_all() {
        assert!(AllMetrics.matches("", MetricKind::Gauge));
    }
}
