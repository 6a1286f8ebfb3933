use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tally_common::{Clock, SystemClock, TimeUnit};

use crate::compressed::CompressedHistogram;
use crate::counter::{Counter, DeltaCounter, delta_counter_key};
use crate::filter::MetricFilter;
use crate::gauge::{Gauge, GaugeValue};
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::metric::{Metric, MetricKind, TypedMetric};
use crate::name::IntoMetricKey;
use crate::timer::Timer;

/// An error returned when registering a metric.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// Metrics cannot be registered under an empty name.
    #[error("metric name must not be empty")]
    EmptyName,

    /// A metric of a different kind is already registered under the name.
    #[error("a {registered} is already registered as {name:?}, cannot register a {requested}")]
    NameConflict {
        /// The registry key.
        name: String,
        /// The kind of the existing metric.
        registered: MetricKind,
        /// The kind that was requested.
        requested: MetricKind,
    },
}

/// Registered metrics partitioned by kind, each sorted by registry key.
#[derive(Clone, Debug, Default)]
pub struct RegistrySnapshot {
    /// All gauges.
    pub gauges: Vec<(String, Metric)>,
    /// All counters and delta counters.
    pub counters: Vec<(String, Metric)>,
    /// All histograms and compressed histograms.
    pub histograms: Vec<(String, Metric)>,
    /// All meters.
    pub meters: Vec<(String, Metric)>,
    /// All timers.
    pub timers: Vec<(String, Metric)>,
}

impl RegistrySnapshot {
    /// Returns the total number of metrics in the snapshot.
    pub fn len(&self) -> usize {
        self.gauges.len()
            + self.counters.len()
            + self.histograms.len()
            + self.meters.len()
            + self.timers.len()
    }

    /// Returns `true` if the snapshot contains no metrics.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A thread-safe collection of named metrics.
///
/// Registration is idempotent: asking for a metric under an existing name returns the existing
/// instance if it is of the same kind. Metrics created by the registry share its clock.
///
/// # Example
///
/// ```
/// use tally_metrics::{Registry, TaggedMetricName};
///
/// let registry = Registry::new();
/// let name = TaggedMetricName::with_tags("http", "requests", [("method", "GET")]);
///
/// registry.counter(&name).unwrap().inc();
/// registry.counter(&name).unwrap().inc();
///
/// assert_eq!(registry.counter(&name).unwrap().count(), 2);
/// assert!(registry.meter(&name).is_err());
/// ```
#[derive(Debug)]
pub struct Registry {
    metrics: RwLock<BTreeMap<String, Metric>>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Creates an empty registry using the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    /// Creates an empty registry whose metrics use the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            metrics: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Returns the clock shared by metrics of this registry.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Registers a metric, or returns the metric already registered under the name.
    ///
    /// Fails if the name is empty or if a metric of a different kind is registered under it.
    pub fn register(
        &self,
        name: impl IntoMetricKey,
        metric: impl Into<Metric>,
    ) -> Result<Metric, RegistryError> {
        let name = name.into_metric_key();
        let metric = metric.into();
        let kind = metric.kind();
        self.get_or_insert_with(name, kind, || metric)
    }

    /// Returns the metric registered under the name.
    pub fn get(&self, name: impl IntoMetricKey) -> Option<Metric> {
        self.metrics.read().get(&name.into_metric_key()).cloned()
    }

    /// Removes the metric registered under the name and returns it.
    pub fn remove(&self, name: impl IntoMetricKey) -> Option<Metric> {
        let name = name.into_metric_key();
        let removed = self.metrics.write().remove(&name);
        if removed.is_some() {
            tally_log::debug!(metric = name.as_str(), "metric removed");
        }
        removed
    }

    /// Returns the keys of all registered metrics in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    /// Returns the number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// Returns `true` if no metrics are registered.
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Returns the counter registered under the name, creating it if necessary.
    pub fn counter(&self, name: impl IntoMetricKey) -> Result<Arc<Counter>, RegistryError> {
        self.typed(name.into_metric_key(), Counter::new)
    }

    /// Returns the delta counter registered under the name, creating it if necessary.
    ///
    /// The delta prefix is added to the key unless it is already present.
    pub fn delta_counter(
        &self,
        name: impl IntoMetricKey,
    ) -> Result<Arc<DeltaCounter>, RegistryError> {
        let name = name.into_metric_key();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        self.typed(delta_counter_key(&name), DeltaCounter::new)
    }

    /// Returns the gauge registered under the name, creating it from the callback if necessary.
    pub fn gauge<F, V>(&self, name: impl IntoMetricKey, callback: F) -> Result<Arc<Gauge>, RegistryError>
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue>,
    {
        self.typed(name.into_metric_key(), || Gauge::new(callback))
    }

    /// Returns the meter registered under the name, creating it if necessary.
    pub fn meter(&self, name: impl IntoMetricKey) -> Result<Arc<Meter>, RegistryError> {
        self.typed(name.into_metric_key(), || Meter::with_clock(self.clock.clone()))
    }

    /// Returns the meter registered under the name, creating it with a custom rate unit if
    /// necessary.
    ///
    /// An existing meter is returned unchanged, even if its rate unit differs.
    pub fn meter_with_rate_unit(
        &self,
        name: impl IntoMetricKey,
        unit: TimeUnit,
    ) -> Result<Arc<Meter>, RegistryError> {
        self.typed(name.into_metric_key(), || {
            Meter::with_clock(self.clock.clone()).with_rate_unit(unit)
        })
    }

    /// Returns the timer registered under the name, creating a sampling timer if necessary.
    pub fn timer(&self, name: impl IntoMetricKey) -> Result<Arc<Timer>, RegistryError> {
        self.typed(name.into_metric_key(), || Timer::with_clock(self.clock.clone()))
    }

    /// Returns the timer registered under the name, creating it with `make` if necessary.
    ///
    /// `make` receives the registry clock.
    pub fn timer_with<F>(&self, name: impl IntoMetricKey, make: F) -> Result<Arc<Timer>, RegistryError>
    where
        F: FnOnce(Arc<dyn Clock>) -> Timer,
    {
        self.typed(name.into_metric_key(), || make(self.clock.clone()))
    }

    /// Returns the histogram registered under the name, creating it if necessary.
    pub fn histogram(&self, name: impl IntoMetricKey) -> Result<Arc<Histogram>, RegistryError> {
        self.typed(name.into_metric_key(), Histogram::new)
    }

    /// Returns the compressed histogram registered under the name, creating it if necessary.
    pub fn compressed_histogram(
        &self,
        name: impl IntoMetricKey,
    ) -> Result<Arc<CompressedHistogram>, RegistryError> {
        self.typed(name.into_metric_key(), || {
            CompressedHistogram::with_clock(self.clock.clone())
        })
    }

    /// Returns the compressed histogram registered under the name, creating it with `make` if
    /// necessary.
    ///
    /// `make` receives the registry clock.
    pub fn compressed_histogram_with<F>(
        &self,
        name: impl IntoMetricKey,
        make: F,
    ) -> Result<Arc<CompressedHistogram>, RegistryError>
    where
        F: FnOnce(Arc<dyn Clock>) -> CompressedHistogram,
    {
        self.typed(name.into_metric_key(), || make(self.clock.clone()))
    }

    /// Returns all metrics accepted by the filter, partitioned by kind.
    pub fn snapshot(&self, filter: &dyn MetricFilter) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot::default();

        for (name, metric) in self.metrics.read().iter() {
            if !filter.matches(name, metric.kind()) {
                continue;
            }

            let table = match metric.kind() {
                MetricKind::Gauge => &mut snapshot.gauges,
                MetricKind::Counter | MetricKind::DeltaCounter => &mut snapshot.counters,
                MetricKind::Histogram | MetricKind::CompressedHistogram => {
                    &mut snapshot.histograms
                }
                MetricKind::Meter => &mut snapshot.meters,
                MetricKind::Timer => &mut snapshot.timers,
            };

            table.push((name.clone(), metric.clone()));
        }

        snapshot
    }

    fn typed<T, F>(&self, name: String, make: F) -> Result<Arc<T>, RegistryError>
    where
        T: TypedMetric,
        F: FnOnce() -> T,
        Metric: From<T>,
    {
        let metric = self.get_or_insert_with(name.clone(), T::KIND, || Metric::from(make()))?;

        // The kind was checked on insertion, so this only fails on a broken `TypedMetric` impl.
        T::from_metric(&metric).ok_or_else(|| RegistryError::NameConflict {
            name,
            registered: metric.kind(),
            requested: T::KIND,
        })
    }

    fn get_or_insert_with<F>(
        &self,
        name: String,
        kind: MetricKind,
        make: F,
    ) -> Result<Metric, RegistryError>
    where
        F: FnOnce() -> Metric,
    {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        if let Some(existing) = self.metrics.read().get(&name) {
            return check_kind(&name, existing, kind);
        }

        let mut metrics = self.metrics.write();
        if let Some(existing) = metrics.get(&name) {
            return check_kind(&name, existing, kind);
        }

        let metric = make();
        tally_log::debug!(metric = name.as_str(), kind = %kind, "metric registered");
        metrics.insert(name, metric.clone());
        Ok(metric)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_kind(name: &str, existing: &Metric, requested: MetricKind) -> Result<Metric, RegistryError> {
    let registered = existing.kind();
    if registered == requested {
        Ok(existing.clone())
    } else {
        Err(RegistryError::NameConflict {
            name: name.to_owned(),
            registered,
            requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::filter::{AllMetrics, StartsWith};
    use crate::name::TaggedMetricName;

    #[test]
    fn test_register_if_absent() {
        let registry = Registry::new();
        let first = registry.counter("requests").unwrap();
        let second = registry.counter("requests").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_name_conflict() {
        let registry = Registry::new();
        registry.counter("requests").unwrap();

        let error = registry.meter("requests").unwrap_err();
        assert_eq!(
            error,
            RegistryError::NameConflict {
                name: "requests".to_owned(),
                registered: MetricKind::Counter,
                requested: MetricKind::Meter,
            }
        );
        assert_eq!(
            error.to_string(),
            r#"a counter is already registered as "requests", cannot register a meter"#
        );
    }

    #[test]
    fn test_empty_name() {
        let registry = Registry::new();
        assert_eq!(registry.counter("").unwrap_err(), RegistryError::EmptyName);
        assert_eq!(registry.delta_counter("").unwrap_err(), RegistryError::EmptyName);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_existing_instance() {
        let registry = Registry::new();
        let counter = Arc::new(Counter::new());
        counter.inc_by(7);

        registry.register("preset", Arc::clone(&counter)).unwrap();
        assert_eq!(registry.counter("preset").unwrap().count(), 7);

        let metric = registry.register("preset", Counter::new()).unwrap();
        assert!(matches!(metric, Metric::Counter(ref c) if c.count() == 7));
    }

    #[test]
    fn test_delta_counter_key() {
        let registry = Registry::new();
        let name = TaggedMetricName::new("jobs", "processed");

        let first = registry.delta_counter(&name).unwrap();
        let second = registry.delta_counter("\u{2206}jobs|processed").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.names(), vec!["\u{2206}jobs|processed".to_owned()]);
    }

    #[test]
    fn test_tagged_names() {
        let registry = Registry::new();
        let name = TaggedMetricName::with_tags("http", "latency", [("route", "/")]);
        registry.histogram(&name).unwrap().update(3);

        assert!(registry.get("http|latency|route|/").is_some());
        assert!(registry.remove(name).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_partitions() {
        let registry = Registry::new();
        registry.gauge("g", || 1).unwrap();
        registry.counter("c").unwrap();
        registry.delta_counter("d").unwrap();
        registry.histogram("h").unwrap();
        registry.compressed_histogram("ch").unwrap();
        registry.meter("m").unwrap();
        registry.timer("t").unwrap();

        fn names(table: &[(String, Metric)]) -> Vec<&str> {
            table.iter().map(|(name, _)| name.as_str()).collect()
        }

        let snapshot = registry.snapshot(&AllMetrics);

        assert_eq!(snapshot.len(), 7);
        assert_eq!(names(&snapshot.gauges), vec!["g"]);
        assert_eq!(names(&snapshot.counters), vec!["c", "\u{2206}d"]);
        assert_eq!(names(&snapshot.histograms), vec!["ch", "h"]);
        assert_eq!(names(&snapshot.meters), vec!["m"]);
        assert_eq!(names(&snapshot.timers), vec!["t"]);
    }

    #[test]
    fn test_snapshot_filter() {
        let registry = Registry::new();
        registry.counter("myCounter").unwrap();
        registry.counter("notMyCounter").unwrap();

        let snapshot = registry.snapshot(&StartsWith::new("my"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.counters[0].0, "myCounter");

        let only_gauges = |_: &str, kind: MetricKind| kind == MetricKind::Gauge;
        assert!(registry.snapshot(&only_gauges).is_empty());
    }

    #[test]
    fn test_custom_units() {
        let registry = Registry::new();
        let meter = registry.meter_with_rate_unit("m", TimeUnit::Minutes).unwrap();
        assert_eq!(meter.rate_unit(), Some(TimeUnit::Minutes));

        let timer = registry
            .timer_with("t", |clock| Timer::flushing(clock).with_duration_unit(TimeUnit::Seconds))
            .unwrap();
        assert!(timer.is_flushing());
        assert_eq!(timer.duration_unit(), Some(TimeUnit::Seconds));
    }
}
