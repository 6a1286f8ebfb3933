use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use itertools::Itertools;
use parking_lot::Mutex;
use tally_common::{Clock, TimeUnit, UnixTimestamp};
use tally_log::LogError;
use tally_metrics::{
    CompressedHistogram, Counter, DELTA_PREFIX, DeltaCounter, Gauge, Histogram, Meter, Metric,
    Registry, RegistrySnapshot, Snapshot, Tags, TaggedMetricName, Timer, strip_delta_prefix,
};

use crate::attribute::MetricAttribute;
use crate::config::ReporterConfig;
use crate::sanitize::sanitize;
use crate::sender::{SendError, Sender};

/// The unit of reported durations unless a timer declares its own.
const DEFAULT_DURATION_UNIT: TimeUnit = TimeUnit::Milliseconds;

/// The unit of reported rates unless a meter or timer declares its own.
const DEFAULT_RATE_UNIT: TimeUnit = TimeUnit::Seconds;

/// The gauge reporting milliseconds since the reporter was built.
const UPTIME_GAUGE: &str = "runtime.uptime";

/// The gauge reporting the current clock time in milliseconds.
const CURRENT_TIME_GAUGE: &str = "runtime.current_time";

/// The lifecycle state of a [`Reporter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReporterState {
    /// Waiting for the next cycle.
    Idle,
    /// Taking a snapshot of the registry.
    Collecting,
    /// Sending points of the current snapshot.
    Emitting,
    /// Stopped. No further cycles are run.
    Stopped,
}

impl ReporterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReporterState::Idle,
            1 => ReporterState::Collecting,
            2 => ReporterState::Emitting,
            _ => ReporterState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ReporterState::Idle => 0,
            ReporterState::Collecting => 1,
            ReporterState::Emitting => 2,
            ReporterState::Stopped => 3,
        }
    }
}

/// Translates the metrics of a [`Registry`] into tagged points.
///
/// Every call to [`report`](Self::report) runs one reporting cycle: the registry is snapshotted
/// through the configured filter, and every metric is emitted through the [`Sender`] as one point
/// per attribute. Tables are reported in the order gauges, counters, histograms, meters and
/// timers, each sorted by registry key.
///
/// A failing send aborts the cycle and closes the sender. The next cycle starts from scratch.
///
/// To report periodically, [`start`](Self::start) the reporter in a tokio runtime.
pub struct Reporter {
    registry: Arc<Registry>,
    sender: Arc<dyn Sender>,
    config: ReporterConfig,
    state: AtomicU8,
    cycle: Mutex<()>,
    close: Mutex<()>,
}

impl Reporter {
    /// Creates a reporter for the registry.
    ///
    /// If enabled in the config, the runtime gauges are registered right away.
    pub fn new(registry: Arc<Registry>, sender: Arc<dyn Sender>, config: ReporterConfig) -> Self {
        if config.include_runtime_metrics() {
            register_runtime_metrics(&registry, config.clock());
        }

        Self {
            registry,
            sender,
            config,
            state: AtomicU8::new(ReporterState::Idle.as_u8()),
            cycle: Mutex::new(()),
            close: Mutex::new(()),
        }
    }

    /// Returns the reported registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the configuration of this reporter.
    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ReporterState {
        ReporterState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns the number of failed deliveries reported by the sender.
    pub fn failure_count(&self) -> u64 {
        self.sender.failure_count()
    }

    /// Runs one reporting cycle.
    ///
    /// Cycles are serialized. Once the reporter is stopped, this does nothing.
    pub fn report(&self) {
        let _cycle = self.cycle.lock();
        if self.state() == ReporterState::Stopped {
            tally_log::debug!("reporter is stopped, skipping report");
            return;
        }

        self.set_state(ReporterState::Collecting);
        let snapshot = self.registry.snapshot(self.config.filter());
        let timestamp = self.config.clock().timestamp();

        self.set_state(ReporterState::Emitting);
        tally_log::trace!(metrics = snapshot.len(), "reporting metrics");

        if let Err(error) = self.report_snapshot(&snapshot, timestamp) {
            tally_log::warn!(
                error = &error as &dyn Error,
                "failed to report metrics, closing sender"
            );
            self.close_sender();
        }

        self.set_state(ReporterState::Idle);
    }

    /// Stops the reporter and closes the sender.
    ///
    /// Waits for a running cycle to finish. Errors while closing are logged.
    pub fn stop(&self) {
        let _cycle = self.cycle.lock();
        self.set_state(ReporterState::Stopped);
        self.close_sender();
        tally_log::debug!("reporter stopped");
    }

    fn set_state(&self, state: ReporterState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn close_sender(&self) {
        let _close = self.close.lock();
        if let Err(error) = self.sender.close() {
            tally_log::warn!(error = &error as &dyn Error, "failed to close sender");
        }
    }

    fn report_snapshot(
        &self,
        snapshot: &RegistrySnapshot,
        timestamp: UnixTimestamp,
    ) -> Result<(), SendError> {
        let tables = [
            &snapshot.gauges,
            &snapshot.counters,
            &snapshot.histograms,
            &snapshot.meters,
            &snapshot.timers,
        ];

        for (key, metric) in tables.into_iter().flatten() {
            self.report_metric(key, metric, timestamp)?;
        }

        Ok(())
    }

    fn report_metric(
        &self,
        key: &str,
        metric: &Metric,
        timestamp: UnixTimestamp,
    ) -> Result<(), SendError> {
        let key = match metric {
            Metric::DeltaCounter(_) => strip_delta_prefix(key),
            _ => key,
        };

        let name = match TaggedMetricName::decode(key) {
            Ok(name) => name,
            Err(error) => {
                tally_log::warn!(
                    error = &error as &dyn Error,
                    metric = key,
                    "skipping metric with invalid name"
                );
                return Ok(());
            }
        };

        let mut tags = self.config.point_tags().clone();
        tags.extend(name.tags().iter().map(|(k, v)| (k.clone(), v.clone())));

        let point = Point {
            reporter: self,
            metric,
            name: &name,
            tags: &tags,
            timestamp,
        };

        match metric {
            Metric::Gauge(gauge) => point.gauge(gauge),
            Metric::Counter(counter) => point.counter(counter),
            Metric::DeltaCounter(counter) => point.delta_counter(counter),
            Metric::Histogram(histogram) => point.histogram(histogram),
            Metric::CompressedHistogram(histogram) => point.compressed_histogram(histogram),
            Metric::Meter(meter) => point.meter(meter),
            Metric::Timer(timer) => point.timer(timer),
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Emits the points of a single metric within a cycle.
struct Point<'a> {
    reporter: &'a Reporter,
    metric: &'a Metric,
    name: &'a TaggedMetricName,
    tags: &'a Tags,
    timestamp: UnixTimestamp,
}

impl Point<'_> {
    fn config(&self) -> &ReporterConfig {
        &self.reporter.config
    }

    /// Assembles `prefix.group.name.code` with the mapped code, skipping empty segments.
    fn point_name(&self, code: &str) -> String {
        let code = self.config().map_code(self.metric, code);
        self.join_name(&code)
    }

    /// Assembles `prefix.group.name`, skipping empty segments.
    fn join_name(&self, code: &str) -> String {
        let joined = [
            self.config().prefix().unwrap_or_default(),
            self.name.group(),
            self.name.name(),
            code,
        ]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .join(".");

        sanitize(&joined).into_owned()
    }

    fn send(&self, code: &str, value: f64) -> Result<(), SendError> {
        self.reporter.sender.send_metric(
            &self.point_name(code),
            zero_if_nan(value),
            self.timestamp,
            self.config().source(),
            self.tags,
        )
    }

    fn send_attribute(&self, attribute: MetricAttribute, value: f64) -> Result<(), SendError> {
        if !self.config().is_enabled(attribute) {
            return Ok(());
        }
        self.send(attribute.code(), value)
    }

    fn gauge(&self, gauge: &Gauge) -> Result<(), SendError> {
        match gauge.value().as_f64() {
            Some(value) => self.send("", value),
            None => {
                tally_log::trace!(metric = self.name.name(), "skipping non-numeric gauge");
                Ok(())
            }
        }
    }

    fn counter(&self, counter: &Counter) -> Result<(), SendError> {
        let count = counter.count();
        if count == 0 && self.config().ignore_zero_counters() {
            return Ok(());
        }
        self.send(MetricAttribute::Count.code(), count as f64)
    }

    fn delta_counter(&self, counter: &DeltaCounter) -> Result<(), SendError> {
        let name = format!(
            "{DELTA_PREFIX}{}",
            self.point_name(MetricAttribute::Count.code())
        );

        counter.flush_with(|count| {
            self.reporter.sender.send_delta_counter(
                &name,
                count as f64,
                self.config().source(),
                self.tags,
            )
        })?;

        Ok(())
    }

    fn histogram(&self, histogram: &Histogram) -> Result<(), SendError> {
        self.sampled(histogram.count(), &histogram.snapshot())
    }

    fn compressed_histogram(&self, histogram: &CompressedHistogram) -> Result<(), SendError> {
        if histogram.is_snapshot_mode() {
            let snapshot = histogram.flush_snapshot();
            return self.sampled(snapshot.size(), &snapshot);
        }

        let name = self.join_name("");
        for distribution in histogram.flush_distributions() {
            self.reporter.sender.send_distribution(
                &name,
                &distribution.centroids,
                self.config().histogram_granularities(),
                distribution.timestamp,
                self.config().source(),
                self.tags,
            )?;
        }

        Ok(())
    }

    fn sampled(&self, count: u64, snapshot: &Snapshot) -> Result<(), SendError> {
        self.send_attribute(MetricAttribute::Count, count as f64)?;
        if count == 0 && self.config().ignore_empty_histograms() {
            return Ok(());
        }
        self.distribution(snapshot, |value| value)
    }

    fn meter(&self, meter: &Meter) -> Result<(), SendError> {
        let unit = meter.rate_unit().unwrap_or(DEFAULT_RATE_UNIT);
        self.send_attribute(MetricAttribute::Count, meter.count() as f64)?;
        self.send_attribute(
            MetricAttribute::M1Rate,
            unit.convert_rate(meter.one_minute_rate()),
        )?;
        self.send_attribute(
            MetricAttribute::M5Rate,
            unit.convert_rate(meter.five_minute_rate()),
        )?;
        self.send_attribute(
            MetricAttribute::M15Rate,
            unit.convert_rate(meter.fifteen_minute_rate()),
        )?;
        self.send_attribute(MetricAttribute::MeanRate, unit.convert_rate(meter.mean_rate()))
    }

    fn timer(&self, timer: &Timer) -> Result<(), SendError> {
        let count = timer.count();
        let duration_unit = timer.duration_unit().unwrap_or(DEFAULT_DURATION_UNIT);
        self.distribution(&timer.flush_snapshot(), |nanos| {
            duration_unit.convert_duration(nanos)
        })?;

        let rate_unit = timer.rate_unit().unwrap_or(DEFAULT_RATE_UNIT);
        self.send_attribute(MetricAttribute::Count, count as f64)?;
        self.send_attribute(
            MetricAttribute::M1Rate,
            rate_unit.convert_rate(timer.one_minute_rate()),
        )?;
        self.send_attribute(
            MetricAttribute::M5Rate,
            rate_unit.convert_rate(timer.five_minute_rate()),
        )?;
        self.send_attribute(
            MetricAttribute::M15Rate,
            rate_unit.convert_rate(timer.fifteen_minute_rate()),
        )?;
        self.send_attribute(
            MetricAttribute::MeanRate,
            rate_unit.convert_rate(timer.mean_rate()),
        )
    }

    /// Sends the statistics of a snapshot, with values passed through `convert`.
    fn distribution<F>(&self, snapshot: &Snapshot, convert: F) -> Result<(), SendError>
    where
        F: Fn(f64) -> f64,
    {
        self.send_attribute(MetricAttribute::Max, convert(snapshot.max()))?;
        self.send_attribute(MetricAttribute::Mean, convert(snapshot.mean()))?;
        self.send_attribute(MetricAttribute::Min, convert(snapshot.min()))?;
        if self.config().report_histogram_sum() {
            self.send("sum", convert(snapshot.sum()))?;
        }
        self.send_attribute(MetricAttribute::Stddev, convert(snapshot.stddev()))?;
        self.send_attribute(MetricAttribute::P50, convert(snapshot.median()))?;
        self.send_attribute(MetricAttribute::P75, convert(snapshot.p75()))?;
        self.send_attribute(MetricAttribute::P95, convert(snapshot.p95()))?;
        self.send_attribute(MetricAttribute::P98, convert(snapshot.p98()))?;
        self.send_attribute(MetricAttribute::P99, convert(snapshot.p99()))?;
        self.send_attribute(MetricAttribute::P999, convert(snapshot.p999()))
    }
}

fn zero_if_nan(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value }
}

/// Registers the process runtime gauges, logging names that are already taken.
fn register_runtime_metrics(registry: &Registry, clock: &Arc<dyn Clock>) {
    let built_at = clock.time();

    let uptime_clock = Arc::clone(clock);
    let uptime = registry.gauge(UPTIME_GAUGE, move || {
        uptime_clock.time().saturating_sub(built_at)
    });

    let time_clock = Arc::clone(clock);
    let current_time = registry.gauge(CURRENT_TIME_GAUGE, move || time_clock.time());

    for result in [uptime, current_time] {
        if let Err(error) = result {
            tally_log::info!("runtime metric is not registered: {}", LogError(&error));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use similar_asserts::assert_eq;
    use tally_common::ManualClock;
    use tally_metrics::{Centroid, MetricKind, StartsWith};

    use super::*;
    use crate::attribute::HistogramGranularity;
    use crate::config::{ApplicationTags, ReporterConfigBuilder};
    use crate::testutils::{CapturingSender, SentKind};

    const START_MILLIS: u64 = 1_700_000_040_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        registry: Arc<Registry>,
        sender: Arc<CapturingSender>,
        reporter: Reporter,
    }

    fn fixture(builder: ReporterConfigBuilder) -> Fixture {
        fixture_with_sender(builder, CapturingSender::new())
    }

    fn fixture_with_sender(builder: ReporterConfigBuilder, sender: CapturingSender) -> Fixture {
        tally_log::init_test!();

        let clock = Arc::new(ManualClock::at_millis(START_MILLIS));
        let registry = Arc::new(Registry::with_clock(clock.clone()));
        let sender = Arc::new(sender);
        let config = builder.clock(clock.clone()).build();
        let reporter = Reporter::new(registry.clone(), sender.clone(), config);

        Fixture {
            clock,
            registry,
            sender,
            reporter,
        }
    }

    fn values(sender: &CapturingSender) -> Vec<(String, f64)> {
        sender
            .points()
            .into_iter()
            .map(|point| (point.name, point.value))
            .collect()
    }

    #[test]
    fn test_counter() {
        let f = fixture(ReporterConfig::builder());
        f.registry.counter("requests").unwrap().inc_by(3);
        f.reporter.report();

        let point = f.sender.point("requests.count").unwrap();
        assert_eq!(point.kind, SentKind::Metric);
        assert_eq!(point.value, 3.0);
        assert_eq!(point.source, "tally");
        assert_eq!(point.timestamp, Some(UnixTimestamp::from_secs(1_700_000_040)));

        // Counters are not reset.
        f.sender.take();
        f.reporter.report();
        assert_eq!(f.sender.value("requests.count"), Some(3.0));
    }

    #[test]
    fn test_delta_counter_reports_then_resets() {
        let f = fixture(ReporterConfig::builder());
        let counter = f.registry.delta_counter("jobs").unwrap();
        counter.inc_by(5);
        counter.inc_by(3);

        f.reporter.report();
        let point = f.sender.point("\u{2206}jobs.count").unwrap();
        assert_eq!(point.kind, SentKind::DeltaCounter);
        assert_eq!(point.value, 8.0);
        assert_eq!(counter.count(), 0);

        f.sender.take();
        f.reporter.report();
        assert_eq!(f.sender.value("\u{2206}jobs.count"), Some(0.0));
    }

    #[test]
    fn test_delta_counter_kept_on_failure() {
        let f = fixture_with_sender(ReporterConfig::builder(), CapturingSender::new().fail_after(0));
        let counter = f.registry.delta_counter("jobs").unwrap();
        counter.inc_by(8);

        f.reporter.report();
        assert_eq!(counter.count(), 8);
        assert_eq!(f.reporter.failure_count(), 1);
    }

    #[test]
    fn test_delta_counter_with_tags() {
        let f = fixture(ReporterConfig::builder().prefix("acme"));
        let name = TaggedMetricName::with_tags("jobs", "done", [("queue", "high")]);
        f.registry.delta_counter(&name).unwrap().inc();

        f.reporter.report();
        let point = f.sender.point("\u{2206}acme.jobs.done.count").unwrap();
        assert_eq!(point.tags["queue"], "high");
    }

    #[test]
    fn test_ignore_zero_counters() {
        let f = fixture(ReporterConfig::builder().ignore_zero_counters(true));
        let counter = f.registry.counter("idle").unwrap();

        f.reporter.report();
        assert!(f.sender.points().is_empty());

        counter.inc();
        f.reporter.report();
        assert_eq!(values(&f.sender), vec![("idle.count".to_owned(), 1.0)]);
    }

    #[test]
    fn test_zero_counters_reported_by_default() {
        let f = fixture(ReporterConfig::builder());
        f.registry.counter("idle").unwrap();

        f.reporter.report();
        assert_eq!(f.sender.value("idle.count"), Some(0.0));
    }

    #[test]
    fn test_metric_tags_win() {
        let f = fixture(ReporterConfig::builder().point_tag("env", "prod"));
        let name = TaggedMetricName::with_tags("app", "requests", [("env", "staging"), ("shard", "1")]);
        f.registry.counter(&name).unwrap().inc();

        f.reporter.report();
        insta::assert_debug_snapshot!(f.sender.point("app.requests.count").unwrap().tags, @r###"
        {
            "env": "staging",
            "shard": "1",
        }
        "###);
    }

    #[test]
    fn test_application_tags() {
        let f = fixture(
            ReporterConfig::builder().application_tags(ApplicationTags::new("shop", "checkout")),
        );
        f.registry.counter("orders").unwrap();

        f.reporter.report();
        insta::assert_debug_snapshot!(f.sender.point("orders.count").unwrap().tags, @r###"
        {
            "application": "shop",
            "cluster": "none",
            "service": "checkout",
            "shard": "none",
        }
        "###);
    }

    #[test]
    fn test_filter() {
        let f = fixture(ReporterConfig::builder().filter(StartsWith::new("my")));
        f.registry.counter("myCounter").unwrap().inc_by(3);
        f.registry.counter("notMyCounter").unwrap().inc_by(3);

        f.reporter.report();
        let points = f.sender.points();
        assert_eq!(points.len(), 1);
        assert!(points[0].name.ends_with(".count"));
        assert_eq!(points[0].value, 3.0);
        assert!(!f.sender.names().iter().any(|n| n.starts_with("notMyCounter")));
    }

    #[test]
    fn test_prefix_and_sanitize() {
        let f = fixture(ReporterConfig::builder().prefix("my app"));
        let name = TaggedMetricName::new("http", "requests/sec");
        f.registry.counter(&name).unwrap();

        f.reporter.report();
        assert_eq!(f.sender.names(), vec!["my_app.http.requests_sec.count"]);
    }

    #[test]
    fn test_gauges() {
        let f = fixture(ReporterConfig::builder());
        f.registry.gauge("queue.size", || 42_u64).unwrap();
        f.registry.gauge("status", || "green").unwrap();
        f.registry.gauge("ratio", || f64::NAN).unwrap();

        f.reporter.report();
        assert_eq!(
            values(&f.sender),
            vec![("queue.size".to_owned(), 42.0), ("ratio".to_owned(), 0.0)]
        );
    }

    #[test]
    fn test_report_order() {
        let f = fixture(
            ReporterConfig::builder().disabled_attributes([
                MetricAttribute::Max,
                MetricAttribute::Mean,
                MetricAttribute::Min,
                MetricAttribute::Stddev,
                MetricAttribute::P50,
                MetricAttribute::P75,
                MetricAttribute::P95,
                MetricAttribute::P98,
                MetricAttribute::P99,
                MetricAttribute::P999,
                MetricAttribute::M1Rate,
                MetricAttribute::M5Rate,
                MetricAttribute::M15Rate,
                MetricAttribute::MeanRate,
            ]),
        );
        f.registry.timer("e.timer").unwrap();
        f.registry.meter("d.meter").unwrap();
        f.registry.histogram("c.histogram").unwrap();
        f.registry.counter("b.counter").unwrap();
        f.registry.gauge("a.gauge", || 1).unwrap();
        f.registry.counter("a.counter").unwrap();

        f.reporter.report();
        insta::assert_debug_snapshot!(f.sender.names(), @r###"
        [
            "a.gauge",
            "a.counter.count",
            "b.counter.count",
            "c.histogram.count",
            "d.meter.count",
            "e.timer.count",
        ]
        "###);
    }

    #[test]
    fn test_histogram() {
        let f = fixture(ReporterConfig::builder().report_histogram_sum(true));
        let histogram = f.registry.histogram("sizes").unwrap();
        for value in [1, 2, 3] {
            histogram.update(value);
        }

        f.reporter.report();
        insta::assert_debug_snapshot!(values(&f.sender), @r###"
        [
            (
                "sizes.count",
                3.0,
            ),
            (
                "sizes.max",
                3.0,
            ),
            (
                "sizes.mean",
                2.0,
            ),
            (
                "sizes.min",
                1.0,
            ),
            (
                "sizes.sum",
                6.0,
            ),
            (
                "sizes.stddev",
                1.0,
            ),
            (
                "sizes.p50",
                2.0,
            ),
            (
                "sizes.p75",
                3.0,
            ),
            (
                "sizes.p95",
                3.0,
            ),
            (
                "sizes.p98",
                3.0,
            ),
            (
                "sizes.p99",
                3.0,
            ),
            (
                "sizes.p999",
                3.0,
            ),
        ]
        "###);
    }

    #[test]
    fn test_ignore_empty_histograms() {
        let f = fixture(ReporterConfig::builder().ignore_empty_histograms(true));
        f.registry.histogram("sizes").unwrap();
        f.registry.timer("latency").unwrap();

        f.reporter.report();
        assert_eq!(
            values(&f.sender),
            vec![
                ("sizes.count".to_owned(), 0.0),
                ("latency.max".to_owned(), 0.0),
                ("latency.mean".to_owned(), 0.0),
                ("latency.min".to_owned(), 0.0),
                ("latency.stddev".to_owned(), 0.0),
                ("latency.p50".to_owned(), 0.0),
                ("latency.p75".to_owned(), 0.0),
                ("latency.p95".to_owned(), 0.0),
                ("latency.p98".to_owned(), 0.0),
                ("latency.p99".to_owned(), 0.0),
                ("latency.p999".to_owned(), 0.0),
                ("latency.count".to_owned(), 0.0),
                ("latency.m1_rate".to_owned(), 0.0),
                ("latency.m5_rate".to_owned(), 0.0),
                ("latency.m15_rate".to_owned(), 0.0),
                ("latency.mean_rate".to_owned(), 0.0),
            ]
        );
    }

    #[test]
    fn test_empty_histogram_reports_zeros() {
        let f = fixture(ReporterConfig::builder());
        f.registry.histogram("sizes").unwrap();

        f.reporter.report();
        let points = f.sender.points();
        assert_eq!(points.len(), 11);
        assert!(points.iter().all(|p| p.value == 0.0));
    }

    #[test]
    fn test_disabled_attributes() {
        let f = fixture(
            ReporterConfig::builder()
                .report_histogram_sum(true)
                .disabled_attributes([
                    MetricAttribute::Max,
                    MetricAttribute::Mean,
                    MetricAttribute::Min,
                    MetricAttribute::Stddev,
                    MetricAttribute::P50,
                    MetricAttribute::P75,
                    MetricAttribute::P95,
                    MetricAttribute::P98,
                    MetricAttribute::P999,
                    MetricAttribute::Count,
                ]),
        );
        f.registry.histogram("sizes").unwrap().update(5);
        // Counters have no optional attributes.
        f.registry.counter("requests").unwrap();

        f.reporter.report();
        assert_eq!(
            f.sender.names(),
            vec!["requests.count", "sizes.sum", "sizes.p99"]
        );
    }

    #[test]
    fn test_compressed_histogram_flushes_once() {
        let f = fixture(
            ReporterConfig::builder().histogram_granularity(HistogramGranularity::Minute),
        );
        let histogram = f.registry.compressed_histogram("latency").unwrap();
        for value in [1.0, 2.0, 3.0] {
            histogram.update(value);
        }

        f.reporter.report();
        let point = f.sender.point("latency").unwrap();
        assert_eq!(point.kind, SentKind::Distribution);
        assert_eq!(point.timestamp, Some(UnixTimestamp::from_secs(1_700_000_040)));
        assert_eq!(
            point.centroids,
            vec![
                Centroid::new(1.0, 1),
                Centroid::new(2.0, 1),
                Centroid::new(3.0, 1)
            ]
        );
        assert_eq!(
            point.granularities.into_iter().collect::<Vec<_>>(),
            vec![HistogramGranularity::Minute]
        );

        f.sender.take();
        f.reporter.report();
        assert!(f.sender.points().is_empty());
    }

    #[test]
    fn test_compressed_histogram_per_minute() {
        let f = fixture(ReporterConfig::builder());
        let histogram = f.registry.compressed_histogram("latency").unwrap();
        histogram.update(1.0);
        f.clock.advance(Duration::from_secs(60));
        histogram.update(2.0);
        histogram.update(2.0);

        f.reporter.report();
        let points = f.sender.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 1.0);
        assert_eq!(points[1].value, 2.0);
        assert_eq!(
            points[1].timestamp,
            Some(UnixTimestamp::from_secs(1_700_000_100))
        );
    }

    #[test]
    fn test_compressed_histogram_snapshot_mode() {
        let f = fixture(ReporterConfig::builder().ignore_empty_histograms(true));
        let histogram = f
            .registry
            .compressed_histogram_with("latency", |clock| {
                CompressedHistogram::with_clock(clock).with_snapshot_mode(true)
            })
            .unwrap();
        histogram.update(4.0);

        f.reporter.report();
        assert_eq!(f.sender.value("latency.count"), Some(1.0));
        assert_eq!(f.sender.value("latency.max"), Some(4.0));

        f.sender.take();
        f.reporter.report();
        assert_eq!(values(&f.sender), vec![("latency.count".to_owned(), 0.0)]);
    }

    #[test]
    fn test_timer() {
        let f = fixture(
            ReporterConfig::builder()
                .report_histogram_sum(true)
                .disabled_attributes([
                    MetricAttribute::P95,
                    MetricAttribute::P98,
                    MetricAttribute::P99,
                    MetricAttribute::P999,
                ]),
        );
        let timer = f.registry.timer("db.query").unwrap();
        for millis in [10, 20, 30] {
            timer.update(Duration::from_millis(millis));
        }
        f.clock.advance(Duration::from_secs(3));

        f.reporter.report();
        insta::assert_debug_snapshot!(values(&f.sender), @r###"
        [
            (
                "db.query.max",
                30.0,
            ),
            (
                "db.query.mean",
                20.0,
            ),
            (
                "db.query.min",
                10.0,
            ),
            (
                "db.query.sum",
                60.0,
            ),
            (
                "db.query.stddev",
                10.0,
            ),
            (
                "db.query.p50",
                20.0,
            ),
            (
                "db.query.p75",
                30.0,
            ),
            (
                "db.query.count",
                3.0,
            ),
            (
                "db.query.m1_rate",
                0.0,
            ),
            (
                "db.query.m5_rate",
                0.0,
            ),
            (
                "db.query.m15_rate",
                0.0,
            ),
            (
                "db.query.mean_rate",
                1.0,
            ),
        ]
        "###);
    }

    #[test]
    fn test_timer_custom_units() {
        let f = fixture(ReporterConfig::builder());
        f.registry
            .timer_with("batch", |clock| {
                Timer::with_clock(clock)
                    .with_duration_unit(TimeUnit::Seconds)
                    .with_rate_unit(TimeUnit::Minutes)
            })
            .unwrap()
            .update(Duration::from_secs(2));
        f.clock.advance(Duration::from_secs(60));

        f.reporter.report();
        assert_eq!(f.sender.value("batch.max"), Some(2.0));
        assert_eq!(f.sender.value("batch.mean_rate"), Some(1.0));
    }

    #[test]
    fn test_flushing_timer() {
        let f = fixture(ReporterConfig::builder());
        let timer = f.registry.timer_with("batch", Timer::flushing).unwrap();
        timer.update(Duration::from_millis(7));

        f.reporter.report();
        assert_eq!(f.sender.value("batch.max"), Some(7.0));

        f.sender.take();
        f.reporter.report();
        assert_eq!(f.sender.value("batch.max"), Some(0.0));
        assert_eq!(f.sender.value("batch.count"), Some(1.0));
    }

    #[test]
    fn test_meter_rate_unit() {
        let f = fixture(ReporterConfig::builder());
        f.registry
            .meter_with_rate_unit("events", TimeUnit::Minutes)
            .unwrap()
            .mark_n(30);
        f.clock.advance(Duration::from_secs(60));

        f.reporter.report();
        assert_eq!(f.sender.value("events.count"), Some(30.0));
        assert_eq!(f.sender.value("events.mean_rate"), Some(30.0));
    }

    #[test]
    fn test_code_mapper() {
        let f = fixture(
            ReporterConfig::builder()
                .code_mapper(|_: &Metric, code: &str| code.to_uppercase()),
        );
        f.registry.counter("requests").unwrap();
        f.registry.gauge("size", || 1).unwrap();

        f.reporter.report();
        assert_eq!(f.sender.names(), vec!["size", "requests.COUNT"]);
    }

    #[test]
    fn test_code_mapper_names_gauges() {
        let f = fixture(ReporterConfig::builder().code_mapper(
            |metric: &Metric, code: &str| match (metric.kind(), code) {
                (MetricKind::Gauge, "") => "value".to_owned(),
                _ => code.to_owned(),
            },
        ));
        f.registry.gauge("size", || 1).unwrap();
        f.registry.compressed_histogram("latency").unwrap().update(3.0);

        f.reporter.report();
        assert_eq!(f.sender.names(), vec!["size.value", "latency"]);
    }

    #[test]
    fn test_send_error_aborts_cycle() {
        let f = fixture_with_sender(ReporterConfig::builder(), CapturingSender::new().fail_after(1));
        f.registry.counter("a").unwrap();
        f.registry.counter("b").unwrap();
        f.registry.counter("c").unwrap();

        f.reporter.report();
        assert_eq!(f.sender.names(), vec!["a.count"]);
        assert_eq!(f.sender.close_count(), 1);
        assert_eq!(f.reporter.failure_count(), 1);
        assert_eq!(f.reporter.state(), ReporterState::Idle);

        // The next cycle starts over.
        f.reporter.report();
        assert_eq!(f.reporter.failure_count(), 2);
        assert_eq!(f.sender.close_count(), 2);
    }

    #[test]
    fn test_stop_closes_sender() {
        let f = fixture(ReporterConfig::builder());
        f.registry.counter("requests").unwrap();

        f.reporter.stop();
        assert_eq!(f.reporter.state(), ReporterState::Stopped);
        assert_eq!(f.sender.close_count(), 1);

        f.reporter.report();
        assert!(f.sender.points().is_empty());
    }

    #[test]
    fn test_stop_logs_close_error() {
        let f = fixture_with_sender(ReporterConfig::builder(), CapturingSender::new().fail_on_close());

        f.reporter.stop();
        assert_eq!(f.reporter.state(), ReporterState::Stopped);
        assert_eq!(f.reporter.failure_count(), 1);
    }

    #[test]
    fn test_runtime_metrics() {
        let f = fixture(ReporterConfig::builder().include_runtime_metrics(true));
        f.clock.advance(Duration::from_secs(5));

        f.reporter.report();
        assert_eq!(f.sender.value("runtime.uptime"), Some(5_000.0));
        assert_eq!(
            f.sender.value("runtime.current_time"),
            Some((START_MILLIS + 5_000) as f64)
        );
    }

    #[test]
    fn test_runtime_metrics_conflict() {
        tally_log::init_test!();

        let clock = Arc::new(ManualClock::at_millis(START_MILLIS));
        let registry = Arc::new(Registry::with_clock(clock.clone()));
        registry.counter(UPTIME_GAUGE).unwrap().inc();

        let config = ReporterConfig::builder()
            .include_runtime_metrics(true)
            .clock(clock)
            .build();
        let _reporter = Reporter::new(registry.clone(), Arc::new(CapturingSender::new()), config);

        assert!(matches!(registry.get(UPTIME_GAUGE), Some(Metric::Counter(_))));
        assert!(matches!(registry.get(CURRENT_TIME_GAUGE), Some(Metric::Gauge(_))));
    }
}
