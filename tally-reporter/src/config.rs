//! Configuration of the [`Reporter`](crate::Reporter).
//!
//! A [`ReporterConfig`] is assembled with [`ReporterConfig::builder`] and cannot be changed once
//! the reporter has been built. The serializable subset of the options is available as
//! [`ReporterConfigValues`], which can be loaded from a YAML or JSON file via [`Config`].

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_common::{Clock, SystemClock};
use tally_log::LogConfig;
use tally_metrics::{AllMetrics, Metric, MetricFilter, Tags};

use crate::attribute::{HistogramGranularity, MetricAttribute};

/// The default source reported with every point.
pub const DEFAULT_SOURCE: &str = "tally";

/// The default reporting interval in seconds.
const DEFAULT_INTERVAL_SECS: u64 = 60;

/// The tag value used for application tags that are not set.
const NULL_TAG_VALUE: &str = "none";

/// Maps the attribute code of a metric to the suffix used in the point name.
///
/// The default mapping keeps the code unchanged. Any closure over metric and code is a mapper:
///
/// ```
/// use tally_reporter::ReporterConfig;
///
/// let config = ReporterConfig::builder()
///     .code_mapper(|_: &tally_metrics::Metric, code: &str| code.to_uppercase())
///     .build();
/// ```
pub trait AttributeCodeMapper: Send + Sync {
    /// Returns the suffix for the given attribute code of the metric.
    fn map(&self, metric: &Metric, code: &str) -> String;
}

impl<F> AttributeCodeMapper for F
where
    F: Fn(&Metric, &str) -> String + Send + Sync,
{
    fn map(&self, metric: &Metric, code: &str) -> String {
        self(metric, code)
    }
}

/// Metadata about the application that emits the metrics.
///
/// Application tags are added to the point tags of the reporter under the keys `application`,
/// `service`, `cluster` and `shard`, together with all custom tags.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ApplicationTags {
    /// The name of the application.
    pub application: String,
    /// The name of the service within the application.
    pub service: String,
    /// The cluster the service runs in, reported as `"none"` if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// The shard of the service, reported as `"none"` if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<String>,
    /// Additional tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_tags: Tags,
}

impl ApplicationTags {
    /// Creates application tags without cluster, shard and custom tags.
    pub fn new(application: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            service: service.into(),
            cluster: None,
            shard: None,
            custom_tags: Tags::new(),
        }
    }

    /// Sets the cluster.
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Sets the shard.
    pub fn shard(mut self, shard: impl Into<String>) -> Self {
        self.shard = Some(shard.into());
        self
    }

    /// Adds a custom tag.
    pub fn custom_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_tags.insert(key.into(), value.into());
        self
    }

    /// Returns the point tags for these application tags.
    pub fn to_point_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("application".to_owned(), self.application.clone());
        tags.insert("service".to_owned(), self.service.clone());
        tags.insert(
            "cluster".to_owned(),
            self.cluster.as_deref().unwrap_or(NULL_TAG_VALUE).to_owned(),
        );
        tags.insert(
            "shard".to_owned(),
            self.shard.as_deref().unwrap_or(NULL_TAG_VALUE).to_owned(),
        );
        tags.extend(self.custom_tags.clone());
        tags
    }
}

/// The immutable configuration of a [`Reporter`](crate::Reporter).
#[derive(Clone)]
pub struct ReporterConfig {
    source: String,
    prefix: Option<String>,
    filter: Arc<dyn MetricFilter>,
    point_tags: Tags,
    disabled_attributes: BTreeSet<MetricAttribute>,
    histogram_granularities: BTreeSet<HistogramGranularity>,
    include_runtime_metrics: bool,
    report_histogram_sum: bool,
    ignore_zero_counters: bool,
    ignore_empty_histograms: bool,
    code_mapper: Option<Arc<dyn AttributeCodeMapper>>,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl ReporterConfig {
    /// Returns a builder with default options.
    pub fn builder() -> ReporterConfigBuilder {
        ReporterConfigBuilder::default()
    }

    /// The source reported with every point.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The prefix of all point names.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The filter selecting reported metrics.
    pub fn filter(&self) -> &dyn MetricFilter {
        self.filter.as_ref()
    }

    /// Tags added to every point, including application tags.
    pub fn point_tags(&self) -> &Tags {
        &self.point_tags
    }

    /// Attributes that are not reported for meters, timers and histograms.
    pub fn disabled_attributes(&self) -> &BTreeSet<MetricAttribute> {
        &self.disabled_attributes
    }

    /// Returns `true` if the attribute is reported.
    pub fn is_enabled(&self, attribute: MetricAttribute) -> bool {
        !self.disabled_attributes.contains(&attribute)
    }

    /// The granularities requested for distributions.
    pub fn histogram_granularities(&self) -> &BTreeSet<HistogramGranularity> {
        &self.histogram_granularities
    }

    /// Whether process runtime gauges are registered.
    pub fn include_runtime_metrics(&self) -> bool {
        self.include_runtime_metrics
    }

    /// Whether the sum of histograms and timers is reported.
    pub fn report_histogram_sum(&self) -> bool {
        self.report_histogram_sum
    }

    /// Whether counters at zero are skipped.
    pub fn ignore_zero_counters(&self) -> bool {
        self.ignore_zero_counters
    }

    /// Whether empty histograms only report their count.
    pub fn ignore_empty_histograms(&self) -> bool {
        self.ignore_empty_histograms
    }

    /// Maps an attribute code through the configured mapper.
    pub fn map_code(&self, metric: &Metric, code: &str) -> String {
        match &self.code_mapper {
            Some(mapper) => mapper.map(metric, code),
            None => code.to_owned(),
        }
    }

    /// The interval between two reporting cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The clock used for point timestamps and runtime gauges.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for ReporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterConfig")
            .field("source", &self.source)
            .field("prefix", &self.prefix)
            .field("point_tags", &self.point_tags)
            .field("disabled_attributes", &self.disabled_attributes)
            .field("histogram_granularities", &self.histogram_granularities)
            .field("include_runtime_metrics", &self.include_runtime_metrics)
            .field("report_histogram_sum", &self.report_histogram_sum)
            .field("ignore_zero_counters", &self.ignore_zero_counters)
            .field("ignore_empty_histograms", &self.ignore_empty_histograms)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Builds a [`ReporterConfig`].
///
/// Point tags and application tags are merged into one map in the order of the calls, so later
/// calls override earlier ones.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tally_reporter::{ApplicationTags, MetricAttribute, ReporterConfig};
///
/// let config = ReporterConfig::builder()
///     .source("web-1")
///     .prefix("acme")
///     .application_tags(ApplicationTags::new("shop", "checkout"))
///     .point_tag("env", "prod")
///     .disable_attribute(MetricAttribute::P999)
///     .interval(Duration::from_secs(30))
///     .build();
///
/// assert_eq!(config.point_tags()["cluster"], "none");
/// assert!(!config.is_enabled(MetricAttribute::P999));
/// ```
pub struct ReporterConfigBuilder {
    config: ReporterConfig,
}

impl ReporterConfigBuilder {
    /// Sets the source reported with every point. Defaults to `"tally"`.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.config.source = source.into();
        self
    }

    /// Prefixes all point names. Defaults to no prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    /// Only reports metrics accepted by the filter. Defaults to all metrics.
    pub fn filter(mut self, filter: impl MetricFilter + 'static) -> Self {
        self.config.filter = Arc::new(filter);
        self
    }

    /// Adds a tag to every point.
    pub fn point_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.point_tags.insert(key.into(), value.into());
        self
    }

    /// Adds tags to every point.
    pub fn point_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config
            .point_tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Adds application tags to every point.
    pub fn application_tags(mut self, tags: ApplicationTags) -> Self {
        self.config.point_tags.extend(tags.to_point_tags());
        self
    }

    /// Disables an attribute for meters, timers and histograms.
    pub fn disable_attribute(mut self, attribute: MetricAttribute) -> Self {
        self.config.disabled_attributes.insert(attribute);
        self
    }

    /// Disables attributes for meters, timers and histograms.
    pub fn disabled_attributes(mut self, attributes: impl IntoIterator<Item = MetricAttribute>) -> Self {
        self.config.disabled_attributes.extend(attributes);
        self
    }

    /// Requests a granularity for distributions of compressed histograms.
    pub fn histogram_granularity(mut self, granularity: HistogramGranularity) -> Self {
        self.config.histogram_granularities.insert(granularity);
        self
    }

    /// Requests granularities for distributions of compressed histograms.
    pub fn histogram_granularities(
        mut self,
        granularities: impl IntoIterator<Item = HistogramGranularity>,
    ) -> Self {
        self.config.histogram_granularities.extend(granularities);
        self
    }

    /// Registers process runtime gauges when the reporter is built.
    pub fn include_runtime_metrics(mut self, include: bool) -> Self {
        self.config.include_runtime_metrics = include;
        self
    }

    /// Reports the sum of histograms and timers.
    pub fn report_histogram_sum(mut self, report: bool) -> Self {
        self.config.report_histogram_sum = report;
        self
    }

    /// Skips counters whose count is zero.
    pub fn ignore_zero_counters(mut self, ignore: bool) -> Self {
        self.config.ignore_zero_counters = ignore;
        self
    }

    /// Reports only the count of empty histograms.
    pub fn ignore_empty_histograms(mut self, ignore: bool) -> Self {
        self.config.ignore_empty_histograms = ignore;
        self
    }

    /// Maps attribute codes to custom point name suffixes.
    pub fn code_mapper(mut self, mapper: impl AttributeCodeMapper + 'static) -> Self {
        self.config.code_mapper = Some(Arc::new(mapper));
        self
    }

    /// Sets the interval between two reporting cycles. Defaults to one minute.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Sets the clock for point timestamps and runtime gauges.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.clock = clock;
        self
    }

    /// Returns the finished configuration.
    pub fn build(self) -> ReporterConfig {
        self.config
    }
}

impl Default for ReporterConfigBuilder {
    fn default() -> Self {
        Self {
            config: ReporterConfig {
                source: DEFAULT_SOURCE.to_owned(),
                prefix: None,
                filter: Arc::new(AllMetrics),
                point_tags: Tags::new(),
                disabled_attributes: BTreeSet::new(),
                histogram_granularities: BTreeSet::new(),
                include_runtime_metrics: false,
                report_histogram_sum: false,
                ignore_zero_counters: false,
                ignore_empty_histograms: false,
                code_mapper: None,
                interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
                clock: SystemClock::shared(),
            },
        }
    }
}

/// The serializable options of a [`ReporterConfig`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReporterConfigValues {
    /// The source reported with every point.
    pub source: String,
    /// The prefix of all point names.
    pub prefix: Option<String>,
    /// Tags added to every point.
    pub point_tags: Tags,
    /// Application metadata added to every point.
    ///
    /// Explicit point tags take precedence over application tags.
    pub application_tags: Option<ApplicationTags>,
    /// Attributes that are not reported for meters, timers and histograms.
    pub disabled_attributes: BTreeSet<MetricAttribute>,
    /// The granularities requested for distributions.
    pub histogram_granularities: BTreeSet<HistogramGranularity>,
    /// Registers process runtime gauges.
    pub include_runtime_metrics: bool,
    /// Reports the sum of histograms and timers.
    pub report_histogram_sum: bool,
    /// Skips counters whose count is zero.
    pub ignore_zero_counters: bool,
    /// Reports only the count of empty histograms.
    pub ignore_empty_histograms: bool,
    /// The interval between two reporting cycles in seconds.
    pub interval: u64,
}

impl ReporterConfigValues {
    /// Returns a builder initialized with these values.
    ///
    /// Programmatic options, such as the filter or the code mapper, can be added to the builder.
    pub fn into_builder(self) -> ReporterConfigBuilder {
        let mut builder = ReporterConfig::builder()
            .source(self.source)
            .disabled_attributes(self.disabled_attributes)
            .histogram_granularities(self.histogram_granularities)
            .include_runtime_metrics(self.include_runtime_metrics)
            .report_histogram_sum(self.report_histogram_sum)
            .ignore_zero_counters(self.ignore_zero_counters)
            .ignore_empty_histograms(self.ignore_empty_histograms)
            .interval(Duration::from_secs(self.interval));

        if let Some(prefix) = self.prefix {
            builder = builder.prefix(prefix);
        }
        if let Some(tags) = self.application_tags {
            builder = builder.application_tags(tags);
        }

        builder.point_tags(self.point_tags)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::invalid("reporter.interval", "must be positive"));
        }
        if self.source.is_empty() {
            return Err(ConfigError::invalid("reporter.source", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for ReporterConfigValues {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_owned(),
            prefix: None,
            point_tags: Tags::new(),
            application_tags: None,
            disabled_attributes: BTreeSet::new(),
            histogram_granularities: BTreeSet::new(),
            include_runtime_metrics: false,
            report_histogram_sum: false,
            ignore_zero_counters: false,
            ignore_empty_histograms: false,
            interval: DEFAULT_INTERVAL_SECS,
        }
    }
}

/// Defines the source of a config error.
#[derive(Debug)]
enum ConfigErrorSource {
    /// An error occurring independently.
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error in the value of a field.
    Field(&'static str),
}

/// Indicates config related errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config file")]
    BadJson,
    /// Invalid config value.
    #[error("invalid config value")]
    InvalidValue,
}

/// An error loading the configuration.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    inner: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: Some(Box::new(inner)),
        }
    }

    fn invalid(field: &'static str, reason: &str) -> Self {
        Self {
            source: ConfigErrorSource::Field(field),
            kind: ConfigErrorKind::InvalidValue,
            inner: Some(reason.into()),
        }
    }

    fn file(mut self, path: &Path) -> Self {
        self.source = ConfigErrorSource::File(path.to_path_buf());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => write!(f, "{}", self.kind),
            ConfigErrorSource::File(path) => write!(f, "{} (file {})", self.kind, path.display()),
            ConfigErrorSource::Field(name) => write!(f, "{} (field {name})", self.kind),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// The file-based configuration: logging and reporter options.
///
/// ```yaml
/// logging:
///   level: debug
/// reporter:
///   source: web-1
///   interval: 30
///   application_tags:
///     application: shop
///     service: checkout
///   disabled_attributes: [p999, m15_rate]
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Configuration of the logging system.
    pub logging: LogConfig,
    /// Serializable reporter options.
    pub reporter: ReporterConfigValues,
}

impl Config {
    /// Loads the configuration from a file.
    ///
    /// Files with a `.json` extension are parsed as JSON, all others as YAML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(path))?;
        let reader = io::BufReader::new(file);

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_reader(reader)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadJson).file(path))?,
            _ => serde_yaml::from_reader(reader)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(path))?,
        };

        config.reporter.validate()?;
        Ok(config)
    }

    /// Parses the configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml))?;
        config.reporter.validate()?;
        Ok(config)
    }
}
