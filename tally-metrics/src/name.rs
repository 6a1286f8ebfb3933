//! Tagged metric names and their flat string encoding.
//!
//! A [`TaggedMetricName`] is encoded into a single string so that it can be used as a key in the
//! [`Registry`](crate::Registry):
//!
//! ```text
//! <group>|<name>|<key1>|<value1>|<key2>|<value2>...
//! ```
//!
//! Tags are written in lexicographic key order. The separator is not escaped, so fields containing
//! `|` do not survive a round-trip.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;

/// Separates group, name and tags in an encoded metric name.
pub const NAME_SEPARATOR: char = '|';

/// A map of tag keys to tag values, sorted by key.
pub type Tags = BTreeMap<String, String>;

/// An error returned by [`make_tags`] if the items do not form key-value pairs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("tags must be given as key-value pairs, got {count} items")]
pub struct InvalidTagsError {
    /// The number of items that were supplied.
    pub count: usize,
}

/// An error returned by [`TaggedMetricName::decode`] for names without any content.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("encoded metric name is empty")]
pub struct ParseMetricNameError(());

/// Builds a tag map from a flat list of alternating keys and values.
///
/// Pairs where the key or the value is absent are dropped. Later pairs override earlier pairs with
/// the same key.
///
/// # Example
///
/// ```
/// let tags = tally_metrics::make_tags(&[Some("env"), Some("prod"), Some("shard"), None]).unwrap();
/// assert_eq!(tags.len(), 1);
/// assert_eq!(tags["env"], "prod");
///
/// assert!(tally_metrics::make_tags(&[Some("env")]).is_err());
/// ```
pub fn make_tags(items: &[Option<&str>]) -> Result<Tags, InvalidTagsError> {
    if items.len() % 2 != 0 {
        return Err(InvalidTagsError { count: items.len() });
    }

    let tags = items
        .iter()
        .tuples()
        .filter_map(|(key, value)| Some(((*key)?.to_owned(), (*value)?.to_owned())))
        .collect();

    Ok(tags)
}

/// A metric name consisting of a group, a name and a set of point tags.
///
/// Tagged names are immutable. Equality and hashing are structural, and tags are always kept in
/// lexicographic key order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TaggedMetricName {
    group: String,
    name: String,
    tags: Tags,
}

impl TaggedMetricName {
    /// Creates a tagged name without tags.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            tags: Tags::new(),
        }
    }

    /// Creates a tagged name from an iterator of tag pairs.
    pub fn with_tags<I, K, V>(group: impl Into<String>, name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            group: group.into(),
            name: name.into(),
            tags: tags
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Creates a tagged name from a flat list of alternating tag keys and values.
    ///
    /// See [`make_tags`] for how the items are interpreted.
    pub fn from_tag_values(
        group: impl Into<String>,
        name: impl Into<String>,
        items: &[Option<&str>],
    ) -> Result<Self, InvalidTagsError> {
        Ok(Self {
            group: group.into(),
            name: name.into(),
            tags: make_tags(items)?,
        })
    }

    /// Returns the group of the metric, which may be empty.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns the name of the metric within its group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the point tags of the metric.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Encodes this name into its flat string representation.
    pub fn encode(&self) -> String {
        let mut encoded = String::with_capacity(self.group.len() + self.name.len() + 1);
        encoded.push_str(&self.group);
        encoded.push(NAME_SEPARATOR);
        encoded.push_str(&self.name);

        for (key, value) in &self.tags {
            encoded.push(NAME_SEPARATOR);
            encoded.push_str(key);
            encoded.push(NAME_SEPARATOR);
            encoded.push_str(value);
        }

        encoded
    }

    /// Decodes a flat string into a tagged name.
    ///
    /// Empty trailing fields are discarded before interpretation. A single remaining field is the
    /// name with an empty group. A trailing tag key without a value is dropped.
    pub fn decode(encoded: &str) -> Result<Self, ParseMetricNameError> {
        let mut parts: Vec<&str> = encoded.split(NAME_SEPARATOR).collect();
        while parts.last().is_some_and(|part| part.is_empty()) {
            parts.pop();
        }

        match parts.as_slice() {
            [] => Err(ParseMetricNameError(())),
            [name] => Ok(Self::new("", *name)),
            [group, name, tags @ ..] => Ok(Self::with_tags(
                *group,
                *name,
                tags.iter().copied().tuples::<(&str, &str)>(),
            )),
        }
    }
}

impl fmt::Display for TaggedMetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for TaggedMetricName {
    type Err = ParseMetricNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Conversion into the string key under which a metric is registered.
///
/// Implemented for plain strings and for [`TaggedMetricName`], which is
/// [encoded](TaggedMetricName::encode).
pub trait IntoMetricKey {
    /// Returns the registry key.
    fn into_metric_key(self) -> String;
}

impl IntoMetricKey for &str {
    fn into_metric_key(self) -> String {
        self.to_owned()
    }
}

impl IntoMetricKey for String {
    fn into_metric_key(self) -> String {
        self
    }
}

impl IntoMetricKey for &String {
    fn into_metric_key(self) -> String {
        self.clone()
    }
}

impl IntoMetricKey for &TaggedMetricName {
    fn into_metric_key(self) -> String {
        self.encode()
    }
}

impl IntoMetricKey for TaggedMetricName {
    fn into_metric_key(self) -> String {
        self.encode()
    }
}
