//! Common metrics data structures, mostly modelled after OpenMetrics.
use indexmap::{map::Entry, IndexMap};

/// Top level metric data structure.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct MetricSet {
    pub families: IndexMap<Box<str>, MetricFamily>,
}

/// A family of metrics sharing a [MetricType], keyed by their label set.
#[derive(Clone, PartialEq, Debug)]
pub struct MetricFamily {
    pub metric_type: MetricType,
    pub help: Box<str>,

    pub metrics: IndexMap<Box<[Label]>, MetricValue>,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum MetricType {
    Gauge,
    Info,
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MetricType::Gauge => "Gauge",
            MetricType::Info => "Info",
        })
    }
}

#[derive(Clone, PartialEq, Debug, Eq, Hash)]
pub struct Label(
    /// Label name
    pub Box<str>,
    /// Label value
    pub Box<str>,
);

impl Label {
    pub fn new(name: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
        Self(name.into(), value.into())
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum MetricValue {
    Gauge(NumberValue),
    /// Info metrics always have the value 1, the payload is carried by labels.
    Info,
}

impl MetricValue {
    pub fn get_type(&self) -> MetricType {
        match self {
            Self::Gauge(_) => MetricType::Gauge,
            Self::Info => MetricType::Info,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum NumberValue {
    Double(f64),
    Int64(i64),
}

impl From<i64> for NumberValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u64> for NumberValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::Double(value as f64), Self::Int64)
    }
}

impl From<f64> for NumberValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for NumberValue {
    fn from(value: bool) -> Self {
        Self::Int64(value.into())
    }
}

/// A single labeled value about to be merged into a [MetricSet].
#[derive(Clone, PartialEq, Debug)]
pub struct MetricRecord {
    pub family: Box<str>,
    pub help: Box<str>,
    pub labels: Vec<Label>,
    pub value: MetricValue,
}

impl MetricSet {
    /// Merge a record into its family, creating the family if needed.
    ///
    /// A record with the same family and label set as an existing one
    /// replaces it. A record whose type differs from its family's type is
    /// dropped, the family keeps its type and metrics.
    pub fn insert_record(&mut self, record: MetricRecord) {
        let MetricRecord {
            family,
            help,
            labels,
            value,
        } = record;
        let metric_type = value.get_type();

        let family = match self.families.entry(family) {
            Entry::Occupied(entry) if entry.get().metric_type != metric_type => {
                tracing::warn!(
                    "Metric type conflict on {} ({} != {metric_type}), dropping {labels:?}",
                    entry.key(),
                    entry.get().metric_type
                );
                return;
            }
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(MetricFamily {
                metric_type,
                help,
                metrics: IndexMap::new(),
            }),
        };

        family.metrics.insert(labels.into_boxed_slice(), value);
    }

    pub fn extend_records(&mut self, records: impl IntoIterator<Item = MetricRecord>) {
        records
            .into_iter()
            .for_each(|record| self.insert_record(record));
    }

    /// Total number of metrics across all families.
    pub fn len(&self) -> usize {
        self.families.values().map(|f| f.metrics.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
