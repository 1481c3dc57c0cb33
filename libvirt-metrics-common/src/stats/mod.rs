//! Reconstruction of the libvirt domain statistics tree.
//!
//! Bulk domain statistics come as a flat mapping of dotted keys, where
//! repeated devices are encoded with a numeric second segment
//! (`block.0.rd.bytes`, `net.1.tx.pkts`, `vcpu.3.time`). [StatsTree]
//! separates the per-domain scalars from those indexed entities.
mod emit;

pub use emit::{emit_domain, DomainIdentity, EmitOptions};

use indexmap::IndexMap;

use crate::{metrics::NumberValue, naming};

/// Reserved sub-key holding the display name of an entity.
pub const NAME_KEY: &str = "name";

/// A raw statistic value, as reported by the hypervisor.
#[derive(Clone, PartialEq, Debug)]
pub enum RawStatValue {
    Number(NumberValue),
    Text(Box<str>),
}

impl RawStatValue {
    pub fn as_number(&self) -> Option<NumberValue> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Textual rendering, used when the value ends up as a label.
    pub fn to_label_value(&self) -> Box<str> {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(NumberValue::Int64(value)) => value.to_string().into(),
            Self::Number(NumberValue::Double(value)) => value.to_string().into(),
        }
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RawStatValue {
                fn from(value: $ty) -> Self {
                    Self::Number(value.into())
                }
            }
        )*
    };
}

impl_from_number!(i64, u64, f64, bool);

impl From<&str> for RawStatValue {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

/// Parsed form of a dotted statistic key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StatKey<'a> {
    /// A domain-level statistic, given by its raw key.
    Scalar(&'a str),
    /// A statistic of the `index`-th entity of `namespace`.
    Indexed {
        namespace: &'a str,
        index: &'a str,
        /// Remaining segments, still dot separated (may be empty).
        rest: &'a str,
    },
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

impl<'a> StatKey<'a> {
    pub fn parse(key: &'a str) -> Self {
        let mut segments = key.splitn(3, '.');

        match (segments.next(), segments.next()) {
            (Some(namespace), Some(index)) if is_index(index) => Self::Indexed {
                namespace,
                index,
                rest: segments.next().unwrap_or_default(),
            },
            _ => Self::Scalar(key),
        }
    }
}

/// Flat scalar name of a non-indexed key.
pub fn scalar_name(key: &str) -> String {
    key.replace(['.', '-'], "_")
}

/// Statistics of one indexed entity (a disk, an interface, a vCPU, ...).
#[derive(Clone, Default, PartialEq, Debug)]
pub struct EntityBundle {
    pub values: IndexMap<Box<str>, RawStatValue>,
}

impl EntityBundle {
    pub fn name(&self) -> Option<&RawStatValue> {
        self.values.get(NAME_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sub-metrics other than the reserved name.
    pub fn metrics(&self) -> impl Iterator<Item = (&str, &RawStatValue)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_ref(), value))
            .filter(|(name, _)| *name != NAME_KEY)
    }
}

/// Per-domain statistics, split into scalars and indexed entities.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct StatsTree {
    pub scalars: IndexMap<Box<str>, NumberValue>,
    /// namespace -> index -> bundle
    pub namespaces: IndexMap<Box<str>, IndexMap<Box<str>, EntityBundle>>,
}

impl StatsTree {
    pub fn build<'a, I>(stats: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a RawStatValue)>,
    {
        let mut tree = Self::default();

        stats
            .into_iter()
            .for_each(|(key, value)| tree.insert(key, value.clone()));

        tree
    }

    pub fn insert(&mut self, key: &str, value: RawStatValue) {
        match StatKey::parse(key) {
            StatKey::Indexed {
                namespace,
                index,
                rest,
            } => {
                if rest.is_empty() {
                    tracing::debug!("Ignoring {key}: no sub-metric under {namespace}.{index}");
                    return;
                }

                let name = naming::join_segments(rest.split('.'));

                self.namespaces
                    .entry(namespace.into())
                    .or_default()
                    .entry(index.into())
                    .or_default()
                    .values
                    .insert(name.into(), value);
            }
            StatKey::Scalar(key) => match value.as_number() {
                Some(number) => {
                    self.scalars.insert(scalar_name(key).into(), number);
                }
                None => tracing::debug!("Skipping non-numeric scalar {key}"),
            },
        }
    }

    pub fn bundles(&self) -> impl Iterator<Item = (&str, &str, &EntityBundle)> {
        self.namespaces.iter().flat_map(|(namespace, entities)| {
            entities
                .iter()
                .map(move |(index, bundle)| (namespace.as_ref(), index.as_ref(), bundle))
        })
    }

    pub fn bundle_count(&self) -> usize {
        self.namespaces.values().map(IndexMap::len).sum()
    }
}
