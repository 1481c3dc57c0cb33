//! Metric records generation from a [StatsTree].
use uuid::Uuid;

use super::{EntityBundle, StatsTree};
use crate::{
    metrics::{Label, MetricRecord, MetricValue, NumberValue},
    naming::sanitize,
};

/// Identity of a domain, attached to all of its metrics.
#[derive(Clone, Debug, PartialEq)]
pub struct DomainIdentity {
    pub uuid: Uuid,
    pub name: Box<str>,
    /// Labels extracted from the domain XML description.
    pub extra_labels: Vec<Label>,
}

impl DomainIdentity {
    pub fn new(uuid: Uuid, name: impl Into<Box<str>>) -> Self {
        Self {
            uuid,
            name: name.into(),
            extra_labels: vec![],
        }
    }

    fn uuid_label(&self) -> Label {
        Label::new("uuid", self.uuid.as_hyphenated().to_string())
    }
}

#[derive(Clone, Debug, Default)]
pub struct EmitOptions {
    /// Add a `domain` label with the domain name to gauges.
    pub domain_name_label: bool,
    /// Labels added to every record.
    pub constant_labels: Vec<Label>,
}

struct Emitter<'a> {
    identity: &'a DomainIdentity,
    options: &'a EmitOptions,
    records: Vec<MetricRecord>,
}

impl Emitter<'_> {
    fn push(&mut self, family: String, help: String, mut labels: Vec<Label>, value: MetricValue) {
        for label in &self.options.constant_labels {
            if labels.iter().any(|Label(name, _)| name == &label.0) {
                tracing::debug!("Constant label {} shadowed on {family}", label.0);
                continue;
            }

            labels.push(label.clone());
        }

        self.records.push(MetricRecord {
            family: family.into(),
            help: help.into(),
            labels,
            value,
        });
    }

    fn gauge_labels(&self, mut labels: Vec<Label>) -> Vec<Label> {
        if self.options.domain_name_label {
            labels.push(Label::new("domain", self.identity.name.clone()));
        }

        labels
    }

    fn active(&mut self) {
        let mut labels = vec![
            self.identity.uuid_label(),
            Label::new("name", self.identity.name.clone()),
        ];

        for label in &self.identity.extra_labels {
            if labels.iter().any(|Label(name, _)| name == &label.0) {
                tracing::warn!("Ignoring XML label {}: reserved name", label.0);
                continue;
            }

            labels.push(label.clone());
        }

        self.push(
            sanitize("active"),
            "information about libvirt domain".into(),
            labels,
            MetricValue::Info,
        );
    }

    fn scalar(&mut self, name: &str, value: NumberValue) {
        let labels = self.gauge_labels(vec![self.identity.uuid_label()]);

        self.push(
            sanitize(name),
            format!("libvirt {name}"),
            labels,
            MetricValue::Gauge(value),
        );
    }

    fn bundle(&mut self, namespace: &str, index: &str, bundle: &EntityBundle) {
        if bundle.is_empty() {
            return;
        }

        let unit = Label::new("unit", index);
        let name = bundle
            .name()
            .map(|name| name.to_label_value())
            .unwrap_or_else(|| format!("{namespace}{index}").into());

        self.push(
            sanitize(namespace),
            format!("information about libvirt {namespace}"),
            vec![
                self.identity.uuid_label(),
                unit.clone(),
                Label("name".into(), name),
            ],
            MetricValue::Info,
        );

        for (sub_name, value) in bundle.metrics() {
            let Some(value) = value.as_number() else {
                tracing::debug!(
                    "dom {} ns {namespace} unit {index}: skipping non-numeric metric {sub_name}",
                    self.identity.uuid
                );
                continue;
            };

            let metric_name = format!("{namespace}_{sub_name}");
            let labels = self.gauge_labels(vec![self.identity.uuid_label(), unit.clone()]);

            self.push(
                sanitize(&metric_name),
                format!("libvirt {metric_name}"),
                labels,
                MetricValue::Gauge(value),
            );
        }
    }
}

/// Generate all the records of a domain: its `active` info record, one gauge
/// per scalar, and for each entity an info record followed by its gauges.
pub fn emit_domain(
    tree: &StatsTree,
    identity: &DomainIdentity,
    options: &EmitOptions,
) -> Vec<MetricRecord> {
    let mut emitter = Emitter {
        identity,
        options,
        records: Vec::with_capacity(1 + tree.scalars.len() + tree.bundle_count()),
    };

    emitter.active();

    for (name, &value) in &tree.scalars {
        emitter.scalar(name, value);
    }

    for (namespace, index, bundle) in tree.bundles() {
        emitter.bundle(namespace, index, bundle);
    }

    emitter.records
}
