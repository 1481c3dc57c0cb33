//! One collection pass over all active domains.
use crate::{
    error::Result,
    hypervisor::{Connection, DomainHandle, Hypervisor},
    labels::{LabelExtractor, LabelMap},
    metrics::MetricSet,
    stats::{emit_domain, DomainIdentity, EmitOptions, StatsTree},
};

#[derive(Clone, Debug, Default)]
pub struct CollectorConfig {
    pub uri: Option<String>,
    pub label_map: Option<LabelMap>,
    pub options: EmitOptions,
}

#[derive(Debug)]
pub struct Collector<H> {
    hypervisor: H,
    config: CollectorConfig,
}

impl<H: Hypervisor> Collector<H> {
    pub fn new(hypervisor: H, config: CollectorConfig) -> Self {
        Self { hypervisor, config }
    }

    /// Connect to the hypervisor and gather the metrics of every active
    /// domain. Any failure aborts the whole pass.
    pub fn collect(&self) -> Result<MetricSet> {
        tracing::info!("Collecting metrics");
        tracing::info!(
            "Connecting to libvirt at uri {}",
            self.config.uri.as_deref().unwrap_or("<default>")
        );

        let connection = self.hypervisor.open(self.config.uri.as_deref())?;
        let result = self.collect_from(&connection);

        tracing::info!("Closing libvirt connection");
        if let Err(e) = connection.close() {
            tracing::warn!("Unable to close connection: {e}");
        }

        result
    }

    fn identity(
        &self,
        domain: &impl DomainHandle,
        labels: Option<&LabelExtractor<'_>>,
    ) -> Result<DomainIdentity> {
        let mut identity = DomainIdentity::new(domain.uuid()?, domain.name()?);

        if let Some(labels) = labels {
            identity.extra_labels = labels.extract(&domain.xml_desc()?)?;
        }

        Ok(identity)
    }

    fn collect_from(&self, connection: &H::Connection) -> Result<MetricSet> {
        let domains = connection.all_active_domain_stats()?;
        tracing::debug!("Found stats for {} domains", domains.len());

        let labels = self
            .config
            .label_map
            .as_ref()
            .map(LabelMap::compile)
            .transpose()?;
        let mut metrics = MetricSet::default();

        for (domain, stats) in &domains {
            let identity = self.identity(domain, labels.as_ref())?;
            tracing::debug!(
                "Collecting metrics for dom {} name {}",
                identity.uuid,
                identity.name
            );

            let tree = StatsTree::build(stats.iter().map(|(key, value)| (key.as_ref(), value)));
            metrics.extend_records(emit_domain(&tree, &identity, &self.config.options));
        }

        Ok(metrics)
    }
}
