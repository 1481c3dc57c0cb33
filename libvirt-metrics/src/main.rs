mod server;

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use clap::{ArgAction, Parser};

use libvirt_metrics_common::{
    collector::{Collector, CollectorConfig},
    hypervisor::{snapshot::SnapshotHypervisor, Hypervisor},
    labels::LabelMap,
    metrics::Label,
    stats::EmitOptions,
};

/// OpenMetrics exporter for libvirt domain statistics.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// libvirt connection URI (libvirt default when unset).
    #[arg(short, long)]
    uri: Option<String>,

    /// Address to bind the HTTP server to.
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    listen: IpAddr,

    /// Port to bind the HTTP server to.
    #[arg(short, long, default_value_t = 5111)]
    port: u16,

    /// YAML file mapping label names to XPath expressions on the domain XML.
    #[arg(short = 'x', long)]
    labels_from_xml: Option<PathBuf>,

    /// Increase logging verbosity (-v: info, -vv: debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Constant label added to every metric, as KEY=VALUE.
    #[arg(long = "label", value_parser = parse_label)]
    labels: Vec<Label>,

    /// Add the domain name as a `domain` label on gauges.
    #[arg(long)]
    domain_name_label: bool,

    /// Read domain statistics from a JSON snapshot instead of libvirt.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print one collection to stdout and exit.
    #[arg(long)]
    once: bool,
}

fn parse_label(raw: &str) -> Result<Label, String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok(Label::new(name, value)),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    }
}

async fn run<H>(args: &Args, collector: Collector<H>) -> anyhow::Result<()>
where
    H: Hypervisor + Send + Sync + 'static,
{
    let state = Arc::new(server::ScrapeState::new(collector));

    if args.once {
        print!("{}", server::scrape(&state).await?);
        return Ok(());
    }

    server::serve(SocketAddr::new(args.listen, args.port), state).await
}

#[cfg(feature = "libvirt")]
async fn run_libvirt(args: &Args, config: CollectorConfig) -> anyhow::Result<()> {
    use libvirt_metrics_common::hypervisor::libvirt::LibvirtHypervisor;

    run(args, Collector::new(LibvirtHypervisor, config)).await
}

#[cfg(not(feature = "libvirt"))]
async fn run_libvirt(_: &Args, _: CollectorConfig) -> anyhow::Result<()> {
    anyhow::bail!("built without libvirt support, use --snapshot")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let text_subscriber = tracing_subscriber::fmt()
        .with_ansi(true)
        .with_max_level(log_level(args.verbose))
        .compact()
        .finish();

    tracing::subscriber::set_global_default(text_subscriber)?;

    let label_map = match &args.labels_from_xml {
        Some(path) => Some(
            LabelMap::load(path)
                .with_context(|| format!("loading label map {}", path.display()))?,
        ),
        None => None,
    };

    let config = CollectorConfig {
        uri: args.uri.clone(),
        label_map,
        options: EmitOptions {
            domain_name_label: args.domain_name_label,
            constant_labels: args.labels.clone(),
        },
    };

    match &args.snapshot {
        Some(path) => run(&args, Collector::new(SnapshotHypervisor::new(path), config)).await,
        None => run_libvirt(&args, config).await,
    }
}
