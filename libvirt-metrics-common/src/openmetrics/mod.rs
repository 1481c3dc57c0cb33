//! OpenMetrics text export.
pub mod text;

pub use text::{write_metrics_set_text, OPENMETRICS_TEXT_CONTENT_TYPE};

/// Render a metric set into an OpenMetrics text exposition.
pub fn render(metrics: &crate::metrics::MetricSet) -> String {
    let mut output = String::new();

    // Writing into a String never fails.
    text::write_metrics_set_text(&mut output, metrics).ok();

    output
}

#[cfg(test)]
mod test;
