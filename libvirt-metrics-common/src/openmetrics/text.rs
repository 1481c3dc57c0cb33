use std::fmt::{self, Write};

use crate::metrics::{Label, MetricFamily, MetricSet, MetricType, MetricValue, NumberValue};

pub const OPENMETRICS_TEXT_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

fn metric_type_to_str(metric_type: MetricType) -> &'static str {
    match metric_type {
        MetricType::Gauge => "gauge",
        MetricType::Info => "info",
    }
}

fn escape_help(s: &str) -> String {
    s.replace('\\', r"\\").replace('\n', r"\n")
}

fn escape_label_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());

    for c in s.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str(r"\n"),
            c => out.push(c),
        }
    }

    out
}

/// Replace characters that are invalid in a metric (or label) name by `_`.
fn format_name(s: &str, allow_colon: bool) -> String {
    s.char_indices()
        .map(|(pos, c)| match c {
            'A'..='Z' | 'a'..='z' | '_' => c,
            '0'..='9' if pos != 0 => c,
            ':' if allow_colon => c,
            _ => '_',
        })
        .collect()
}

pub fn write_metrics_set_text<W: Write>(writer: &mut W, metrics: &MetricSet) -> fmt::Result {
    for (name, family) in &metrics.families {
        let name = format_name(name, true);

        write_family(writer, &name, family)?;
    }

    writeln!(writer, "# EOF")
}

fn write_family<W: Write>(writer: &mut W, name: &str, family: &MetricFamily) -> fmt::Result {
    writeln!(
        writer,
        "# TYPE {name} {}",
        metric_type_to_str(family.metric_type)
    )?;

    if !family.help.is_empty() {
        writeln!(writer, "# HELP {name} {}", escape_help(&family.help))?;
    }

    for (labels, value) in &family.metrics {
        write_metric(writer, name, labels, value)?;
    }

    Ok(())
}

fn format_number_value(value: &NumberValue) -> String {
    match value {
        NumberValue::Double(value) if value.is_nan() => "NaN".to_string(),
        NumberValue::Double(value) if *value == f64::INFINITY => "+Inf".to_string(),
        NumberValue::Double(value) if *value == f64::NEG_INFINITY => "-Inf".to_string(),
        NumberValue::Double(value) => value.to_string(),
        NumberValue::Int64(value) => value.to_string(),
    }
}

fn format_label(name: &str, value: &str) -> String {
    format!(
        "{}=\"{}\"",
        format_name(name, false),
        escape_label_value(value)
    )
}

fn format_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|label| format_label(&label.0, &label.1))
        .collect::<Vec<String>>()
        .join(",")
}

fn write_metric<W: Write>(
    writer: &mut W,
    name: &str,
    labels: &[Label],
    value: &MetricValue,
) -> fmt::Result {
    match value {
        MetricValue::Gauge(value) => writeln!(
            writer,
            "{name}{{{}}} {}",
            format_labels(labels),
            format_number_value(value)
        ),
        MetricValue::Info => writeln!(writer, "{name}_info{{{}}} 1", format_labels(labels)),
    }
}
