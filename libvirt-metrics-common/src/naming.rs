//! Metric name sanitation.

/// Prefix of every emitted metric family.
pub const METRIC_PREFIX: &str = "libvirt";

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Collapse every run of non-word characters into a single `_`.
pub fn collapse_non_word(name: &str) -> String {
    let mut output = String::with_capacity(name.len());
    let mut in_run = false;

    for c in name.chars() {
        if is_word_char(c) {
            output.push(c);
            in_run = false;
        } else if !in_run {
            output.push('_');
            in_run = true;
        }
    }

    output
}

/// Turn a raw statistic name into a metric family name.
///
/// `sanitize(sanitize(name)) == sanitize(name)` holds for every input.
pub fn sanitize(name: &str) -> String {
    let collapsed = collapse_non_word(name);

    match collapsed.strip_prefix(METRIC_PREFIX) {
        Some(rest) if rest.starts_with('_') => collapsed,
        _ => format!("{METRIC_PREFIX}_{collapsed}"),
    }
}

/// Normalize the remaining segments of a stat path into a sub-metric name.
pub(crate) fn join_segments<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    segments.collect::<Vec<_>>().join("_").replace('-', "_")
}
