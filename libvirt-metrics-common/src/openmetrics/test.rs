use crate::metrics::{Label, MetricRecord, MetricSet, MetricValue, NumberValue};

use super::render;

fn record(family: &str, labels: &[(&str, &str)], value: MetricValue) -> MetricRecord {
    MetricRecord {
        family: family.into(),
        help: format!("help {family}").into(),
        labels: labels.iter().map(|&(n, v)| Label::new(n, v)).collect(),
        value,
    }
}

#[test]
fn gauge_and_info() {
    let mut set = MetricSet::default();
    set.extend_records([
        record(
            "libvirt_active",
            &[("uuid", "u1"), ("name", "vm1")],
            MetricValue::Info,
        ),
        record(
            "libvirt_cpu_time",
            &[("uuid", "u1")],
            MetricValue::Gauge(NumberValue::Int64(100)),
        ),
        record(
            "libvirt_cpu_time",
            &[("uuid", "u2")],
            MetricValue::Gauge(NumberValue::Double(0.5)),
        ),
    ]);

    assert_eq!(
        render(&set),
        "# TYPE libvirt_active info\n\
         # HELP libvirt_active help libvirt_active\n\
         libvirt_active_info{uuid=\"u1\",name=\"vm1\"} 1\n\
         # TYPE libvirt_cpu_time gauge\n\
         # HELP libvirt_cpu_time help libvirt_cpu_time\n\
         libvirt_cpu_time{uuid=\"u1\"} 100\n\
         libvirt_cpu_time{uuid=\"u2\"} 0.5\n\
         # EOF\n"
    );
}

#[test]
fn escaping() {
    let mut set = MetricSet::default();
    set.insert_record(record(
        "libvirt_active",
        &[("name", "a \"quoted\"\\name\nx"), ("nova-flavor", "m1")],
        MetricValue::Info,
    ));

    let text = render(&set);
    assert!(text.contains(r#"name="a \"quoted\"\\name\nx""#), "{text}");
    assert!(text.contains(r#"nova_flavor="m1""#), "{text}");
}

#[test]
fn special_values() {
    let mut set = MetricSet::default();
    for (uuid, value) in [
        ("a", NumberValue::Double(f64::NAN)),
        ("b", NumberValue::Double(f64::INFINITY)),
        ("c", NumberValue::Double(f64::NEG_INFINITY)),
        ("e", NumberValue::Int64(-3)),
    ] {
        set.insert_record(record(
            "libvirt_x",
            &[("uuid", uuid)],
            MetricValue::Gauge(value),
        ));
    }

    let text = render(&set);
    assert!(text.contains("libvirt_x{uuid=\"a\"} NaN\n"));
    assert!(text.contains("libvirt_x{uuid=\"b\"} +Inf\n"));
    assert!(text.contains("libvirt_x{uuid=\"c\"} -Inf\n"));
    assert!(text.contains("libvirt_x{uuid=\"e\"} -3\n"));
}

#[test]
fn type_conflict_keeps_family() {
    let mut set = MetricSet::default();
    set.insert_record(record(
        "libvirt_block",
        &[("uuid", "u1")],
        MetricValue::Gauge(NumberValue::Int64(1)),
    ));
    set.insert_record(record(
        "libvirt_block",
        &[("uuid", "u1"), ("unit", "0")],
        MetricValue::Info,
    ));

    let text = render(&set);
    assert!(text.contains("# TYPE libvirt_block gauge\n"));
    assert!(text.contains("libvirt_block{uuid=\"u1\"} 1\n"));
    assert!(!text.contains("libvirt_block_info"));
    assert_eq!(set.len(), 1);
}

#[test]
fn empty_set() {
    assert_eq!(render(&MetricSet::default()), "# EOF\n");
}
