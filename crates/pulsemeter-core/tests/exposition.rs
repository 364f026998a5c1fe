//! Text exposition layout.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use pulsemeter_core::{exposition, MetricDescriptor, MetricRegistry};

#[test]
fn groups_carry_help_and_type() {
    let reg = MetricRegistry::new();
    let c = reg
        .register_counter(MetricDescriptor::counter("http_requests_total", "Total number of HTTP requests"))
        .unwrap();
    let g = reg
        .register_gauge(MetricDescriptor::gauge("total_users", "Total users in the system"))
        .unwrap();
    c.inc(&[("method", "GET"), ("route", "/api/ok")]);
    c.inc(&[("method", "POST"), ("route", "/api/auth/login")]);
    g.add_callback(|| Ok(Some(12.0))).unwrap();

    let text = reg.render();
    let expected = "\
# HELP http_requests_total Total number of HTTP requests
# TYPE http_requests_total counter
http_requests_total{method=\"GET\",route=\"/api/ok\"} 1
http_requests_total{method=\"POST\",route=\"/api/auth/login\"} 1
# HELP total_users Total users in the system
# TYPE total_users gauge
total_users 12
";
    assert_eq!(text, expected);
}

#[test]
fn histogram_expands_to_bucket_sum_count() {
    let reg = MetricRegistry::new();
    let h = reg
        .register_histogram(
            MetricDescriptor::histogram("gc_duration_seconds", "pauses")
                .with_unit("seconds")
                .with_buckets(vec![0.001, 0.01]),
        )
        .unwrap();
    h.record(0.005, &[("kind", "major")]);

    let text = reg.render();
    assert!(text.contains("# TYPE gc_duration_seconds histogram\n"));
    assert!(text.contains("gc_duration_seconds_bucket{kind=\"major\",le=\"0.001\"} 0\n"));
    assert!(text.contains("gc_duration_seconds_bucket{kind=\"major\",le=\"0.01\"} 1\n"));
    assert!(text.contains("gc_duration_seconds_bucket{kind=\"major\",le=\"+Inf\"} 1\n"));
    assert!(text.contains("gc_duration_seconds_sum{kind=\"major\"} 0.005\n"));
    assert!(text.contains("gc_duration_seconds_count{kind=\"major\"} 1\n"));
}

#[test]
fn label_values_are_escaped() {
    let reg = MetricRegistry::new();
    let c = reg
        .register_counter(MetricDescriptor::counter("odd_total", "odd"))
        .unwrap();
    c.inc(&[("path", "a\"b\\c\nd")]);
    assert!(reg
        .render()
        .contains(r#"odd_total{path="a\"b\\c\nd"} 1"#));
}

#[test]
fn special_floats_use_exposition_spelling() {
    assert_eq!(exposition::format_value(f64::INFINITY), "+Inf");
    assert_eq!(exposition::format_value(f64::NEG_INFINITY), "-Inf");
    assert_eq!(exposition::format_value(f64::NAN), "NaN");
    assert_eq!(exposition::format_value(70.0), "70");
}
