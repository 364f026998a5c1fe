//! Request instrumentation hook and scoped guard.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};
use pulsemeter_agent::obs::{status_bucket, ClientKind, RequestMetrics};
use pulsemeter_core::{LabelSet, MetricRegistry, Sample, SampleValue};

fn counter(samples: &[Sample], name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    let want = LabelSet::from_pairs(labels);
    samples.iter().find_map(|s| match &s.value {
        SampleValue::Counter(v) if s.descriptor.name == name && s.labels == want => Some(*v),
        _ => None,
    })
}

fn duration_count(samples: &[Sample]) -> u64 {
    samples
        .iter()
        .filter(|s| s.descriptor.name == "http_request_duration_seconds")
        .map(|s| match &s.value {
            SampleValue::Histogram(h) => h.count,
            _ => 0,
        })
        .sum()
}

fn setup() -> (MetricRegistry, Arc<RequestMetrics>) {
    let reg = MetricRegistry::new();
    let metrics = Arc::new(RequestMetrics::register(&reg).unwrap());
    (reg, metrics)
}

#[test]
fn status_codes_collapse_to_classes() {
    assert_eq!(status_bucket(101), "1xx");
    assert_eq!(status_bucket(200), "2xx");
    assert_eq!(status_bucket(304), "3xx");
    assert_eq!(status_bucket(404), "4xx");
    assert_eq!(status_bucket(503), "5xx");
    assert_eq!(status_bucket(42), "other");
}

#[test]
fn user_agent_marks_browsers() {
    let mut headers = HeaderMap::new();
    assert_eq!(ClientKind::from_headers(&headers), ClientKind::Api);
    headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
    assert_eq!(ClientKind::from_headers(&headers), ClientKind::Browser);
}

#[test]
fn finish_counts_request_and_duration() {
    let (reg, metrics) = setup();
    let id = metrics.next_request_id();
    metrics.on_request_start(id, ClientKind::Api);
    assert_eq!(metrics.in_flight(), 1);
    metrics.on_request_finish(id, 200, "/stores/:id", "GET");
    assert_eq!(metrics.in_flight(), 0);

    let samples = reg.scrape();
    let labels = [
        ("route", "/stores/:id"),
        ("method", "GET"),
        ("status", "2xx"),
        ("client", "api"),
    ];
    assert_eq!(counter(&samples, "http_requests_total", &labels), Some(1.0));
    assert_eq!(counter(&samples, "http_errors_total", &labels), None);
    assert_eq!(duration_count(&samples), 1);
}

#[test]
fn error_statuses_also_count_as_errors() {
    let (reg, metrics) = setup();
    for status in [404, 500] {
        let id = metrics.next_request_id();
        metrics.on_request_start(id, ClientKind::Browser);
        metrics.on_request_finish(id, status, "/login", "POST");
    }

    let samples = reg.scrape();
    let four = [("route", "/login"), ("method", "POST"), ("status", "4xx"), ("client", "browser")];
    let five = [("route", "/login"), ("method", "POST"), ("status", "5xx"), ("client", "browser")];
    assert_eq!(counter(&samples, "http_errors_total", &four), Some(1.0));
    assert_eq!(counter(&samples, "http_errors_total", &five), Some(1.0));
    assert_eq!(counter(&samples, "http_requests_total", &five), Some(1.0));
}

#[test]
fn finish_without_start_is_ignored() {
    let (reg, metrics) = setup();
    metrics.on_request_finish(999, 200, "/", "GET");
    assert_eq!(duration_count(&reg.scrape()), 0);
}

#[test]
fn guard_records_once() {
    let (reg, metrics) = setup();
    let guard = metrics.begin(ClientKind::Api, "/healthz", "GET");
    guard.finish(200);

    let samples = reg.scrape();
    let labels = [("route", "/healthz"), ("method", "GET"), ("status", "2xx"), ("client", "api")];
    assert_eq!(counter(&samples, "http_requests_total", &labels), Some(1.0));
    assert_eq!(duration_count(&samples), 1);
    assert_eq!(metrics.in_flight(), 0);
}

#[test]
fn dropped_guard_records_aborted_error() {
    let (reg, metrics) = setup();
    {
        let _guard = metrics.begin(ClientKind::Browser, "/ratings", "POST");
        assert_eq!(metrics.in_flight(), 1);
    }

    let samples = reg.scrape();
    let labels = [
        ("route", "/ratings"),
        ("method", "POST"),
        ("status", "aborted"),
        ("client", "browser"),
    ];
    assert_eq!(counter(&samples, "http_requests_total", &labels), Some(1.0));
    assert_eq!(counter(&samples, "http_errors_total", &labels), Some(1.0));
    assert_eq!(metrics.in_flight(), 0);
}
