//! Registry contract: registration, lookup, counters and scrape stability.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::thread;

use pulsemeter_core::{
    LabelSet, MetricDescriptor, MetricRegistry, Sample, SampleValue,
};

fn counter_value(samples: &[Sample], name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    let want = LabelSet::from_pairs(labels);
    samples.iter().find_map(|s| match &s.value {
        SampleValue::Counter(v) if s.descriptor.name == name && s.labels == want => Some(*v),
        _ => None,
    })
}

#[test]
fn duplicate_name_is_rejected() {
    let reg = MetricRegistry::new();
    reg.register(MetricDescriptor::counter("http_requests_total", "requests"))
        .unwrap();

    let err = reg
        .register(MetricDescriptor::gauge("http_requests_total", "same name, other kind"))
        .err()
        .expect("must fail");
    assert_eq!(err.code().as_str(), "DUPLICATE_METRIC");
}

#[test]
fn lookup_misses_and_kind_mismatches_are_unknown() {
    let reg = MetricRegistry::new();
    reg.register_counter(MetricDescriptor::counter("jobs_total", "jobs"))
        .unwrap();

    assert!(reg.counter("jobs_total").is_ok());
    assert_eq!(
        reg.counter("nope").err().unwrap().code().as_str(),
        "UNKNOWN_METRIC"
    );
    assert_eq!(
        reg.histogram("jobs_total").err().unwrap().code().as_str(),
        "UNKNOWN_METRIC"
    );
    assert_eq!(
        reg.gauge("jobs_total").err().unwrap().code().as_str(),
        "UNKNOWN_METRIC"
    );
}

#[test]
fn malformed_names_are_rejected() {
    let reg = MetricRegistry::new();
    for bad in ["", "9lives", "has space", "dash-ed"] {
        let err = reg
            .register(MetricDescriptor::counter(bad, "x"))
            .err()
            .expect("must fail");
        assert_eq!(err.code().as_str(), "INVALID_DESCRIPTOR", "name={bad:?}");
    }
}

#[test]
fn counter_scrapes_as_sum_of_deltas() {
    let reg = MetricRegistry::new();
    let c = reg
        .register_counter(MetricDescriptor::counter("bytes_total", "bytes"))
        .unwrap();
    let labels = [("route", "/api/stores")];

    let mut expected = 0.0;
    let mut last_seen = 0.0;
    for delta in [0.5, 1.0, 2.0, 0.0, 10.25] {
        c.add(delta, &labels).unwrap();
        expected += delta;

        let seen = counter_value(&reg.scrape(), "bytes_total", &labels).unwrap();
        assert_eq!(seen, expected);
        assert!(seen >= last_seen);
        last_seen = seen;
    }
}

#[test]
fn negative_delta_fails_and_leaves_value() {
    let reg = MetricRegistry::new();
    let c = reg
        .register_counter(MetricDescriptor::counter("bytes_total", "bytes"))
        .unwrap();
    c.add(3.0, &[]).unwrap();

    let err = c.add(-1.0, &[]).err().expect("must fail");
    assert_eq!(err.code().as_str(), "INVALID_DELTA");
    assert!(c.add(f64::NAN, &[]).is_err());

    assert_eq!(counter_value(&reg.scrape(), "bytes_total", &[]), Some(3.0));
}

#[test]
fn label_order_does_not_split_series() {
    let reg = MetricRegistry::new();
    let c = reg
        .register_counter(MetricDescriptor::counter("hits_total", "hits"))
        .unwrap();
    c.inc(&[("method", "GET"), ("route", "/a")]);
    c.inc(&[("route", "/a"), ("method", "GET")]);
    c.inc(&[("route", "/b"), ("method", "GET")]);

    let samples = reg.scrape();
    assert_eq!(samples.len(), 2);
    assert_eq!(
        counter_value(&samples, "hits_total", &[("route", "/a"), ("method", "GET")]),
        Some(2.0)
    );
}

#[test]
fn concurrent_adds_are_not_lost() {
    let reg = MetricRegistry::new();
    let c = reg
        .register_counter(MetricDescriptor::counter("events_total", "events"))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let c = c.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    c.inc(&[("kind", "x")]);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(
        counter_value(&reg.scrape(), "events_total", &[("kind", "x")]),
        Some(8000.0)
    );
}

#[test]
fn back_to_back_scrapes_match() {
    let reg = Arc::new(MetricRegistry::new());
    let c = reg
        .register_counter(MetricDescriptor::counter("a_total", "a"))
        .unwrap();
    let h = reg
        .register_histogram(MetricDescriptor::histogram("b_seconds", "b"))
        .unwrap();
    c.add(4.0, &[("x", "1")]).unwrap();
    h.record(0.3, &[("x", "1")]);
    h.record(7.0, &[("x", "2")]);

    let first = reg.scrape();
    let second = reg.scrape();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.descriptor.name, b.descriptor.name);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.value, b.value);
    }
    assert_eq!(reg.render(), reg.render());
}

#[test]
fn scrape_follows_registration_order() {
    let reg = MetricRegistry::new();
    let z = reg
        .register_counter(MetricDescriptor::counter("z_total", "z"))
        .unwrap();
    let a = reg
        .register_counter(MetricDescriptor::counter("a_total", "a"))
        .unwrap();
    a.inc(&[]);
    z.inc(&[]);

    let names: Vec<String> = reg
        .scrape()
        .iter()
        .map(|s| s.descriptor.name.clone())
        .collect();
    assert_eq!(names, vec!["z_total".to_string(), "a_total".to_string()]);
}

#[test]
fn malformed_label_keys_never_reach_a_counter() {
    let reg = MetricRegistry::new();
    let c = reg
        .register_counter(MetricDescriptor::counter("jobs_total", "jobs"))
        .unwrap();

    c.inc(&[("bad key", "v")]);
    let err = c.add(2.0, &[("9lives", "v")]).unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DESCRIPTOR");
    c.inc(&[("queue_name", "v")]);

    let samples = reg.scrape();
    assert_eq!(samples.len(), 1);
    assert_eq!(counter_value(&samples, "jobs_total", &[("queue_name", "v")]), Some(1.0));
}
