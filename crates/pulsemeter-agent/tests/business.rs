//! Business counters and catalog gauges.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use pulsemeter_agent::obs::{register_catalog_gauges, BusinessMetrics, CatalogStats};
use pulsemeter_core::{LabelSet, MetricRegistry, Result, Sample, SampleValue, TelemetryError};

fn value(samples: &[Sample], name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    let want = LabelSet::from_pairs(labels);
    samples.iter().find_map(|s| match &s.value {
        SampleValue::Counter(v) | SampleValue::Gauge(v)
            if s.descriptor.name == name && s.labels == want =>
        {
            Some(*v)
        }
        _ => None,
    })
}

#[test]
fn events_bump_their_counters() {
    let reg = MetricRegistry::new();
    let biz = BusinessMetrics::register(&reg).unwrap();

    biz.record_signup();
    biz.record_login_success();
    biz.record_login_success();
    biz.record_login_failure();
    biz.record_password_change(true);
    biz.record_password_change(false);
    biz.record_password_change(false);
    biz.record_profile_update();
    biz.record_admin_user_created();
    biz.record_admin_store_created();

    let s = reg.scrape();
    assert_eq!(value(&s, "user_signups_total", &[]), Some(1.0));
    assert_eq!(value(&s, "user_logins_total", &[]), Some(2.0));
    assert_eq!(value(&s, "user_login_failures_total", &[]), Some(1.0));
    assert_eq!(value(&s, "account_password_changes_total", &[]), Some(1.0));
    assert_eq!(value(&s, "account_password_failures_total", &[]), Some(2.0));
    assert_eq!(value(&s, "account_profile_updates_total", &[]), Some(1.0));
    assert_eq!(value(&s, "admin_users_created_total", &[]), Some(1.0));
    assert_eq!(value(&s, "admin_stores_created_total", &[]), Some(1.0));
}

#[test]
fn ratings_are_labeled_by_store_and_user() {
    let reg = MetricRegistry::new();
    let biz = BusinessMetrics::register(&reg).unwrap();
    biz.record_rating_submitted("store_7", "user_1");
    biz.record_rating_submitted("store_7", "user_1");
    biz.record_rating_submitted("store_9", "user_1");

    let s = reg.scrape();
    let labels = [("store_id", "store_7"), ("user_id", "user_1")];
    assert_eq!(value(&s, "ratings_submitted_total", &labels), Some(2.0));
    let labels = [("user_id", "user_1"), ("store_id", "store_9")];
    assert_eq!(value(&s, "ratings_submitted_total", &labels), Some(1.0));
}

#[test]
fn registering_twice_is_a_duplicate() {
    let reg = MetricRegistry::new();
    BusinessMetrics::register(&reg).unwrap();
    let err = BusinessMetrics::register(&reg).err().expect("must fail");
    assert_eq!(err.code().as_str(), "DUPLICATE_METRIC");
}

struct FixedCatalog;

impl CatalogStats for FixedCatalog {
    fn total_users(&self) -> Result<u64> {
        Ok(42)
    }

    fn total_stores(&self) -> Result<u64> {
        Ok(7)
    }

    fn average_rating(&self) -> Result<f64> {
        Ok(3.5)
    }
}

struct DownCatalog;

impl CatalogStats for DownCatalog {
    fn total_users(&self) -> Result<u64> {
        Err(TelemetryError::CallbackFailure("db unreachable".into()))
    }

    fn total_stores(&self) -> Result<u64> {
        Ok(7)
    }

    fn average_rating(&self) -> Result<f64> {
        Err(TelemetryError::CallbackFailure("db unreachable".into()))
    }
}

#[test]
fn catalog_gauges_read_at_scrape() {
    let reg = MetricRegistry::new();
    register_catalog_gauges(&reg, Arc::new(FixedCatalog)).unwrap();

    let s = reg.scrape();
    assert_eq!(value(&s, "total_users", &[]), Some(42.0));
    assert_eq!(value(&s, "total_stores", &[]), Some(7.0));
    assert_eq!(value(&s, "current_average_rating", &[]), Some(3.5));
}

#[test]
fn catalog_failures_fall_back() {
    let reg = MetricRegistry::new();
    register_catalog_gauges(&reg, Arc::new(DownCatalog)).unwrap();

    let s = reg.scrape();
    assert_eq!(value(&s, "total_users", &[]), Some(0.0));
    assert_eq!(value(&s, "total_stores", &[]), Some(7.0));
    assert_eq!(value(&s, "current_average_rating", &[]), Some(0.0));
}
