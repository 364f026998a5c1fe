#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use pulsemeter_agent::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
scrape:
  listen: "0.0.0.0:9464"
samplers:
  cpu_intervl_ms: 5000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.scrape.listen, "0.0.0.0:9464");
    assert_eq!(cfg.scrape.path, "/metrics");
    assert_eq!(cfg.samplers.cpu_interval_ms, 10000);
    assert_eq!(cfg.samplers.lag_resolution_ms, 20);
    assert_eq!(cfg.samplers.lag_flush_ms, 5000);
    assert!(cfg.simulator.enabled);
    assert_eq!(cfg.simulator.speedup, 1);
}

#[test]
fn overrides_are_applied() {
    let ok = r#"
version: 1
scrape:
  path: "/internal/metrics"
samplers:
  pause_buckets: [0.0005, 0.005, 0.05]
simulator:
  enabled: false
  speedup: 60
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.scrape.path, "/internal/metrics");
    assert_eq!(cfg.samplers.pause_buckets, vec![0.0005, 0.005, 0.05]);
    assert!(!cfg.simulator.enabled);
    assert_eq!(cfg.simulator.speedup, 60);
}

#[test]
fn out_of_range_values_fail() {
    let cases = [
        "version: 2\n",
        "version: 1\nscrape: { path: \"metrics\" }\n",
        "version: 1\nscrape: { path: \"/healthz\" }\n",
        "version: 1\nscrape: { timeout_ms: 5 }\n",
        "version: 1\nsamplers: { lag_resolution_ms: 50, lag_flush_ms: 40 }\n",
        "version: 1\nsamplers: { pause_buckets: [] }\n",
        "version: 1\nsamplers: { pause_buckets: [0.1, 0.01] }\n",
        "version: 1\nsimulator: { speedup: 0 }\n",
    ];
    for case in cases {
        let err = config::load_from_str(case).expect_err(case);
        assert_eq!(err.code().as_str(), "CONFIG", "case={case}");
    }
}

#[test]
fn callback_budget_must_fit_in_scrape_timeout() {
    let bad = "version: 1\nscrape:\n  timeout_ms: 200\nsamplers:\n  callback_budget_ms: 200\n";
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}
