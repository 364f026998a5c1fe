//! CPU sampler: tick deltas, priming and read failures.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Mutex;

use pulsemeter_agent::samplers::cpu::{parse_proc_stat, usage_percent};
use pulsemeter_agent::samplers::{CoreTicks, CpuUsageSampler, ProcStat, TickSource};
use pulsemeter_core::{Result, TelemetryError};

/// Replays scripted readings, one per `read`.
struct Scripted(Mutex<Vec<Result<Vec<CoreTicks>>>>);

impl Scripted {
    fn new(mut readings: Vec<Result<Vec<CoreTicks>>>) -> Self {
        readings.reverse();
        Self(Mutex::new(readings))
    }
}

impl TickSource for Scripted {
    fn read(&self) -> Result<Vec<CoreTicks>> {
        self.0
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(TelemetryError::SamplerReadFailure("script exhausted".into())))
    }
}

fn one_core(idle: u64, total: u64) -> Result<Vec<CoreTicks>> {
    Ok(vec![CoreTicks { idle, total }])
}

#[test]
fn first_reading_only_primes() {
    let mut s = CpuUsageSampler::new(Scripted::new(vec![one_core(100, 1000)]));
    assert_eq!(s.sample().unwrap(), None);
}

#[test]
fn usage_from_deltas() {
    let mut s = CpuUsageSampler::new(Scripted::new(vec![
        one_core(100, 1000),
        one_core(130, 1100),
    ]));
    assert_eq!(s.sample().unwrap(), None);
    assert_eq!(s.sample().unwrap(), Some(70.0));
}

#[test]
fn no_elapsed_ticks_reports_nothing() {
    let mut s = CpuUsageSampler::new(Scripted::new(vec![
        one_core(100, 1000),
        one_core(100, 1000),
    ]));
    s.sample().unwrap();
    assert_eq!(s.sample().unwrap(), None);
    assert_eq!(usage_percent(0.0, 0.0), None);
}

#[test]
fn cores_are_averaged() {
    let mut s = CpuUsageSampler::new(Scripted::new(vec![
        Ok(vec![CoreTicks { idle: 0, total: 0 }, CoreTicks { idle: 0, total: 0 }]),
        // core0 fully busy, core1 fully idle
        Ok(vec![CoreTicks { idle: 0, total: 100 }, CoreTicks { idle: 100, total: 100 }]),
    ]));
    s.sample().unwrap();
    assert_eq!(s.sample().unwrap(), Some(50.0));
}

#[test]
fn read_failure_surfaces_and_keeps_previous_reading() {
    let mut s = CpuUsageSampler::new(Scripted::new(vec![
        one_core(100, 1000),
        Err(TelemetryError::SamplerReadFailure("busy".into())),
        one_core(130, 1100),
    ]));
    s.sample().unwrap();
    let err = s.sample().unwrap_err();
    assert_eq!(err.code().as_str(), "SAMPLER_READ_FAILURE");
    assert_eq!(s.sample().unwrap(), Some(70.0));
}

#[test]
fn parses_per_core_lines_only() {
    let stat = "\
cpu  400 0 100 1500 0 0 0 0 0 0
cpu0 200 0 50 700 50 0 0 0 0 0
cpu1 200 0 50 800 0 0 0 0 0 0
intr 12345 0 0
ctxt 999
";
    let cores = parse_proc_stat(stat);
    assert_eq!(
        cores,
        vec![
            CoreTicks { idle: 700, total: 1000 },
            CoreTicks { idle: 800, total: 1050 },
        ]
    );
}

#[test]
fn missing_stat_file_is_a_read_failure() {
    let err = ProcStat::at("/nonexistent/pulsemeter/stat").read().unwrap_err();
    assert_eq!(err.code().as_str(), "SAMPLER_READ_FAILURE");
}
