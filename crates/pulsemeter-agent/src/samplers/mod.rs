//! System-resource samplers.
//!
//! Each sampler runs on its own timer and publishes into gauge-backing state
//! or a histogram. Gauges read that state at scrape time, so a scrape never
//! waits on a sampler.

pub mod cpu;
pub mod lag;
pub mod pause;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use atomic_float::AtomicF64;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pulsemeter_core::{Histogram, MetricDescriptor, MetricRegistry, Result};

use crate::config::SamplerSection;

pub use cpu::{CoreTicks, CpuUsageSampler, ProcStat, TickSource};
pub use lag::{LagMonitor, RollingLag};
pub use pause::{PauseClass, PauseClassifier, PauseEvent, PauseReporter};

const LAG_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Most recent sampler output; empty until the first publish.
#[derive(Debug)]
pub struct Latest(AtomicF64);

impl Default for Latest {
    fn default() -> Self {
        Self(AtomicF64::new(f64::NAN))
    }
}

impl Latest {
    pub fn set(&self, v: f64) {
        self.0.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<f64> {
        let v = self.0.load(Ordering::Relaxed);
        (!v.is_nan()).then_some(v)
    }
}

/// Registered sampler instruments plus the state their tasks publish into.
pub struct SystemSamplers {
    cfg: SamplerSection,
    cpu: Arc<Latest>,
    lag: Arc<Latest>,
    lag_histogram: Histogram,
    pause_histogram: Histogram,
}

impl SystemSamplers {
    pub fn register(registry: &MetricRegistry, cfg: &SamplerSection) -> Result<Self> {
        let cpu = Arc::new(Latest::default());
        let cpu_gauge = registry.register_gauge(
            MetricDescriptor::gauge("system_cpu_usage_percent", "System CPU usage percentage")
                .with_unit("percent"),
        )?;
        let cell = Arc::clone(&cpu);
        cpu_gauge.add_callback(move || Ok(cell.get()))?;

        let lag = Arc::new(Latest::default());
        let lag_gauge = registry.register_gauge(
            MetricDescriptor::gauge("runtime_scheduler_lag_ms", "Scheduler wakeup lag in milliseconds")
                .with_unit("milliseconds"),
        )?;
        let cell = Arc::clone(&lag);
        lag_gauge.add_callback(move || Ok(cell.get()))?;

        let lag_histogram = registry.register_histogram(
            MetricDescriptor::histogram("runtime_scheduler_lag_seconds", "Scheduler lag in seconds")
                .with_unit("seconds")
                .with_buckets(LAG_BUCKETS.to_vec()),
        )?;

        let pause_histogram = registry.register_histogram(
            MetricDescriptor::histogram("runtime_pause_duration_seconds", "Time spent in runtime pauses")
                .with_unit("seconds")
                .with_buckets(cfg.pause_buckets.clone()),
        )?;

        Ok(Self {
            cfg: cfg.clone(),
            cpu,
            lag,
            lag_histogram,
            pause_histogram,
        })
    }

    /// Spawn every sampler task. Must run inside a tokio runtime.
    pub fn spawn(self, pauses: mpsc::Receiver<PauseEvent>) -> Vec<JoinHandle<()>> {
        let cfg = self.cfg;
        let cpu = CpuUsageSampler::new(ProcStat::default());
        vec![
            tokio::spawn(cpu::run_cpu_sampler(
                cpu,
                Duration::from_millis(cfg.cpu_interval_ms),
                self.cpu,
            )),
            tokio::spawn(lag::run_lag_probe(
                Duration::from_millis(cfg.lag_probe_interval_ms),
                self.lag,
            )),
            tokio::spawn(
                LagMonitor::new(
                    Duration::from_millis(cfg.lag_resolution_ms),
                    Duration::from_millis(cfg.lag_flush_ms),
                    self.lag_histogram,
                )
                .run(),
            ),
            tokio::spawn(PauseClassifier::new(self.pause_histogram).run(pauses)),
        ]
    }
}
