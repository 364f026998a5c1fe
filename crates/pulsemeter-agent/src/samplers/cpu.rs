//! CPU usage from per-core tick counters.
//!
//! Usage is the non-idle share of ticks elapsed since the previous sample,
//! averaged across cores. The sampler keeps the previous reading as private
//! state; the first reading only primes it.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pulsemeter_core::error::{Result, TelemetryError};

use super::Latest;

/// Idle and total ticks of one core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreTicks {
    pub idle: u64,
    pub total: u64,
}

/// Where tick counters come from.
pub trait TickSource: Send + Sync {
    fn read(&self) -> Result<Vec<CoreTicks>>;
}

/// Linux `/proc/stat` reader.
#[derive(Debug, Clone)]
pub struct ProcStat {
    path: PathBuf,
}

impl Default for ProcStat {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/proc/stat"),
        }
    }
}

impl ProcStat {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TickSource for ProcStat {
    fn read(&self) -> Result<Vec<CoreTicks>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            TelemetryError::SamplerReadFailure(format!("{}: {e}", self.path.display()))
        })?;
        let cores = parse_proc_stat(&content);
        if cores.is_empty() {
            return Err(TelemetryError::SamplerReadFailure(format!(
                "{}: no per-core cpu lines",
                self.path.display()
            )));
        }
        Ok(cores)
    }
}

/// Parse the `cpuN` lines of `/proc/stat`. The aggregate `cpu` line is skipped.
///
/// Format: `cpu0 user nice system idle iowait irq softirq steal ...`
pub fn parse_proc_stat(content: &str) -> Vec<CoreTicks> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let core = id.strip_prefix("cpu")?;
            if core.is_empty() || !core.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            // guest columns are already folded into user/nice
            let fields: Vec<u64> = parts.take(8).map(|p| p.parse().ok()).collect::<Option<_>>()?;
            if fields.len() < 4 {
                return None;
            }
            Some(CoreTicks {
                idle: fields[3],
                total: fields.iter().sum(),
            })
        })
        .collect()
}

/// `(Δtotal - Δidle) / Δtotal * 100`, or `None` when no ticks elapsed.
pub fn usage_percent(idle_delta: f64, total_delta: f64) -> Option<f64> {
    if total_delta <= 0.0 {
        return None;
    }
    Some(((total_delta - idle_delta) * 100.0 / total_delta).clamp(0.0, 100.0))
}

pub struct CpuUsageSampler<S> {
    source: S,
    last: Option<(f64, f64)>,
}

impl<S: TickSource> CpuUsageSampler<S> {
    pub fn new(source: S) -> Self {
        Self { source, last: None }
    }

    /// Take one reading. `Ok(None)` on the priming read and when no ticks elapsed.
    pub fn sample(&mut self) -> Result<Option<f64>> {
        let cores = self.source.read()?;
        if cores.is_empty() {
            return Err(TelemetryError::SamplerReadFailure("no cores reported".into()));
        }
        let n = cores.len() as f64;
        let idle = cores.iter().map(|c| c.idle as f64).sum::<f64>() / n;
        let total = cores.iter().map(|c| c.total as f64).sum::<f64>() / n;

        let Some((last_idle, last_total)) = self.last.replace((idle, total)) else {
            return Ok(None);
        };
        Ok(usage_percent(idle - last_idle, total - last_total))
    }
}

/// Sample on a fixed timer and publish into `latest`.
pub async fn run_cpu_sampler<S: TickSource>(
    mut sampler: CpuUsageSampler<S>,
    every: Duration,
    latest: Arc<Latest>,
) {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        match sampler.sample() {
            Ok(Some(usage)) => latest.set(usage),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "cpu sampler read failed; keeping last value"),
        }
    }
}
