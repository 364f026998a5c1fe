//! Scheduler lag: how late the runtime wakes a task compared to its deadline.
//!
//! Two variants run side by side:
//! - the probe sleeps a fixed interval and publishes the last overshoot (ms),
//! - the monitor samples at a fine resolution and periodically flushes the
//!   rolling mean (seconds) into a histogram.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use pulsemeter_core::Histogram;

use super::Latest;

/// `max(0, actual - expected)`.
pub fn lag_beyond(expected: Duration, actual: Duration) -> Duration {
    actual.saturating_sub(expected)
}

pub async fn run_lag_probe(expected: Duration, latest: Arc<Latest>) {
    loop {
        let started = Instant::now();
        tokio::time::sleep(expected).await;
        let lag = lag_beyond(expected, started.elapsed());
        latest.set(lag.as_secs_f64() * 1000.0);
    }
}

/// Running mean accumulator, reset on every flush.
#[derive(Debug, Default, Clone)]
pub struct RollingLag {
    sum: Duration,
    count: u32,
    max: Duration,
}

impl RollingLag {
    pub fn observe(&mut self, lag: Duration) {
        self.sum = self.sum.saturating_add(lag);
        self.count = self.count.saturating_add(1);
        self.max = self.max.max(lag);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Mean of the window, clearing it. `None` when nothing was observed.
    pub fn take_mean(&mut self) -> Option<Duration> {
        let window = std::mem::take(self);
        if window.count == 0 {
            return None;
        }
        Some(window.sum / window.count)
    }
}

pub struct LagMonitor {
    resolution: Duration,
    flush_every: Duration,
    histogram: Histogram,
}

impl LagMonitor {
    pub fn new(resolution: Duration, flush_every: Duration, histogram: Histogram) -> Self {
        Self {
            resolution,
            flush_every,
            histogram,
        }
    }

    pub async fn run(self) {
        let mut window = RollingLag::default();
        let mut flush = tokio::time::interval_at(Instant::now() + self.flush_every, self.flush_every);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline = Instant::now() + self.resolution;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let now = Instant::now();
                    window.observe(now.saturating_duration_since(deadline));
                    deadline = now + self.resolution;
                }
                _ = flush.tick() => {
                    let max = window.max();
                    if let Some(mean) = window.take_mean() {
                        self.histogram.record_duration(mean, &[]);
                        tracing::trace!(mean_us = mean.as_micros() as u64, max_us = max.as_micros() as u64, "scheduler lag flushed");
                    }
                }
            }
        }
    }
}
